use log::debug;

use crate::errors::SimulationError;
use crate::particles::Particle;
use crate::utils::SimulationConstants;

/// The replicated, flat collection of bodies.
///
/// Every rank holds a full copy; during a step each rank may rewrite only the
/// indices it owns under the round-robin mapping (`index mod size == rank`),
/// and [`reconcile`](ParticleStore::reconcile) is the single point where
/// those per-rank updates are merged back into a full copy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleStore {
    particles: Vec<Particle>,
}

impl ParticleStore {
    /// Validates and adopts an initial population.
    ///
    /// A body whose mass is non-positive is rejected with
    /// [`SimulationError::InvalidMass`]; a body outside the global coordinate
    /// range (under the tree's half-open per-axis convention) would be
    /// silently ignored by every insertion and under-count the total mass,
    /// so it is rejected here with
    /// [`SimulationError::ParticleOutOfBounds`] instead.
    pub fn ingest(
        particles: Vec<Particle>,
        constants: &SimulationConstants,
    ) -> Result<Self, SimulationError> {
        for (index, p) in particles.iter().enumerate() {
            constants.validate_mass(p.mass)?;
            let inside = constants.contains_coordinate(p.x)
                && constants.contains_coordinate(p.y)
                && constants.contains_coordinate(p.z);
            if !inside {
                return Err(SimulationError::ParticleOutOfBounds { index });
            }
        }
        debug!("ingested {} particles", particles.len());
        Ok(Self { particles })
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Indices owned by `rank` in a group of `size`: `rank, rank + size, ...`
    pub fn owned_indices(&self, rank: usize, size: usize) -> Vec<usize> {
        (rank..self.particles.len()).step_by(size).collect()
    }

    /// Flat position buffer for a rendering consumer: 3 floats per particle,
    /// in store order.
    pub fn position_buffer(&self) -> Vec<f32> {
        let mut buffer = Vec::with_capacity(self.particles.len() * 3);
        for p in &self.particles {
            buffer.push(p.x as f32);
            buffer.push(p.y as f32);
            buffer.push(p.z as f32);
        }
        buffer
    }

    /// Rebuilds the full store from the per-rank update lists produced by the
    /// all-gather: entry `i` is taken from its owning rank's list, position
    /// `i / size`. A deterministic reducer, never last-writer-wins.
    pub fn reconcile(&mut self, per_rank: &[Vec<Particle>]) -> Result<(), SimulationError> {
        let size = per_rank.len();
        if size == 0 {
            return Err(SimulationError::EmptyCluster);
        }
        for (rank, updates) in per_rank.iter().enumerate() {
            let expected = self.owned_indices(rank, size).len();
            if updates.len() != expected {
                return Err(SimulationError::ProtocolViolation(format!(
                    "rank {} sent {} particle updates, expected {}",
                    rank,
                    updates.len(),
                    expected
                )));
            }
        }
        for (index, slot) in self.particles.iter_mut().enumerate() {
            *slot = per_rank[index % size][index / size];
        }
        Ok(())
    }
}
