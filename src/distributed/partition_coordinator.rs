//! The per-step distributed protocol.
//!
//! Every rank executes the same sequence each step: build the owned slice of
//! the space as detached second-level cells, flatten the populated ones,
//! gather all fragments at the coordinator, reassemble them into one global
//! tree, broadcast it back, integrate forces for the owned particles and
//! reconcile the whole store through an all-gather. The collectives are the
//! only synchronization points; nothing but the store survives a step.
//!
//! The 64 second-level cells are striped round-robin across ranks rather
//! than in contiguous blocks: the particles tend to cluster in a few
//! regions, and striping spreads the hot regions across ranks.

use bincode::{Decode, Encode};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::distributed::{Collective, LocalCommunicator};
use crate::errors::SimulationError;
use crate::octree::{accumulate_force, CellRegion, FlatTree, OctreeNode, OCTANT_COUNT};
use crate::particles::{plummer_sphere, Particle, ParticleStore};
use crate::utils::SimulationConstants;

/// The rank that reassembles the global tree each step.
pub const COORDINATOR_RANK: usize = 0;

/// The 8 x 8 second-level cells of the skeleton.
pub const SECOND_LEVEL_CELL_COUNT: usize = OCTANT_COUNT * OCTANT_COUNT;

/// Cells owned by `rank` under round-robin striping: `rank, rank + size, ...`
pub fn owned_cells(rank: usize, size: usize) -> Vec<usize> {
    (rank..SECOND_LEVEL_CELL_COUNT).step_by(size).collect()
}

/// The rank owning a second-level cell.
pub fn cell_owner(cell: usize, size: usize) -> usize {
    cell % size
}

/// The empty two-level skeleton (root, 8 children, 64 grandchildren) every
/// rank builds identically without communication.
pub struct TreeSkeleton {
    root: OctreeNode,
}

impl TreeSkeleton {
    pub fn new(constants: &SimulationConstants) -> Self {
        let mut root = OctreeNode::new(CellRegion::cube(
            constants.coordinate_min,
            constants.coordinate_max,
        ));
        root.expand_children();
        if let Some(children) = root.children.as_mut() {
            for child in children.iter_mut() {
                child.expand_children();
            }
        }
        Self { root }
    }

    /// The box of second-level cell `cell`: first-level octant `cell / 8`,
    /// second-level octant `cell % 8`, in the canonical octant order.
    pub fn second_level_region(constants: &SimulationConstants, cell: usize) -> CellRegion {
        CellRegion::cube(constants.coordinate_min, constants.coordinate_max)
            .octant(cell / OCTANT_COUNT)
            .octant(cell % OCTANT_COUNT)
    }

    /// Replaces the skeleton slot of `cell` with a reconstructed subtree,
    /// updating the first-level aggregates via
    /// [`OctreeNode::insert_children`].
    pub fn place(&mut self, cell: usize, subtree: OctreeNode) {
        if let Some(children) = self.root.children.as_mut() {
            children[cell / OCTANT_COUNT].insert_children(subtree, cell % OCTANT_COUNT);
        }
    }

    /// Recomputes the root aggregates from the now-complete first-level
    /// children and returns the finished global tree.
    pub fn finalize(mut self) -> OctreeNode {
        if let Some(children) = self.root.children.as_ref() {
            let total_mass: f64 = children.iter().map(|c| c.total_mass).sum();
            let particle_count: usize = children.iter().map(|c| c.particle_count).sum();
            let mut weighted = (0.0, 0.0, 0.0);
            for child in children.iter() {
                weighted.0 += child.total_mass * child.center_x;
                weighted.1 += child.total_mass * child.center_y;
                weighted.2 += child.total_mass * child.center_z;
            }
            self.root.total_mass = total_mass;
            self.root.particle_count = particle_count;
            if total_mass > 0.0 {
                self.root.center_x = weighted.0 / total_mass;
                self.root.center_y = weighted.1 / total_mass;
                self.root.center_z = weighted.2 / total_mass;
            }
        }
        self.root
    }
}

/// One flattened, populated second-level subtree, tagged with the global
/// index of the cell it was built from.
#[derive(Clone, Debug, Encode, Decode)]
pub struct CellFragment {
    pub cell: u32,
    pub tree: FlatTree,
}

/// Executes the per-step protocol over a collective communicator.
pub struct PartitionCoordinator<'a, C: Collective> {
    comm: &'a C,
    constants: SimulationConstants,
}

impl<'a, C: Collective> PartitionCoordinator<'a, C> {
    pub fn new(comm: &'a C, constants: SimulationConstants) -> Self {
        Self { comm, constants }
    }

    /// Advances the replicated store by one step.
    pub fn step(&self, store: &mut ParticleStore) -> Result<(), SimulationError> {
        let rank = self.comm.rank();
        let size = self.comm.size();

        // LocalBuild: owned cells are disjoint, so they fill in parallel.
        let mut local_cells: Vec<(usize, OctreeNode)> = owned_cells(rank, size)
            .into_iter()
            .map(|cell| {
                (cell, OctreeNode::new(TreeSkeleton::second_level_region(&self.constants, cell)))
            })
            .collect();
        {
            let particles = store.particles();
            local_cells.par_iter_mut().for_each(|(_, cell)| {
                for index in 0..particles.len() {
                    cell.insert(index, particles);
                }
            });
        }

        // LocalSerialize: only populated cells travel.
        let mut fragments = Vec::new();
        for (cell, node) in &local_cells {
            if node.particle_count > 0 {
                fragments.push(CellFragment {
                    cell: *cell as u32,
                    tree: FlatTree::serialize(node)?,
                });
            }
        }
        drop(local_cells);
        debug!("rank {} flattened {} populated cell fragments", rank, fragments.len());

        // Gather at the coordinator, reassemble, broadcast the global tree.
        let gathered = self.comm.gather(&fragments, COORDINATOR_RANK)?;
        let global = match gathered {
            Some(per_rank) => Some(FlatTree::serialize(&self.reassemble(per_rank, store)?)?),
            None => None,
        };
        let global = self.comm.broadcast(global, COORDINATOR_RANK)?;
        let root = global.deserialize(store.len())?;

        // ForceIntegrate: owned particles read the shared tree and write
        // only their own slots.
        let owned = store.owned_indices(rank, size);
        let omega = self.constants.omega;
        let g = self.constants.gravitational_constant;
        let dt = self.constants.timestep;
        let forces: Vec<(f64, f64, f64)> = {
            let particles = store.particles();
            owned
                .par_iter()
                .map(|&index| accumulate_force(&root, index, particles, omega, g))
                .collect()
        };
        let mut updates = Vec::with_capacity(owned.len());
        for (&index, force) in owned.iter().zip(forces) {
            let p = &mut store.particles_mut()[index];
            p.apply_impulse(force, dt);
            p.update_position(dt);
            updates.push(*p);
        }

        // AllGatherReconcile; every tree drops at the end of the step.
        let per_rank = self.comm.all_gather(&updates)?;
        store.reconcile(&per_rank)?;
        Ok(())
    }

    /// Deserializes every gathered fragment against the local store and
    /// mounts it in the skeleton slot implied by the round-robin mapping,
    /// then finishes the root aggregates.
    pub(crate) fn reassemble(
        &self,
        per_rank: Vec<Vec<CellFragment>>,
        store: &ParticleStore,
    ) -> Result<OctreeNode, SimulationError> {
        let size = self.comm.size();
        if per_rank.len() != size {
            return Err(SimulationError::ProtocolViolation(format!(
                "gathered fragment lists from {} ranks, expected {}",
                per_rank.len(),
                size
            )));
        }

        let mut skeleton = TreeSkeleton::new(&self.constants);
        for (source_rank, fragments) in per_rank.into_iter().enumerate() {
            for fragment in fragments {
                let cell = fragment.cell as usize;
                if cell >= SECOND_LEVEL_CELL_COUNT || cell_owner(cell, size) != source_rank {
                    return Err(SimulationError::ProtocolViolation(format!(
                        "rank {} sent a fragment for cell {} it does not own",
                        source_rank, cell
                    )));
                }
                let subtree = fragment.tree.deserialize(store.len())?;
                skeleton.place(cell, subtree);
            }
        }

        let root = skeleton.finalize();
        if root.particle_count < store.len() {
            warn!(
                "global tree holds {} of {} particles; bodies outside the coordinate range were dropped",
                root.particle_count,
                store.len()
            );
        }
        Ok(root)
    }
}

/// Runs a full simulation on an in-process cluster of `size` ranks: the
/// coordinator rank produces the initial population and broadcasts it, every
/// rank ingests its replica and executes `steps` protocol steps, and the
/// coordinator's reconciled store is returned.
pub fn run_local_cluster<F>(
    size: usize,
    constants: SimulationConstants,
    steps: usize,
    initial_population: F,
) -> Result<ParticleStore, SimulationError>
where
    F: FnOnce() -> Vec<Particle> + Send + 'static,
{
    let endpoints = LocalCommunicator::group(size)?;
    let mut initial_population = Some(initial_population);

    let mut handles = Vec::with_capacity(size);
    for comm in endpoints {
        let sample = if comm.rank() == COORDINATOR_RANK {
            initial_population.take()
        } else {
            None
        };
        handles.push(std::thread::spawn(
            move || -> Result<Option<ParticleStore>, SimulationError> {
                let population = sample.map(|produce| produce());
                let particles = comm.broadcast(population, COORDINATOR_RANK)?;
                let mut store = ParticleStore::ingest(particles, &constants)?;
                let coordinator = PartitionCoordinator::new(&comm, constants);
                for _ in 0..steps {
                    coordinator.step(&mut store)?;
                }
                Ok((comm.rank() == COORDINATOR_RANK).then_some(store))
            },
        ));
    }

    let mut outcome: Option<ParticleStore> = None;
    let mut first_error: Option<SimulationError> = None;
    let mut note = |error: SimulationError| {
        let replaceable = matches!(
            first_error,
            None | Some(SimulationError::CollectiveTimeout { .. })
        );
        // Peers of a failed rank surface as timeouts; keep the original failure.
        if replaceable && !matches!(error, SimulationError::CollectiveTimeout { .. }) {
            first_error = Some(error);
        } else if first_error.is_none() {
            first_error = Some(error);
        }
    };

    for handle in handles {
        match handle.join() {
            Ok(Ok(Some(store))) => outcome = Some(store),
            Ok(Ok(None)) => {}
            Ok(Err(error)) => note(error),
            Err(_) => note(SimulationError::ProtocolViolation(
                "a rank panicked during the run".to_string(),
            )),
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }
    outcome.ok_or_else(|| {
        SimulationError::ProtocolViolation("the coordinator rank produced no store".to_string())
    })
}

/// [`run_local_cluster`] with a seeded Plummer-sphere initial population.
pub fn run_plummer_cluster(
    size: usize,
    constants: SimulationConstants,
    steps: usize,
    seed: u64,
) -> Result<ParticleStore, SimulationError> {
    run_local_cluster(size, constants, steps, move || {
        let mut rng = StdRng::seed_from_u64(seed);
        plummer_sphere(&mut rng, &constants)
    })
}
