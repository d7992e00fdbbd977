// src/utils/constants_config.rs
use crate::utils::{
    DEFAULT_SIMULATION_CONSTANTS,
    errors::SimulationError,
};

/// Tunable constants shared by every rank of a simulation run.
///
/// `softening_length` is consumed only by the initial-population sampler; the
/// force law itself applies no softening, so very close encounters can
/// produce arbitrarily large impulses.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConstants {
    /// Opening-angle threshold: an internal node of width `s` at distance `d`
    /// is treated as a single point mass iff `s / d < omega`.
    pub omega: f64,
    pub gravitational_constant: f64,
    pub timestep: f64,
    /// Scale length of the Plummer density profile used for sampling.
    pub softening_length: f64,
    pub coordinate_min: f64,
    pub coordinate_max: f64,
    pub min_mass: f64,
    pub max_mass: f64,
    pub particle_count: usize,
}

impl Default for SimulationConstants {
    fn default() -> Self {
        Self {
            omega: 0.5,
            gravitational_constant: 6.67384e-11,
            timestep: 0.1,
            softening_length: 10.0,
            coordinate_min: -1.4,
            coordinate_max: 1.4,
            min_mass: 4.0,
            max_mass: 6.0,
            particle_count: 1000,
        }
    }
}

impl SimulationConstants {
    pub fn new(
        omega: Option<f64>,
        gravitational_constant: Option<f64>,
        timestep: Option<f64>,
        softening_length: Option<f64>,
        coordinate_range: Option<(f64, f64)>,
        mass_range: Option<(f64, f64)>,
        particle_count: Option<usize>,
    ) -> Self {
        let default = DEFAULT_SIMULATION_CONSTANTS;
        let (coordinate_min, coordinate_max) =
            coordinate_range.unwrap_or((default.coordinate_min, default.coordinate_max));
        let (min_mass, max_mass) = mass_range.unwrap_or((default.min_mass, default.max_mass));
        Self {
            omega: omega.unwrap_or(default.omega),
            gravitational_constant: gravitational_constant.unwrap_or(default.gravitational_constant),
            timestep: timestep.unwrap_or(default.timestep),
            softening_length: softening_length.unwrap_or(default.softening_length),
            coordinate_min,
            coordinate_max,
            min_mass,
            max_mass,
            particle_count: particle_count.unwrap_or(default.particle_count),
        }
        .validated()
    }

    fn validated(self) -> Self {
        debug_assert!(self.coordinate_min < self.coordinate_max);
        debug_assert!(self.omega > 0.0);
        self
    }

    /// Returns true when the coordinate falls inside the simulated range,
    /// under the same half-open convention the octree uses per axis
    /// (`min < c && c <= max`). A body sitting exactly on the global minimum
    /// boundary is *not* inside and would be dropped by every tree insertion.
    pub fn contains_coordinate(&self, c: f64) -> bool {
        self.coordinate_min < c && c <= self.coordinate_max
    }

    pub fn validate_mass(&self, mass: f64) -> Result<f64, SimulationError> {
        if mass <= 0.0 || !mass.is_finite() {
            return Err(SimulationError::InvalidMass);
        }
        Ok(mass)
    }
}
