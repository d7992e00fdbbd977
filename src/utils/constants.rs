use crate::utils::constants_config::SimulationConstants;

/// Baseline constants of the reference simulation: a thousand-body Plummer
/// sphere scaled into a [-1.4, 1.4] cube, advanced in 0.1 time units.
pub const DEFAULT_SIMULATION_CONSTANTS: SimulationConstants = SimulationConstants {
    omega: 0.5,
    gravitational_constant: 6.67384e-11,
    timestep: 0.1,
    softening_length: 10.0,
    coordinate_min: -1.4,
    coordinate_max: 1.4,
    min_mass: 4.0,
    max_mass: 6.0,
    particle_count: 1000,
};
