//! Initial-population sampling from a Plummer density profile.
//!
//! Radii are drawn by inverting the cumulative Plummer mass profile, speeds
//! by rejection sampling against the isotropic velocity distribution, and
//! both are given uniformly random directions on the sphere. The sampled
//! cloud is then rescaled per axis into the global coordinate range so every
//! body lands inside the root cell of the tree.

use std::f64::consts::PI;

use rand::Rng;

use crate::particles::Particle;
use crate::utils::SimulationConstants;

// The tree's box test excludes points exactly on the global minimum
// boundary, so the rescale keeps this fraction of the span clear of it.
const LOWER_MARGIN: f64 = 1e-9;

/// Samples `constants.particle_count` bodies from a Plummer sphere with scale
/// length `constants.softening_length`, rescaled into the global coordinate
/// range. Masses are `min_mass` plus a uniform integer below `max_mass`.
pub fn plummer_sphere<R: Rng + ?Sized>(
    rng: &mut R,
    constants: &SimulationConstants,
) -> Vec<Particle> {
    let n = constants.particle_count;
    let a = constants.softening_length;
    let g = constants.gravitational_constant;

    let mut particles = Vec::with_capacity(n);
    let mut bounds = [(f64::INFINITY, f64::NEG_INFINITY); 3];

    while particles.len() < n {
        let radius = a / (rng.random::<f64>().powf(-2.0 / 3.0) - 1.0).sqrt();
        let xx: f64 = rng.random();
        let yy = rng.random::<f64>() * 0.1;

        if yy < xx * xx * (1.0 - xx * xx).powf(3.5) {
            let speed = xx * (2.0 * g * n as f64).sqrt() * (radius * radius + a * a).powf(-0.25);

            let position = isotropic(rng, radius);
            let velocity = isotropic(rng, speed);
            let mass = constants.min_mass + rng.random_range(0..constants.max_mass as u64) as f64;

            for (axis, &coordinate) in [position.0, position.1, position.2].iter().enumerate() {
                bounds[axis].0 = bounds[axis].0.min(coordinate);
                bounds[axis].1 = bounds[axis].1.max(coordinate);
            }

            particles.push(Particle::new(position, velocity, mass));
        }
    }

    let span = constants.coordinate_max - constants.coordinate_min;
    let scale_min = constants.coordinate_min + span * LOWER_MARGIN;
    for p in &mut particles {
        p.rescale(scale_min, constants.coordinate_max, (bounds[0], bounds[1], bounds[2]));
    }

    particles
}

/// A vector of the given magnitude with uniformly random direction.
fn isotropic<R: Rng + ?Sized>(rng: &mut R, magnitude: f64) -> (f64, f64, f64) {
    let phi = rng.random::<f64>() * 2.0 * PI;
    let theta = (rng.random::<f64>() * 2.0 - 1.0).acos();
    (
        magnitude * theta.sin() * phi.cos(),
        magnitude * theta.sin() * phi.sin(),
        magnitude * theta.cos(),
    )
}
