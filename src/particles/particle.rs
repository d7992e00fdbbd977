use bincode::{Decode, Encode};

/// A single body of the simulation: position, velocity and mass.
///
/// Particles are plain value types so the whole population can be replicated
/// on every rank and shipped across the collective boundary; anything
/// referring to a particle does so by its index in the [`ParticleStore`],
/// never by pointer.
///
/// [`ParticleStore`]: crate::particles::ParticleStore
///
/// # Examples
///
/// ```
/// use rs_nbody::particles::Particle;
///
/// let mut p = Particle::new((0.0, 0.0, 0.0), (1.0, 0.0, 0.0), 2.0);
/// p.update_position(0.5);
/// assert_eq!(p.x, 0.5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Encode, Decode)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub mass: f64,
}

impl Particle {
    pub fn new(position: (f64, f64, f64), velocity: (f64, f64, f64), mass: f64) -> Self {
        Self {
            x: position.0,
            y: position.1,
            z: position.2,
            vx: velocity.0,
            vy: velocity.1,
            vz: velocity.2,
            mass,
        }
    }

    /// Applies a force over a time step as an impulse: `v += F * dt / m`.
    pub fn apply_impulse(&mut self, force: (f64, f64, f64), dt: f64) {
        self.vx += force.0 * dt / self.mass;
        self.vy += force.1 * dt / self.mass;
        self.vz += force.2 * dt / self.mass;
    }

    /// Advances the position by one explicit Euler step: `x += v * dt`.
    pub fn update_position(&mut self, dt: f64) {
        self.x += self.vx * dt;
        self.y += self.vy * dt;
        self.z += self.vz * dt;
    }

    pub fn distance_to(&self, other: &Particle) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Affine-rescales the position so that `[from_min, from_max]` per axis
    /// maps onto `[scale_min, scale_max]`. Used when fitting a sampled
    /// population into the global coordinate range.
    pub fn rescale(
        &mut self,
        scale_min: f64,
        scale_max: f64,
        from: ((f64, f64), (f64, f64), (f64, f64)),
    ) {
        let ((x_min, x_max), (y_min, y_max), (z_min, z_max)) = from;
        self.x = (scale_max - scale_min) * (self.x - x_min) / (x_max - x_min) + scale_min;
        self.y = (scale_max - scale_min) * (self.y - y_min) / (y_max - y_min) + scale_min;
        self.z = (scale_max - scale_min) * (self.z - z_min) / (z_max - z_min) + scale_min;
    }
}
