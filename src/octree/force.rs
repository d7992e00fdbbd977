use crate::octree::{CellRegion, OctreeNode};
use crate::particles::Particle;

/// Accumulates the approximate gravitational force on the particle at
/// `index` by traversing the tree from `node`.
///
/// At every visited node the opening-angle test decides: an accepted node
/// contributes one aggregated `F = G * m * M / r^2` pull toward its center of
/// mass; a rejected internal node is descended into. A leaf holding the
/// queried particle itself is rejected and has nothing to descend into, which
/// is how self-interaction drops out. Nodes holding no particles carry no
/// mass and are skipped.
///
/// The force law applies no softening, so `r -> 0` in a close encounter
/// blows up.
pub fn accumulate_force(
    node: &OctreeNode,
    index: usize,
    particles: &[Particle],
    omega: f64,
    g: f64,
) -> (f64, f64, f64) {
    if node.particle_count == 0 {
        return (0.0, 0.0, 0.0);
    }

    if node.accepts_as_cluster(index, particles, omega) {
        let p = particles[index];
        let dx = node.center_x - p.x;
        let dy = node.center_y - p.y;
        let dz = node.center_z - p.z;
        let r = (dx * dx + dy * dy + dz * dz).sqrt();

        let magnitude = g * p.mass * node.total_mass / (r * r);
        (magnitude * dx / r, magnitude * dy / r, magnitude * dz / r)
    } else if let Some(children) = node.children.as_ref() {
        let mut total = (0.0, 0.0, 0.0);
        for child in children.iter() {
            let f = accumulate_force(child, index, particles, omega, g);
            total.0 += f.0;
            total.1 += f.1;
            total.2 += f.2;
        }
        total
    } else {
        (0.0, 0.0, 0.0)
    }
}

/// Reference single-process step: one tree over `bounds` holding every
/// particle, then an opening-angle force pass and an Euler update per
/// particle. The distributed pipeline must agree with this up to
/// floating-point reassociation.
pub fn sequential_step(particles: &mut [Particle], bounds: CellRegion, omega: f64, g: f64, dt: f64) {
    let mut root = OctreeNode::new(bounds);
    for index in 0..particles.len() {
        root.insert(index, particles);
    }

    for index in 0..particles.len() {
        let force = accumulate_force(&root, index, particles, omega, g);
        let p = &mut particles[index];
        p.apply_impulse(force, dt);
        p.update_position(dt);
    }
}
