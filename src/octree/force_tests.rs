use crate::assert_float_eq;
use crate::octree::{accumulate_force, sequential_step, CellRegion, OctreeNode};
use crate::particles::Particle;

const G: f64 = 6.67384e-11;

fn body(x: f64, y: f64, z: f64, mass: f64) -> Particle {
    Particle::new((x, y, z), (0.0, 0.0, 0.0), mass)
}

fn build_tree(particles: &[Particle], bounds: CellRegion) -> OctreeNode {
    let mut root = OctreeNode::new(bounds);
    for index in 0..particles.len() {
        root.insert(index, particles);
    }
    root
}

#[test]
fn test_two_body_forces_are_equal_and_opposite() {
    let particles = [body(-0.5, 0.0, 0.0, 1.0), body(0.5, 0.0, 0.0, 1.0)];
    let root = build_tree(&particles, CellRegion::cube(-1.4, 1.4));

    let f0 = accumulate_force(&root, 0, &particles, 0.5, G);
    let f1 = accumulate_force(&root, 1, &particles, 0.5, G);

    // Unit masses at unit separation: |F| = G, directed toward the partner.
    assert_float_eq(f0.0, G, 1e-22, None);
    assert_float_eq(f1.0, -G, 1e-22, None);
    assert_float_eq(f0.1, 0.0, 1e-22, None);
    assert_float_eq(f0.2, 0.0, 1e-22, None);
}

#[test]
fn test_distant_pair_is_approximated_by_its_center_of_mass() {
    // Two bodies huddled near a corner, probed from the opposite corner: the
    // subtree holding the pair passes the opening-angle test somewhere above
    // the leaves, so the probe sees one aggregated pull.
    let particles = [
        body(1.0, 1.0, 1.0, 2.0),
        body(1.05, 1.0, 1.0, 2.0),
        body(-1.2, -1.2, -1.2, 1.0),
    ];
    let root = build_tree(&particles, CellRegion::cube(-1.4, 1.4));
    let force = accumulate_force(&root, 2, &particles, 0.5, G);

    // The pull points from the probe toward the pair, equally on every axis
    // apart from the slight x offset.
    assert!(force.0 > 0.0 && force.1 > 0.0 && force.2 > 0.0);
    assert!(force.0 >= force.1);
    assert_float_eq(force.1, force.2, 1e-24, None);
}

#[test]
fn test_probe_force_matches_direct_sum_within_tolerance() {
    let particles = [
        body(0.9, 0.8, 0.7, 3.0),
        body(1.1, 0.9, 0.8, 2.0),
        body(-1.0, -1.1, -0.9, 1.0),
    ];
    let root = build_tree(&particles, CellRegion::cube(-1.4, 1.4));
    let approx = accumulate_force(&root, 2, &particles, 0.5, G);

    let mut direct = (0.0, 0.0, 0.0);
    let probe = particles[2];
    for p in &particles[..2] {
        let dx = p.x - probe.x;
        let dy = p.y - probe.y;
        let dz = p.z - probe.z;
        let r = (dx * dx + dy * dy + dz * dz).sqrt();
        let magnitude = G * probe.mass * p.mass / (r * r);
        direct.0 += magnitude * dx / r;
        direct.1 += magnitude * dy / r;
        direct.2 += magnitude * dz / r;
    }

    // The multipole substitution is an approximation; with omega = 0.5 it
    // stays within a few percent of the direct sum.
    let scale = (direct.0 * direct.0 + direct.1 * direct.1 + direct.2 * direct.2).sqrt();
    assert!((approx.0 - direct.0).abs() < 0.05 * scale);
    assert!((approx.1 - direct.1).abs() < 0.05 * scale);
    assert!((approx.2 - direct.2).abs() < 0.05 * scale);
}

#[test]
fn test_sequential_step_pulls_bodies_together() {
    let mut particles = [body(-0.5, 0.0, 0.0, 1.0), body(0.5, 0.0, 0.0, 1.0)];
    sequential_step(&mut particles, CellRegion::cube(-1.4, 1.4), 0.5, G, 0.1);

    assert!(particles[0].vx > 0.0);
    assert!(particles[1].vx < 0.0);
    assert!(particles[0].x > -0.5);
    assert!(particles[1].x < 0.5);
    assert_float_eq(particles[0].x + particles[1].x, 0.0, 1e-15, None);
}
