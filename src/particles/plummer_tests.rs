use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::particles::{plummer_sphere, ParticleStore};
use crate::utils::SimulationConstants;

fn constants(count: usize) -> SimulationConstants {
    SimulationConstants { particle_count: count, ..Default::default() }
}

#[test]
fn test_sample_count_and_coordinate_range() {
    let constants = constants(200);
    let mut rng = StdRng::seed_from_u64(7);
    let particles = plummer_sphere(&mut rng, &constants);
    assert_eq!(particles.len(), 200);

    // Every sampled body must survive validated ingestion, i.e. sit strictly
    // above the global minimum and at or below the global maximum per axis.
    let store = ParticleStore::ingest(particles, &constants)
        .expect("a sampled population must land inside the coordinate range");
    assert_eq!(store.len(), 200);
}

#[test]
fn test_sampled_masses_are_integer_offsets_in_range() {
    let constants = constants(100);
    let mut rng = StdRng::seed_from_u64(21);
    for p in plummer_sphere(&mut rng, &constants) {
        assert!(p.mass >= constants.min_mass);
        assert!(p.mass < constants.min_mass + constants.max_mass);
        assert_eq!(p.mass.fract(), 0.0, "masses are uniform integers");
    }
}

#[test]
fn test_sampling_is_deterministic_for_a_seed() {
    let constants = constants(50);
    let mut first = StdRng::seed_from_u64(3);
    let mut second = StdRng::seed_from_u64(3);
    assert_eq!(
        plummer_sphere(&mut first, &constants),
        plummer_sphere(&mut second, &constants)
    );
}
