//! End-to-end tests of the particle pipeline on the host-emulated device.
//!
//! Everything here runs without a GPU: the store drives
//! `HostParticleDevice` / `HostFlowVolume`, which execute the same records
//! and arithmetic as the WGSL kernels.

use glam::{Mat4, UVec3, Vec3};
use plume::device::host::{HostFlowVolume, HostParticleDevice};
use plume::prelude::*;
use plume::GridFlowField;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn emulated_store(capacity: u32) -> ParticleStore {
    ParticleStore::device(Box::new(HostParticleDevice::new(capacity)))
}

fn assert_counts(store: &ParticleStore) {
    assert!(store.alive_count() <= store.total_count());
    assert!(store.total_count() <= store.capacity());
}

// ============================================================================
// Lifecycle Scenario
// ============================================================================

#[test]
fn test_capacity_lifespan_compaction_scenario() {
    let inert = PhysicsParameters::inert();
    let env = plume::StepEnvironment::new(&inert);
    let mut store = emulated_store(100);

    let accepted = (0..150)
        .filter(|i| store.spawn(Particle::new(Vec3::splat(*i as f32), Vec3::Y, 1.0)))
        .count();
    assert_eq!(accepted, 100);
    assert_eq!(store.commit(), 100);
    assert_eq!(store.total_count(), 100);
    assert_eq!(store.alive_count(), 100);

    let mut time = 0.0;
    for _ in 0..10 {
        time += 0.1;
        store.advance(0.1, time, &env);
        assert_counts(&store);
    }
    store.advance(0.01, time + 0.01, &env);

    assert_eq!(store.alive_count(), 0);
    assert_eq!(store.total_count(), 100);
    assert!(store.sync_for_render().is_empty());

    store.compact();
    assert_eq!(store.total_count(), 0);
    assert_eq!(store.alive_count(), 0);
}

#[test]
fn test_saturation_for_any_overflow() {
    for extra in [1, 7, 100] {
        let mut store = emulated_store(32);
        for _ in 0..32 + extra {
            store.spawn(Particle::new(Vec3::ZERO, Vec3::ZERO, 5.0));
        }
        store.commit();
        assert_eq!(store.total_count(), 32);
        for _ in 0..extra {
            assert!(!store.spawn(Particle::new(Vec3::ZERO, Vec3::ZERO, 5.0)));
        }
        assert_eq!(store.commit(), 0);
    }
}

#[test]
fn test_counts_invariant_under_random_operations() {
    let mut rng = StdRng::seed_from_u64(42);
    let physics = PhysicsParameters::default();
    let env = plume::StepEnvironment::new(&physics);
    let mut store = emulated_store(64).with_compaction(CompactionPolicy::default().with_interval(0.3));

    let mut time = 0.0;
    for _ in 0..200 {
        for _ in 0..rng.gen_range(0..12) {
            let lifespan = rng.gen_range(0.05..1.0);
            store.spawn(Particle::new(Vec3::ZERO, Vec3::Y, lifespan));
        }
        store.commit();
        let dt = rng.gen_range(0.01..0.1);
        time += dt;
        store.advance(dt, time, &env);
        store.maybe_compact(dt);
        assert_counts(&store);
        assert_eq!(store.sync_for_render().len() as u32, store.alive_count());
    }
}

// ============================================================================
// Physics Tests
// ============================================================================

#[test]
fn test_culling_with_closed_form_position() {
    let inert = PhysicsParameters::inert();
    let env = plume::StepEnvironment::new(&inert);
    let start = Vec3::new(1.0, 2.0, 3.0);
    let velocity = Vec3::new(0.5, 1.0, -2.0);

    for mut store in [ParticleStore::host(4), emulated_store(4)] {
        store.spawn(Particle::new(start, velocity, 0.35));
        store.commit();

        for step in 1..=3 {
            store.advance(0.1, step as f32 * 0.1, &env);
            let snapshot = store.sync_for_render();
            assert_eq!(snapshot.len(), 1);
            let expected = start + velocity * (step as f32 * 0.1);
            assert!((snapshot[0].position - expected).length() < 1e-5);
        }

        store.advance(0.1, 0.4, &env);
        assert_eq!(store.alive_count(), 0);
        assert!(store.sync_for_render().is_empty());
    }
}

#[test]
fn test_host_and_device_integrate_identically() {
    let physics = PhysicsParameters::default();
    let env = plume::StepEnvironment::new(&physics);
    let mut host = ParticleStore::host(16);
    let mut device = emulated_store(16);
    let mut rng = StdRng::seed_from_u64(9);

    for _ in 0..16 {
        let p = Particle::new(
            Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0),
            Vec3::new(rng.gen_range(-3.0..3.0), rng.gen_range(0.0..5.0), 0.0),
            100.0,
        );
        host.spawn(p);
        device.spawn(p);
    }
    host.commit();
    device.commit();

    for step in 0..20 {
        host.advance(0.016, step as f32 * 0.016, &env);
        device.advance(0.016, step as f32 * 0.016, &env);
    }

    let a = host.sync_for_render().to_vec();
    let b = device.sync_for_render();
    assert_eq!(a.len(), b.len());
    for (h, d) in a.iter().zip(b) {
        assert!((h.position - d.position).length() < 1e-4);
        assert!((h.velocity - d.velocity).length() < 1e-4);
    }
}

#[test]
fn test_host_and_device_agree_on_massless_parameters() {
    let physics = PhysicsParameters {
        gravity_strength: 1.0,
        drag_coefficient: 0.5,
        particle_mass: 0.0,
        flow_influence: 0.0,
    };
    let env = plume::StepEnvironment::new(&physics);
    let mut host = ParticleStore::host(1);
    let mut device = emulated_store(1);
    let p = Particle::new(Vec3::ZERO, Vec3::X, 10.0);
    host.spawn(p);
    device.spawn(p);
    host.commit();
    device.commit();

    host.advance(0.1, 0.0, &env);
    device.advance(0.1, 0.0, &env);

    let h = host.sync_for_render()[0];
    let d = device.sync_for_render()[0];
    assert!(h.position.is_finite() && h.velocity.is_finite());
    assert!((h.position - d.position).length() < 1e-5);
    assert!((h.velocity - d.velocity).length() < 1e-5);
}

#[test]
fn test_flow_volume_lifts_device_particles() {
    let physics = PhysicsParameters::inert().with_flow_influence(1.0);
    let mut flow = FlowFieldDevice::new(
        Box::new(HostFlowVolume::new(UVec3::splat(8))),
        Vec3::splat(-10.0),
        Vec3::splat(10.0),
    );
    flow.set_wind(WindParameters::default().with_strength(2.0).with_height_variation(0.0).with_time_scale(0.0));
    assert!(flow.update(0.0));

    let mut with_flow = emulated_store(1);
    let mut without_flow = emulated_store(1);
    for store in [&mut with_flow, &mut without_flow] {
        store.spawn(Particle::new(Vec3::ZERO, Vec3::ZERO, 10.0));
        store.commit();
    }

    let env = plume::StepEnvironment::new(&physics);
    let env_flow = env.with_flow_device(&flow);
    with_flow.advance(0.5, 0.5, &env_flow);
    without_flow.advance(0.5, 0.5, &env);

    // v = flow * dt = (0, 1, 0); x = v * dt
    let lifted = with_flow.sync_for_render()[0];
    assert!((lifted.velocity - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-4);
    assert!((lifted.position - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-4);
    assert_eq!(without_flow.sync_for_render()[0].position, Vec3::ZERO);
}

// ============================================================================
// Compaction Tests
// ============================================================================

#[test]
fn test_compaction_idempotent_and_order_preserving() {
    let inert = PhysicsParameters::inert();
    let env = plume::StepEnvironment::new(&inert);
    let mut store = emulated_store(20);
    for i in 0..10 {
        let lifespan = if i % 2 == 0 { 0.05 } else { 10.0 };
        store.spawn(Particle::new(Vec3::new(i as f32, 0.0, 0.0), Vec3::ZERO, lifespan));
    }
    store.commit();
    store.advance(0.1, 0.1, &env);
    assert_eq!(store.alive_count(), 5);
    assert_eq!(store.dead_count(), 5);

    store.compact();
    let once = store.sync_for_render().to_vec();
    assert_eq!(store.total_count(), 5);
    let xs: Vec<f32> = once.iter().map(|p| p.position.x).collect();
    assert_eq!(xs, vec![1.0, 3.0, 5.0, 7.0, 9.0]);

    store.compact();
    assert_eq!(store.total_count(), 5);
    assert_eq!(store.sync_for_render(), once.as_slice());
}

#[test]
fn test_compaction_frees_slots_for_new_spawns() {
    let inert = PhysicsParameters::inert();
    let env = plume::StepEnvironment::new(&inert);
    let mut store = emulated_store(8);
    for _ in 0..8 {
        store.spawn(Particle::new(Vec3::ZERO, Vec3::ZERO, 0.01));
    }
    store.commit();
    store.advance(0.1, 0.1, &env);
    assert!(!store.spawn(Particle::new(Vec3::ZERO, Vec3::ZERO, 1.0)));

    store.compact();
    assert!(store.spawn(Particle::new(Vec3::ZERO, Vec3::ZERO, 1.0)));
    assert_eq!(store.commit(), 1);
    assert_eq!(store.alive_count(), 1);
}

// ============================================================================
// Flow Field Tests
// ============================================================================

#[test]
fn test_flow_zero_outside_bounds_for_every_kind() {
    let min = Vec3::ZERO;
    let max = Vec3::splat(10.0);
    let outside = [
        Vec3::new(-0.5, 5.0, 5.0),
        Vec3::new(5.0, 10.5, 5.0),
        Vec3::new(5.0, 5.0, 100.0),
    ];
    for kind in FlowFieldKind::ALL {
        let mut flow = FlowField::initialize(min, max, UVec3::splat(5));
        flow.generate_grid_from(FlowFieldKind::UniformWind, 0.0);
        flow.set_kind(kind);
        for p in outside {
            assert_eq!(flow.sample(p, 1.3), Vec3::ZERO, "{:?} at {:?}", kind, p);
        }
    }
}

#[test]
fn test_trilinear_exact_at_nodes_and_mean_at_midpoints() {
    let mut grid = GridFlowField::new(UVec3::splat(3), Vec3::ZERO, Vec3::splat(2.0));
    grid.fill_with(|node, _| Vec3::new(node.x as f32 * 3.0, (node.y * node.z) as f32, 1.0 + node.z as f32));

    for x in 0..3 {
        for y in 0..3 {
            for z in 0..3 {
                let at = grid.node_position(x, y, z);
                let expected = grid.velocity(x as i32, y as i32, z as i32);
                assert!((grid.trilinear_interpolate(at) - expected).length() < 1e-5);
            }
        }
    }

    let a = grid.velocity(0, 1, 1);
    let b = grid.velocity(1, 1, 1);
    let mid = grid.trilinear_interpolate(Vec3::new(0.5, 1.0, 1.0));
    assert!((mid - (a + b) * 0.5).length() < 1e-5);
}

// ============================================================================
// Rendering Tests
// ============================================================================

#[test]
fn test_sprites_sorted_back_to_front() {
    let particles: Vec<Particle> = [(5.0, 0.5), (-3.0, 1.5), (1.0, 0.0)]
        .iter()
        .map(|&(z, age)| {
            let mut p = Particle::new(Vec3::new(0.0, 0.0, z), Vec3::ZERO, 2.0);
            p.age = age;
            p
        })
        .collect();

    let mut renderer = SortedSpriteRenderer::new();
    let sprites = renderer.prepare(&particles, &Mat4::IDENTITY);
    let depths: Vec<f32> = sprites.iter().map(|s| s.depth()).collect();
    let ages: Vec<f32> = sprites.iter().map(|s| s.normalized_age).collect();
    assert_eq!(depths, vec![-3.0, 1.0, 5.0]);
    assert_eq!(ages, vec![0.75, 0.0, 0.25]);
}

// ============================================================================
// Boundary Tests
// ============================================================================

#[test]
fn test_host_particles_stay_in_box() {
    let boundary = BoundaryVolume::new(Vec3::ZERO, Vec3::splat(2.0));
    let physics = PhysicsParameters::inert();
    let env = plume::StepEnvironment::new(&physics).with_boundary(&boundary);
    let mut store = ParticleStore::host(3);
    store.spawn(Particle::new(Vec3::new(0.9, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), 10.0));
    store.spawn(Particle::new(Vec3::new(0.0, -0.9, 0.0), Vec3::new(0.0, -5.0, 0.0), 10.0));
    store.spawn(Particle::new(Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0), 10.0));
    store.commit();

    store.advance(0.1, 0.1, &env);
    let p = store.particles();
    assert_eq!(p[0].position.x, 1.0);
    assert_eq!(p[0].velocity.x, -5.0);
    assert_eq!(p[1].position.y, -1.0);
    assert_eq!(p[1].velocity.y, 5.0);
    assert!((p[2].position.x - 0.01).abs() < 1e-6);
    assert_eq!(p[2].velocity.x, 0.1);
    for particle in p {
        assert!(boundary.bounds().contains(particle.position));
    }
}

#[test]
fn test_emitted_particles_start_on_spawn_disk() {
    let boundary = BoundaryVolume::default();
    let emitter = ConeEmitter::default();
    let mut rng = StdRng::seed_from_u64(11);
    let floor = boundary.bounds().min().y + 0.1;
    for p in emitter.emit(&boundary, &mut rng) {
        assert!((p.position.y - floor).abs() < 1e-4);
        assert!(boundary.bounds().contains(p.position));
        assert!(p.velocity.y > 0.0);
        assert_eq!(p.age, 0.0);
    }
}

// ============================================================================
// Smoke System Tests
// ============================================================================

#[test]
fn test_smoke_system_steady_state_bounded() {
    let config = SmokeConfig::new()
        .with_capacity(500)
        .with_flow_resolution(8)
        .with_emitter(ConeEmitter::default().with_rate(40).with_lifespan(0.5))
        .with_compaction(CompactionPolicy::default().with_interval(0.2));
    let mut smoke = SmokeSystem::emulated(&config);
    let mut rng = StdRng::seed_from_u64(5);
    let view = Camera::default().view_matrix();

    let mut compactions = 0;
    let mut time = 0.0;
    for _ in 0..120 {
        time += 0.05;
        let stats = smoke.frame(0.05, time, &mut rng, &view);
        assert!(stats.alive <= stats.total && stats.total <= 500);
        assert_eq!(smoke.sprites().len() as u32, stats.alive);
        if stats.compacted {
            compactions += 1;
        }
    }
    assert!(compactions > 0);
}
