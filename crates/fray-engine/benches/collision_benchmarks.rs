//! Hit resolution and full-tick benchmarks.
//!
//! Resolution is quadratic in live volumes, so it is measured at growing
//! volume counts with four fighters crowded into a small area. The full tick
//! benchmark runs a four-fighter match with every fighter attacking.
//!
//! Run with: `cargo bench --bench collision_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fray_engine::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const FIGHTERS: usize = 4;

/// `per_fighter` hit spheres and three hurt capsules for each of four
/// fighters standing half a unit apart.
fn crowded_volumes(per_fighter: usize) -> (VolumeArena<HitVolume>, VolumeArena<HurtVolume>) {
    let mut hits = VolumeArena::with_capacity(per_fighter * FIGHTERS);
    let mut hurts = VolumeArena::with_capacity(3 * FIGHTERS);
    for owner in 0..FIGHTERS {
        let model = Affine3A::from_translation(Vec3::new(owner as f32 * 0.5, 0.0, 0.0));
        for i in 0..per_fighter {
            let def = HitVolumeDef {
                origin: Vec3::new(0.3 + (i % 5) as f32 * 0.1, 0.4 + (i / 5) as f32 * 0.1, 0.0),
                radius: 0.25,
                group: (i % 4) as u8,
                damage: 4.0 + (i % 9) as f32,
                clang_mode: ClangMode::Ground,
                ..HitVolumeDef::default()
            };
            let mut volume = HitVolume::new(format!("blob_{i}"), owner, ActionKind::NeutralFirst, def);
            volume.update_shape(&model, &[]);
            hits.insert(volume);
        }
        for (j, region) in [Region::Lower, Region::Middle, Region::Upper].into_iter().enumerate() {
            let y = j as f32 * 0.5;
            let def = HurtVolumeDef {
                origin_a: Vec3::new(0.0, y, 0.0),
                origin_b: Vec3::new(0.0, y + 0.5, 0.0),
                radius: 0.3,
                region,
                ..HurtVolumeDef::default()
            };
            let mut volume = HurtVolume::new(format!("hurt_{j}"), owner, def);
            volume.update_shape(&model, &[]);
            hurts.insert(volume);
        }
    }
    (hits, hurts)
}

fn brawler(name: &str) -> FighterDef {
    let mut def = FighterDef {
        name: name.to_owned(),
        ..FighterDef::default()
    };
    def.hurt_blobs.insert(
        "body".to_owned(),
        HurtVolumeDef {
            origin_a: Vec3::new(0.0, 0.2, 0.0),
            origin_b: Vec3::new(0.0, 1.4, 0.0),
            radius: 0.4,
            ..HurtVolumeDef::default()
        },
    );
    let mut jab = ActionDef {
        script: "enable_hitblobs \"fist\"\nwait_until 3\nreset_collisions\nwait_until 6".to_owned(),
        ..ActionDef::default()
    };
    for i in 0..4u8 {
        jab.blobs.insert(
            format!("fist_{i}"),
            HitVolumeDef {
                origin: Vec3::new(0.6 + f32::from(i) * 0.2, 1.0, 0.0),
                radius: 0.3,
                group: i % 2,
                index: i,
                damage: 5.0 + f32::from(i),
                ..HitVolumeDef::default()
            },
        );
    }
    def.actions.insert("NeutralFirst".to_owned(), jab);
    def
}

// ---------------------------------------------------------------------------
// Benchmark 1: resolve
// ---------------------------------------------------------------------------

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("collision_resolve");
    let bodies: Vec<Body> = (0..FIGHTERS)
        .map(|owner| Body {
            position: Vec2::new(owner as f32 * 0.5, 0.0),
            ..Body::default()
        })
        .collect();
    for per_fighter in [4usize, 16, 32] {
        let (hits, hurts) = crowded_volumes(per_fighter);
        let mut resolver = CollisionResolver::new();
        group.bench_with_input(
            BenchmarkId::from_parameter(per_fighter * FIGHTERS),
            &per_fighter,
            |b, _| {
                b.iter(|| {
                    let mut hits = hits.clone();
                    let mut bits = HitBits::default();
                    let outcome = resolver.resolve(&mut hits, &hurts, &mut bits, &bodies, 9.0);
                    black_box(outcome.hits.len());
                });
            },
        );
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark 2: full tick
// ---------------------------------------------------------------------------

fn bench_tick(c: &mut Criterion) {
    let defs = (0..FIGHTERS).map(|i| brawler(&format!("f{i}"))).collect();
    let mut sim = Simulation::new(SimulationConfig::default(), FlatStage::default(), defs).unwrap();
    let mut input = TickInput::default();
    for i in 0..FIGHTERS {
        input.set(i, InputSample {
            attack: true,
            ..Default::default()
        });
    }
    sim.set_input(input);

    c.bench_function("tick_four_fighters", |b| {
        b.iter(|| {
            let report = sim.tick().unwrap();
            black_box(report.events.len());
        });
    });
}

criterion_group!(benches, bench_resolve, bench_tick);
criterion_main!(benches);
