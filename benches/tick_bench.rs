use criterion::{black_box, criterion_group, criterion_main, Criterion};
use genesis_sim::brain::PolicyKind;
use genesis_sim::core::SimulationConfig;
use genesis_sim::simulation::PopulationManager;

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for (name, policy) in [("tabular", PolicyKind::Tabular), ("neural", PolicyKind::Neural)] {
        group.bench_function(name, |b| {
            let config = SimulationConfig {
                initial_population: 50,
                max_population: 200,
                policy,
                ..Default::default()
            };
            let mut manager = PopulationManager::new(config).unwrap();
            b.iter(|| {
                if manager.population_size() == 0 {
                    manager.rollover().unwrap();
                }
                manager.tick();
                black_box(manager.population_size())
            });
        });
    }

    group.finish();
}

fn bench_spatial_query(c: &mut Criterion) {
    let manager = PopulationManager::new(SimulationConfig {
        initial_population: 100,
        ..Default::default()
    })
    .unwrap();
    let world = manager.world();
    let center = genesis_sim::core::types::Vec2::new(400.0, 300.0);

    c.bench_function("query_by_tag", |b| {
        b.iter(|| black_box(world.query_by_tag("agent", center, 100.0)))
    });
}

criterion_group!(benches, bench_tick, bench_spatial_query);
criterion_main!(benches);
