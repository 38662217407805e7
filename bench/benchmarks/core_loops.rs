use criterion::Criterion;
use epi_engine::model::{Model, ModelConfig};
use epi_engine::roulette::roulette;
use epi_engine::rng::Rng;
use epi_engine::{default_infected_updater, default_susceptible_updater, VirusDef};
use std::hint::black_box;

/// §4.5: the weighted at-most-one-winner roulette draw, the innermost loop
/// of both default updaters.
pub fn roulette_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("roulette::roulette");
    let mut rng = Rng::new(7);

    let few = vec![0.1, 0.2, 0.05];
    group.bench_function("3_neighbors", |b| {
        b.iter(|| black_box(roulette(black_box(&few), &mut rng)));
    });

    let many: Vec<f64> = (0..64).map(|i| 1.0 / (i as f64 + 2.0)).collect();
    group.bench_function("64_neighbors", |b| {
        b.iter(|| black_box(roulette(black_box(&many), &mut rng)));
    });

    group.finish();
}

fn ring_lattice_model(n: usize, k: usize) -> Model {
    let mut config = ModelConfig::new(3);
    config.set_updater(0, default_susceptible_updater());
    config.set_updater(1, default_infected_updater());

    let mut model = Model::new(n, config);
    let mut sources = Vec::new();
    let mut targets = Vec::new();
    for i in 0..n {
        for j in 1..=k {
            let l = (i + j) % n;
            if i < l {
                sources.push(i);
                targets.push(l);
            }
        }
    }
    model.build_graph(&sources, &targets, false).unwrap();

    let virus = VirusDef::new("v")
        .with_prevalence(0.05)
        .with_states(1, 2, 2)
        .with_prob_infecting(0.3)
        .with_prob_recovery(0.2)
        .with_prob_death(0.0);
    model.add_virus_def(virus);
    model
}

/// C6/C9: a full replicate run over a fixed-size ring-lattice population —
/// every agent's updater plus the event flush, once per simulated day, the
/// cost that scales with `nreplicates` under parallel replication.
pub fn day_step_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("model::run");
    for &n in &[100usize, 1_000] {
        group.bench_function(format!("{n}_agents_30_days"), |b| {
            b.iter(|| {
                let mut model = ring_lattice_model(n, 4);
                black_box(model.run(30, 1).unwrap());
            });
        });
    }
    group.finish();
}
