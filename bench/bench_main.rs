use criterion::{criterion_group, criterion_main};

mod benchmarks;
use benchmarks::core_loops::{day_step_benchmarks, roulette_benchmarks};

criterion_group!(core_benches, roulette_benchmarks, day_step_benchmarks);

criterion_main!(core_benches);
