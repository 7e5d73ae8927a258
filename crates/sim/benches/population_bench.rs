use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use pfix_sim::base::Allele;
use pfix_sim::evolution::BirthRateBound;
use pfix_sim::simulation::{
    Configuration, PopulationBuilder, StateEntry, StateParams, StateTable, TrialOptions,
    run_trials,
};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

fn table() -> Arc<StateTable> {
    let resident = StateEntry::new(StateParams {
        birth_prefactor: 1.0,
        ..Default::default()
    })
    .unwrap();
    let switching = StateEntry::new(StateParams {
        mut_rate_ben: 1e-3,
        mut_rate_del: 1e-3,
        sel_coeff_ben: 0.1,
        sel_coeff_del: 0.1,
        birth_prefactor: 1.0,
        change_rate: 0.01,
        death_rate: 0.0,
    })
    .unwrap();
    Arc::new(StateTable::new(vec![resident, switching, switching]))
}

fn builder(size: usize, bound: BirthRateBound) -> PopulationBuilder {
    PopulationBuilder::new()
        .state_table(table())
        .bound(bound)
        .founders(size / 2, 0, Allele::Neutral, false)
        .founders(size - size / 2, 1, Allele::Neutral, true)
}

fn bench_do_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("do_event");
    let events = 1_000u64;
    group.throughput(Throughput::Elements(events));

    for size in [100usize, 1_000, 10_000] {
        for (name, bound) in [
            ("running", BirthRateBound::Running),
            ("analytic", BirthRateBound::Analytic),
        ] {
            let builder = builder(size, bound);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter_batched(
                    || {
                        (
                            builder.build().unwrap(),
                            Xoshiro256PlusPlus::seed_from_u64(42),
                        )
                    },
                    |(mut pop, mut rng)| {
                        for _ in 0..events {
                            black_box(pop.do_event(&mut rng));
                        }
                        pop
                    },
                    criterion::BatchSize::SmallInput,
                )
            });
        }
    }

    group.finish();
}

fn bench_update_birth_ub(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_birth_ub");
    for size in [1_000usize, 10_000] {
        let mut pop = builder(size, BirthRateBound::Running).build().unwrap();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| pop.update_birth_ub())
        });
    }
    group.finish();
}

fn bench_trials(c: &mut Criterion) {
    let mut group = c.benchmark_group("trials");
    group.sample_size(10);

    let mut config = Configuration::default();
    config.execution.trials = 64;
    config.execution.seed = Some(1);
    config.population.capacity = 50;
    let table = config.state_table();

    group.bench_function("fixation_64x50", |b| {
        b.iter(|| black_box(run_trials(&config, &table, TrialOptions::default()).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_do_event, bench_update_birth_ub, bench_trials);
criterion_main!(benches);
