//! Snapshots and trial recording through the public API.

use pfix_sim::base::Allele;
use pfix_sim::evolution::mutate;
use pfix_sim::genome::Organism;
use pfix_sim::simulation::{
    Condition, Configuration, Experiment, PopulationBuilder, StateEntry, StateParams, StateTable,
    TrialOptions, TrialOutcome, run_trials,
};
use pfix_sim::storage::{LineageTable, PopulationSnapshot, QueryBuilder, Recorder};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tempfile::tempdir;

fn always_mutating() -> StateEntry {
    StateEntry::new(StateParams {
        mut_rate_ben: 50.0,
        sel_coeff_ben: 0.1,
        birth_prefactor: 1.0,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_shared_handles_round_trip() {
    let a = Organism::new(3);
    let b = a.clone();
    let bytes = bincode::serialize(&LineageTable::encode([&a, &b])).unwrap();
    let (table, ids): (LineageTable, Vec<usize>) = bincode::deserialize(&bytes).unwrap();

    let mut handles = table.decode(&ids, 3).unwrap();
    assert_eq!(handles[0], handles[1]);

    let mut rng = StdRng::seed_from_u64(1);
    mutate(&mut handles[0], &always_mutating(), &mut rng);
    assert_eq!(handles[0].allele(), Allele::Beneficial);
    assert_eq!(handles[1].allele(), Allele::Neutral);
    assert_ne!(handles[0], handles[1]);
}

#[test]
fn test_snapshot_resume_matches_uninterrupted_run() {
    let entry = StateEntry::new(StateParams {
        mut_rate_ben: 0.01,
        mut_rate_del: 0.01,
        sel_coeff_ben: 0.1,
        sel_coeff_del: 0.1,
        birth_prefactor: 1.0,
        change_rate: 0.05,
        death_rate: 0.0,
    })
    .unwrap();
    let resident = StateEntry::new(StateParams {
        birth_prefactor: 1.0,
        ..Default::default()
    })
    .unwrap();
    let table = Arc::new(StateTable::new(vec![resident, entry, entry]));
    let builder = PopulationBuilder::new()
        .state_table(table)
        .founders(30, 0, Allele::Neutral, false)
        .founders(10, 1, Allele::Neutral, true);

    let mut straight = builder.build().unwrap();
    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..400 {
        straight.do_event(&mut rng);
    }

    let dir = tempdir().unwrap();
    let path = dir.path().join("pop.bin");
    PopulationSnapshot::capture(&straight).save(&path).unwrap();
    let mut resumed = PopulationSnapshot::load(&path).unwrap().restore().unwrap();

    // same generator state on both sides
    let mut rng_a = StdRng::seed_from_u64(18);
    let mut rng_b = StdRng::seed_from_u64(18);
    for _ in 0..400 {
        assert_eq!(straight.do_event(&mut rng_a), resumed.do_event(&mut rng_b));
    }
    assert_eq!(straight.counters(), resumed.counters());
    assert_eq!(straight.generations(), resumed.generations());
    assert_eq!(straight.lineage_count(), resumed.lineage_count());
    for st in 0..3 {
        assert_eq!(straight.num_in_state(st), resumed.num_in_state(st));
    }
    resumed.validate().unwrap();
}

#[test]
fn test_experiment_on_restored_population() {
    let table = Arc::new(StateTable::new(vec![
        StateEntry::new(StateParams {
            birth_prefactor: 1.0,
            ..Default::default()
        })
        .unwrap();
        3
    ]));
    let pop = PopulationBuilder::new()
        .state_table(table)
        .founders(5, 0, Allele::Neutral, false)
        .founders(5, 1, Allele::Neutral, true)
        .build()
        .unwrap();
    let mut restored = PopulationSnapshot::capture(&pop).restore().unwrap();
    restored.reset_counts();
    let mut exp = Experiment::new(restored).with_stop_condition(Condition::FixedOrLost);
    let outcome = exp.run(&mut StdRng::seed_from_u64(4), &mut ()).unwrap();
    assert!(matches!(outcome, TrialOutcome::Fixed | TrialOutcome::Lost));
}

#[test]
fn test_recorded_batch_reads_back() {
    let mut config = Configuration::default();
    config.execution.trials = 20;
    config.execution.seed = Some(2024);
    config.execution.snapshot = Condition::GenerationsSinceLastSnapshot(5.0);
    config.population.capacity = 20;

    let summary = run_trials(
        &config,
        &config.state_table(),
        TrialOptions { keep_series: true },
    )
    .unwrap();
    assert_eq!(summary.fixed + summary.lost, 20);

    let dir = tempdir().unwrap();
    let path = dir.path().join("batch.sqlite");
    let mut recorder = Recorder::new(&path, &config).unwrap();
    recorder.record_summary(&summary).unwrap();
    recorder.close().unwrap();

    let query = QueryBuilder::new(&path).unwrap();
    assert_eq!(query.get_full_config().unwrap(), config);
    let trials = query.get_trials().unwrap();
    assert_eq!(trials.len(), 20);
    for (stored, report) in trials.iter().zip(&summary.reports) {
        assert_eq!(stored.outcome, report.outcome);
        assert_eq!(stored.events, report.events);
        assert_eq!(query.get_series(stored.index).unwrap(), report.series);
    }
}
