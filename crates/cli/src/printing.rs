use pfix_sim::simulation::{Configuration, TrialSummary};

pub fn print_parameters(config: &Configuration) {
    let exec = &config.execution;
    let pop = &config.population;
    println!("\n📋 Configuration");
    println!("  • Trials: {}", exec.trials);
    match exec.seed {
        Some(seed) => println!("  • Random Seed: {seed}"),
        None => println!("  • Random Seed: Random"),
    }
    println!("  • Population Size: {}", pop.capacity);
    println!(
        "  • Tracked: {} in state {} ({})",
        pop.tracked_initial, pop.tracked_state, pop.tracked_allele
    );
    println!("  • Stop: {:?}", exec.stop);
    println!("  • Birth-rate bound: {:?}", exec.bound);

    println!("\n⚡ States");
    println!("  st   birth  s_ben  s_del  mut_ben  mut_del  change  death");
    for (st, entry) in config.states.iter().enumerate() {
        println!(
            "  {st:<3} {:>6.3} {:>6.3} {:>6.3} {:>8.1e} {:>8.1e} {:>7.1e} {:>6.3}",
            entry.birth_prefactor(),
            entry.sel_coeff_ben(),
            entry.sel_coeff_del(),
            entry.mut_rate_ben(),
            entry.mut_rate_del(),
            entry.change_rate(),
            entry.death_rate()
        );
    }
}

pub fn print_summary(summary: &TrialSummary) {
    println!("\n🏁 Results");
    println!("  • Fixation probability: {:.6}", summary.fixation_probability());
    println!("  • Fixed: {}", summary.fixed);
    println!("  • Lost: {}", summary.lost);
    if summary.extinct > 0 {
        println!("  • Extinct: {}", summary.extinct);
    }
    if summary.unresolved > 0 {
        println!("  • Unresolved: {}", summary.unresolved);
    }
    println!("  • Master seed: {}", summary.seed);
}
