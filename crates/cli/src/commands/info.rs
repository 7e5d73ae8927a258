use anyhow::{Context, Result};
use pfix_sim::simulation::TrialOutcome;
use pfix_sim::storage::QueryBuilder;
use std::path::Path;

use crate::printing::print_parameters;

pub fn show_info(database: &Path) -> Result<()> {
    if !database.exists() {
        anyhow::bail!("Database {} not found", database.display());
    }
    let query = QueryBuilder::new(database).context("Failed to open database")?;
    let config = query
        .get_full_config()
        .context("Failed to get run configuration")?;
    let counts = query
        .get_outcome_counts()
        .context("Failed to count outcomes")?;

    println!("\n📊 Run Information");
    println!("{}", "=".repeat(50));
    print_parameters(&config);

    let total: usize = counts.values().sum();
    println!("\n🏁 Outcomes ({total} trials recorded)");
    for outcome in [
        TrialOutcome::Fixed,
        TrialOutcome::Lost,
        TrialOutcome::Extinct,
        TrialOutcome::Unresolved,
    ] {
        println!("  • {outcome}: {}", counts.get(&outcome).copied().unwrap_or(0));
    }
    if let Some(seed) = query.get_metadata_value("master_seed")? {
        println!("  • Master seed: {seed}");
    }

    query.close().context("Failed to close database")?;
    Ok(())
}
