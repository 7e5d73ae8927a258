use anyhow::{Context, Result};
use pfix_sim::simulation::Configuration;

use crate::args::InitArgs;
use crate::printing::print_parameters;

pub fn init_config(args: &InitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            args.output.display()
        );
    }

    let config = build_config(args)?;

    let text = if args.legacy {
        config.to_parameter_file()
    } else {
        config
            .to_json_string()
            .context("Failed to serialize configuration")?
    };
    std::fs::write(&args.output, text)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    print_parameters(&config);
    println!("\n✓ Configuration written to {}", args.output.display());
    Ok(())
}

/// The default configuration with command line overrides applied.
fn build_config(args: &InitArgs) -> Result<Configuration> {
    let mut config = Configuration::default();
    if let Some(trials) = args.trials {
        config.execution.trials = trials;
    }
    if let Some(capacity) = args.capacity {
        config.population.capacity = capacity;
    }
    if let Some(tracked) = args.tracked {
        config.population.tracked_initial = tracked;
    }
    config.execution.seed = args.seed.or(config.execution.seed);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
