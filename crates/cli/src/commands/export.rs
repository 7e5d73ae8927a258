use anyhow::{Context, Result};
use pfix_sim::storage::{QueryBuilder, TsvWriter};
use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::args::ExportArgs;

pub fn export_series(args: &ExportArgs) -> Result<()> {
    if !args.database.exists() {
        anyhow::bail!("Database {} not found", args.database.display());
    }
    let query = QueryBuilder::new(&args.database).context("Failed to open database")?;
    let rows = query
        .get_series(args.trial)
        .with_context(|| format!("Failed to load series of trial {}", args.trial))?;
    if rows.is_empty() {
        anyhow::bail!("No time series recorded for trial {}", args.trial);
    }

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = TsvWriter::new(out);
    writer.write_rows(&rows)?;
    writer.flush()?;

    if let Some(path) = &args.output {
        eprintln!("✓ Trial {} exported to: {}", args.trial, path.display());
    }
    Ok(())
}
