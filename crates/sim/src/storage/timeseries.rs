//! Per-snapshot report rows.
//!
//! A row is derived purely from the public accessors of a running
//! experiment; recording never changes the population.

use crate::errors::ExperimentError;
use crate::simulation::{Experiment, Observer};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// One line of a trial's time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub generations: f64,
    pub time: f64,
    pub mean_birth_rate: f64,
    /// Census of each phenotype state
    pub num_in_state: Vec<usize>,
    pub tracked_orgs: usize,
    pub lineages: usize,
    pub birth_rate_variance: f64,
}

impl ReportRow {
    pub fn from_experiment(exp: &Experiment) -> Self {
        let pop = exp.population();
        Self {
            generations: pop.generations(),
            time: exp.time_elapsed(),
            mean_birth_rate: pop.mean_birth_rate(),
            num_in_state: (0..pop.state_count()).map(|st| pop.num_in_state(st)).collect(),
            tracked_orgs: pop.tracked_org_count(),
            lineages: pop.lineage_count(),
            birth_rate_variance: pop.birth_rate_variance(),
        }
    }

    /// Total census.
    pub fn org_count(&self) -> usize {
        self.num_in_state.iter().sum()
    }
}

/// Collects a row at the start, at every snapshot and at the end of an
/// experiment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    rows: Vec<ReportRow>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ReportRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Observer for TimeSeries {
    fn on_start(&mut self, exp: &Experiment) -> Result<(), ExperimentError> {
        self.rows.push(ReportRow::from_experiment(exp));
        Ok(())
    }

    fn on_snapshot(&mut self, exp: &Experiment) -> Result<(), ExperimentError> {
        self.rows.push(ReportRow::from_experiment(exp));
        Ok(())
    }

    fn on_finish(&mut self, exp: &Experiment) -> Result<(), ExperimentError> {
        self.rows.push(ReportRow::from_experiment(exp));
        Ok(())
    }
}

/// Writes report rows as tab-separated text.
///
/// Column order: generations, time, mean birth rate, one census column per
/// state, tracked organisms, lineages, birth-rate variance.
pub struct TsvWriter<W: Write> {
    out: W,
    header_written: bool,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    fn write_header(&mut self, states: usize) -> io::Result<()> {
        write!(self.out, "generations\ttime\tmean_birth_rate")?;
        for st in 0..states {
            write!(self.out, "\tstate_{st}")?;
        }
        writeln!(self.out, "\ttracked_orgs\tlineages\tbirth_rate_variance")?;
        self.header_written = true;
        Ok(())
    }

    /// Write one row, preceded by the header on first use.
    pub fn write_row(&mut self, row: &ReportRow) -> io::Result<()> {
        if !self.header_written {
            self.write_header(row.num_in_state.len())?;
        }
        write!(
            self.out,
            "{}\t{}\t{}",
            row.generations, row.time, row.mean_birth_rate
        )?;
        for n in &row.num_in_state {
            write!(self.out, "\t{n}")?;
        }
        writeln!(
            self.out,
            "\t{}\t{}\t{}",
            row.tracked_orgs, row.lineages, row.birth_rate_variance
        )
    }

    pub fn write_rows<'a>(&mut self, rows: impl IntoIterator<Item = &'a ReportRow>) -> io::Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn record(&mut self, exp: &Experiment) -> Result<(), ExperimentError> {
        self.write_row(&ReportRow::from_experiment(exp))
            .map_err(|e| ExperimentError::Observer(e.to_string()))
    }
}

/// Streams rows straight to the writer while the experiment runs.
impl<W: Write> Observer for TsvWriter<W> {
    fn on_start(&mut self, exp: &Experiment) -> Result<(), ExperimentError> {
        self.record(exp)
    }

    fn on_snapshot(&mut self, exp: &Experiment) -> Result<(), ExperimentError> {
        self.record(exp)
    }

    fn on_finish(&mut self, exp: &Experiment) -> Result<(), ExperimentError> {
        self.record(exp)?;
        self.flush()
            .map_err(|e| ExperimentError::Observer(e.to_string()))
    }
}
