use thiserror::Error;

/// Error returned when an integer is not one of the three allele values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid allele value: {0} (expected -1, 0 or +1)")]
pub struct InvalidAllele(pub i8);

/// Errors raised while resolving or validating per-state parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    /// The requested key is not present in the parameter source.
    #[error("Couldn't find parameter: {0}")]
    Missing(String),

    /// The key exists but its value could not be parsed.
    #[error("Invalid value for parameter {key}: '{value}'")]
    Unparsable { key: String, value: String },

    /// A state field violates its allowed range.
    #[error("Parameter {name} out of range: {value} (must be {constraint})")]
    OutOfRange {
        name: &'static str,
        value: f64,
        constraint: &'static str,
    },

    /// A line in a parameter file is not of the form `name = value`.
    #[error("Malformed parameter line {line}: '{text}'")]
    Malformed { line: usize, text: String },

    /// A state index outside the table was addressed.
    #[error("State index {index} out of range (state count = {count})")]
    StateIndex { index: usize, count: usize },

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<std::io::Error> for ParameterError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ParameterError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

/// Errors that can occur while building a population.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuilderError {
    /// A required parameter is missing
    #[error("Missing required parameter: {0}")]
    MissingRequired(&'static str),

    /// An invalid parameter value was provided
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// A bookkeeping invariant found broken by `Population::validate`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PopulationError {
    #[error("{what}: stored {stored}, recomputed {recomputed}")]
    CountMismatch {
        what: String,
        stored: usize,
        recomputed: usize,
    },

    #[error("{what}: stored {stored}, recomputed {recomputed}")]
    RateDrift {
        what: String,
        stored: f64,
        recomputed: f64,
    },

    #[error("Lineage registry corrupted: {0}")]
    Registry(String),

    #[error("Birth-rate bound for state {state} is {bound}, below live rate {rate}")]
    BoundTooLow { state: usize, bound: f64, rate: f64 },
}

/// Errors raised while saving or restoring a population snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Decoding error: {0}")]
    Decode(String),

    /// The decoded data does not describe a consistent population.
    #[error("Inconsistent snapshot: {0}")]
    Inconsistent(String),
}

/// Database error types.
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),
    #[error("Database initialization error: {0}")]
    Initialization(String),
    #[error("Transaction error: {0}")]
    Transaction(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Insert error: {0}")]
    Insert(String),
    #[error("Close error: {0}")]
    Close(String),
}

/// Errors surfaced by the experiment driver loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExperimentError {
    /// The total event rate dropped to zero while the population is alive.
    #[error("No event can occur (total event rate {rate}) after {events} events")]
    Stalled { rate: f64, events: u64 },

    /// A snapshot observer failed.
    #[error("Observer failed: {0}")]
    Observer(String),
}

/// Errors raised while running a batch of trials.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrialError {
    #[error("Invalid configuration: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Cannot build population: {0}")]
    Builder(#[from] BuilderError),

    #[error("Trial {trial} failed: {source}")]
    Experiment {
        trial: usize,
        #[source]
        source: ExperimentError,
    },
}
