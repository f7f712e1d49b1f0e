use crate::Year;
use thiserror::Error;

/// Error type for invalid configurations and failed computations.
#[derive(Error, Debug)]
pub enum CarbonError {
    #[error("{0}")]
    Error(String),

    // Configuration errors. These are raised before any raster is computed.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("The simulation horizon is empty: no transition years and no analysis year were given")]
    MissingHorizonEnd,
    #[error("Transition year {0} is listed more than once, which would create a zero-length regime")]
    DuplicateTransitionYear(Year),
    #[error("Transition year {transition} must come after the baseline year {baseline}")]
    TransitionBeforeBaseline { baseline: Year, transition: Year },
    #[error("Analysis year {analysis} precedes the last transition year {last_transition}")]
    AnalysisYearBeforeLastTransition { analysis: Year, last_transition: Year },
    #[error("Landcover class '{class}' referenced by the {location} is not in the biophysical table")]
    UnknownLandcoverClass { class: String, location: String },
    #[error("Landcover code {code} found in '{raster}' is not in the biophysical table")]
    UnknownLandcoverCode { code: i64, raster: String },
    #[error("Malformed table '{table}': {reason}")]
    MalformedTable { table: String, reason: String },
    #[error("No carbon price is available for year {0}")]
    MissingPrice(Year),
    #[error("Unknown carbon pool '{0}'")]
    UnknownPool(String),

    // Computation errors. These fail the producing task only.
    #[error("Invalid half-life {value}; half-lives must be finite and non-negative")]
    InvalidHalfLife { value: f32 },
    #[error("Raster shape mismatch: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Operation '{operation}' expected {expected} input rasters, got {found}")]
    WrongArity {
        operation: String,
        expected: usize,
        found: usize,
    },
    #[error("Raster '{0}' does not exist")]
    RasterNotFound(String),
    #[error("Raster codec error: {0}")]
    Codec(String),

    // Task graph errors.
    #[error("Output '{key}' is already produced by task '{existing}'")]
    DuplicateOutput { key: String, existing: String },
    #[error("Task '{task}' reads '{key}', which is produced by '{producer}' but that task is not a declared dependency")]
    UndeclaredDependency {
        task: String,
        key: String,
        producer: String,
    },
    #[error("Task '{task}' failed: {reason}. {skipped} dependent task(s) were skipped")]
    TaskFailed {
        task: String,
        reason: String,
        skipped: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl CarbonError {
    /// True for errors that describe an invalid run configuration.
    ///
    /// These are always reported before any raster computation begins and
    /// leave no partial output behind.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CarbonError::InvalidConfiguration(_)
                | CarbonError::MissingHorizonEnd
                | CarbonError::DuplicateTransitionYear(_)
                | CarbonError::TransitionBeforeBaseline { .. }
                | CarbonError::AnalysisYearBeforeLastTransition { .. }
                | CarbonError::UnknownLandcoverClass { .. }
                | CarbonError::UnknownLandcoverCode { .. }
                | CarbonError::MalformedTable { .. }
                | CarbonError::MissingPrice(_)
                | CarbonError::UnknownPool(_)
                | CarbonError::Toml(_)
                | CarbonError::Csv(_)
        )
    }
}

/// Convenience type for `Result<T, CarbonError>`.
pub type CarbonResult<T> = Result<T, CarbonError>;
