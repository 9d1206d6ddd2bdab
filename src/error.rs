//! Unified error hierarchy for runecon
//!
//! Ingestion, calculation and export failures each get their own enum so the
//! pipeline can decide which ones are fatal and which only exclude a subject.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all runecon operations
#[derive(Debug, Error)]
pub enum RunEconError {
    /// Reading or parsing the metabolic cart recording
    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    /// Windowing, metric or regression errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Writing summaries, reports or charts
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input file errors
#[derive(Debug, Error)]
pub enum IngestError {
    /// File not found at specified path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Header is missing columns the pipeline cannot work without
    #[error("Missing required columns in {path}: {columns}")]
    MissingColumns { path: PathBuf, columns: String },

    /// The file could not be read as CSV at all
    #[error("Unparsable input {path}: {reason}")]
    Unparsable { path: PathBuf, reason: String },

    /// Every data row was rejected
    #[error("No valid observations in {path} ({skipped} rows skipped)")]
    NoValidRows { path: PathBuf, skipped: usize },
}

/// Calculation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalculationError {
    /// A phase is absent or does not cover the full steady-state window
    #[error("Insufficient {phase} data for subject {subject_id}: {reason}")]
    InsufficientWindow {
        subject_id: String,
        phase: String,
        reason: String,
    },

    /// Body mass missing, zero or negative
    #[error("Invalid body mass for subject {subject_id}: {value}")]
    InvalidBodyMass { subject_id: String, value: String },

    /// Speed could not be determined for a subject
    #[error("Missing speed for subject {subject_id}")]
    MissingSpeed { subject_id: String },

    /// Not enough complete subjects to fit a model
    #[error("Insufficient data for regression: {count} subject(s), need at least {required}")]
    InsufficientSample { count: usize, required: usize },

    /// Predictor has zero variance so the slope is undefined
    #[error("Degenerate predictor: all {count} net metabolic power values are equal")]
    DegeneratePredictor { count: usize },

    /// Predictor and response have different lengths
    #[error("Mismatched regression inputs: {x_len} predictor values, {y_len} responses")]
    LengthMismatch { x_len: usize, y_len: usize },

    /// Statistical distribution could not be constructed
    #[error("Distribution error: {0}")]
    Distribution(String),
}

/// Output errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Chart rendering failed for {path}: {reason}")]
    Chart { path: PathBuf, reason: String },
}

/// Result type alias for runecon operations
pub type Result<T> = std::result::Result<T, RunEconError>;

impl RunEconError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RunEconError::Ingest(_) => ErrorSeverity::Critical,
            RunEconError::Calculation(err) => err.severity(),
            RunEconError::Export(ExportError::Chart { .. }) => ErrorSeverity::Warning,
            RunEconError::Configuration(_) => ErrorSeverity::Error,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            RunEconError::Ingest(IngestError::FileNotFound { path }) => {
                format!("Could not find metabolic data file: {}", path.display())
            }
            RunEconError::Ingest(IngestError::MissingColumns { columns, .. }) => {
                format!(
                    "The input file is missing required columns: {}. Use the same structure as sample_raw_metabolic_data.csv.",
                    columns
                )
            }
            RunEconError::Calculation(CalculationError::InsufficientSample { .. }) => {
                "Not enough complete subjects to fit the speed vs power model.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl CalculationError {
    /// Per-subject problems only exclude that subject; the run continues.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CalculationError::InsufficientWindow { .. }
            | CalculationError::InvalidBodyMass { .. }
            | CalculationError::MissingSpeed { .. }
            | CalculationError::InsufficientSample { .. }
            | CalculationError::DegeneratePredictor { .. } => ErrorSeverity::Warning,
            CalculationError::LengthMismatch { .. } | CalculationError::Distribution(_) => {
                ErrorSeverity::Error
            }
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The run cannot continue
    Critical,
    /// Error that prevents an operation but the run can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = RunEconError::Ingest(IngestError::FileNotFound {
            path: PathBuf::from("/data/missing.csv"),
        });
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = RunEconError::Calculation(CalculationError::InsufficientWindow {
            subject_id: "S01".to_string(),
            phase: "rest".to_string(),
            reason: "phase absent".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_user_messages() {
        let err = RunEconError::Ingest(IngestError::MissingColumns {
            path: PathBuf::from("upload.csv"),
            columns: "phase, VO2_ml_min".to_string(),
        });
        let message = err.user_message();
        assert!(message.contains("phase, VO2_ml_min"));

        let err = RunEconError::Calculation(CalculationError::InsufficientSample {
            count: 1,
            required: 2,
        });
        assert!(err.user_message().contains("Not enough"));
    }
}
