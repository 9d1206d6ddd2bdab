// Library interface for runecon modules
// Integration tests and benches drive the pipeline through these exports

#[cfg(feature = "charts")]
pub mod charts;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod regression;
pub mod report;
pub mod window;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use error::{CalculationError, ExportError, IngestError, Result, RunEconError};
pub use export::RegressionReport;
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use metrics::{summarize_all, summarize_subject, MetabolicMetrics, SummaryOutcome};
pub use models::{Dataset, Observation, Phase, SubjectMetadata, SubjectSummary};
pub use regression::RegressionModel;
pub use window::{extract_window, PhaseWindow};
