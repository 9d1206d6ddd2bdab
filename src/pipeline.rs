//! Batch pipeline: ingest, summarise, export, fit and plot

use std::path::PathBuf;
use tracing::{info, info_span, warn};

use crate::config::AppConfig;
use crate::error::Result;
use crate::export::{self, RegressionReport};
use crate::import;
use crate::metrics::{summarize_all, SummaryOutcome};
use crate::models::Dataset;
use crate::regression::RegressionModel;

/// File name of the cross-subject chart
pub const SPEED_VS_POWER_CHART: &str = "speed_vs_power.svg";

/// Everything a pipeline run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub dataset: Dataset,
    pub outcome: SummaryOutcome,
    pub regression: RegressionReport,
    pub summary_path: PathBuf,
    pub regression_path: PathBuf,
    pub charts: Vec<PathBuf>,
}

/// Ingest and summarise without writing anything
pub fn analyze(config: &AppConfig) -> Result<(Dataset, SummaryOutcome)> {
    let dataset = import::load_dataset(
        &config.input.data_path,
        config.input.metadata_path.as_deref(),
        &config.analysis,
    )?;
    let outcome = summarize_all(&dataset, config.analysis.window_s);

    info!(
        complete = outcome.summaries.len(),
        excluded = outcome.excluded.len(),
        "Subjects summarised"
    );

    Ok((dataset, outcome))
}

/// Run the full pipeline with the given configuration.
///
/// Only ingestion and summary export failures are fatal; an undefined model
/// or a failed chart is logged and reported in the output.
pub fn run(config: &AppConfig) -> Result<PipelineOutput> {
    let _span = info_span!("pipeline", input = %config.input.data_path.display()).entered();

    let (dataset, outcome) = analyze(config)?;

    let summary_path = config.output.summary_path();
    export::csv::export_summaries(&outcome.summaries, &summary_path)?;
    info!(path = %summary_path.display(), rows = outcome.summaries.len(), "Summary written");

    let regression = RegressionReport::from_fit(RegressionModel::fit_speed_vs_power(
        &outcome.summaries,
    ));
    match &regression {
        RegressionReport::Fitted { model } => info!(
            n = model.n,
            intercept = model.intercept.estimate,
            slope = model.slope.estimate,
            r_squared = model.r_squared,
            "Regression fitted"
        ),
        RegressionReport::Undefined { reason } => {
            warn!(reason = %reason, "Regression model undefined")
        }
    }

    let regression_path = config.output.regression_path();
    export::json::export_regression_report(&regression, &regression_path)?;

    let charts = if config.output.plots {
        render_charts(config, &dataset, &outcome, &regression)
    } else {
        Vec::new()
    };

    Ok(PipelineOutput {
        dataset,
        outcome,
        regression,
        summary_path,
        regression_path,
        charts,
    })
}

#[cfg(feature = "charts")]
fn render_charts(
    config: &AppConfig,
    dataset: &Dataset,
    outcome: &SummaryOutcome,
    regression: &RegressionReport,
) -> Vec<PathBuf> {
    use crate::charts;

    let plot_dir = config.output.plot_path();
    let subject_ids: Vec<String> = dataset.subject_ids().cloned().collect();
    let mut written =
        charts::render_subject_charts(dataset, &subject_ids, config.analysis.window_s, &plot_dir);

    match regression.model() {
        Some(model) => {
            let path = plot_dir.join(SPEED_VS_POWER_CHART);
            match charts::render_speed_vs_power(&outcome.summaries, model, &path) {
                Ok(()) => written.push(path),
                Err(err) => warn!(reason = %err, "Regression chart skipped"),
            }
        }
        None => warn!("Regression chart skipped: model undefined"),
    }

    info!(count = written.len(), dir = %plot_dir.display(), "Charts written");
    written
}

#[cfg(not(feature = "charts"))]
fn render_charts(
    _config: &AppConfig,
    _dataset: &Dataset,
    _outcome: &SummaryOutcome,
    _regression: &RegressionReport,
) -> Vec<PathBuf> {
    warn!("Built without the `charts` feature; skipping plots");
    Vec::new()
}
