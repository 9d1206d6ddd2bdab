//! Net gas exchange, running economy and net metabolic power
//!
//! Energy expenditure uses the Brockway caloric equivalents of oxygen and
//! carbon dioxide (kJ per litre):
//!
//! ```text
//! energy_kJ_min = 16.58 * VO2_L_min + 4.51 * VCO2_L_min
//! power_W       = energy_kJ_min * 1000 / 60
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CalculationError, ErrorSeverity};
use crate::models::{Dataset, Observation, Phase, SubjectMetadata, SubjectSummary};
use crate::window::{extract_window, mean, PhaseWindow};

/// kJ released per litre of O2 consumed
pub const KJ_PER_L_O2: f64 = 16.58;
/// kJ attributed per litre of CO2 produced
pub const KJ_PER_L_CO2: f64 = 4.51;
/// z value for a two-sided 95% normal interval
pub const Z_95: f64 = 1.96;

/// Derived metrics for one subject before they are flattened into a summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetabolicMetrics {
    pub rest_vo2_ml_min: f64,
    pub run_vo2_ml_min: f64,
    pub rest_vco2_ml_min: f64,
    pub run_vco2_ml_min: f64,
    pub net_vo2_ml_min: f64,
    pub net_vco2_ml_min: f64,
    pub running_economy_ml_kg_min: f64,
    pub energy_kj_min: f64,
    pub power_w: f64,
    pub net_metabolic_power_wkg: f64,
}

/// Energy expenditure rate in kJ/min from gas exchange in mL/min
pub fn energy_kj_per_min(vo2_ml_min: f64, vco2_ml_min: f64) -> f64 {
    KJ_PER_L_O2 * (vo2_ml_min / 1000.0) + KJ_PER_L_CO2 * (vco2_ml_min / 1000.0)
}

/// kJ/min to watts
pub fn kj_per_min_to_watts(energy_kj_min: f64) -> f64 {
    energy_kj_min * 1000.0 / 60.0
}

/// Compute net metrics from the rest and run steady-state windows.
pub fn compute_metrics(
    subject_id: &str,
    rest: &PhaseWindow<'_>,
    run: &PhaseWindow<'_>,
    body_mass_kg: f64,
) -> Result<MetabolicMetrics, CalculationError> {
    if !(body_mass_kg.is_finite() && body_mass_kg > 0.0) {
        return Err(CalculationError::InvalidBodyMass {
            subject_id: subject_id.to_string(),
            value: body_mass_kg.to_string(),
        });
    }

    for window in [rest, run] {
        if window.is_empty() {
            return Err(CalculationError::InsufficientWindow {
                subject_id: subject_id.to_string(),
                phase: window.phase.to_string(),
                reason: "no observations in steady-state window".to_string(),
            });
        }
    }

    let rest_vo2 = rest.mean_vo2();
    let run_vo2 = run.mean_vo2();
    let rest_vco2 = rest.mean_vco2();
    let run_vco2 = run.mean_vco2();

    let net_vo2 = run_vo2 - rest_vo2;
    let net_vco2 = run_vco2 - rest_vco2;
    let energy_kj_min = energy_kj_per_min(net_vo2, net_vco2);
    let power_w = kj_per_min_to_watts(energy_kj_min);

    Ok(MetabolicMetrics {
        rest_vo2_ml_min: rest_vo2,
        run_vo2_ml_min: run_vo2,
        rest_vco2_ml_min: rest_vco2,
        run_vco2_ml_min: run_vco2,
        net_vo2_ml_min: net_vo2,
        net_vco2_ml_min: net_vco2,
        running_economy_ml_kg_min: net_vo2 / body_mass_kg,
        energy_kj_min,
        power_w,
        net_metabolic_power_wkg: power_w / body_mass_kg,
    })
}

/// Summarise one subject from its observations and metadata.
pub fn summarize_subject(
    subject_id: &str,
    observations: &[Observation],
    metadata: Option<&SubjectMetadata>,
    window_s: f64,
) -> Result<SubjectSummary, CalculationError> {
    let rest = extract_window(observations, &Phase::Rest, window_s)?;
    let run = extract_window(observations, &Phase::Run, window_s)?;

    let body_mass_kg = metadata.and_then(|m| m.body_mass_kg).ok_or_else(|| {
        CalculationError::InvalidBodyMass {
            subject_id: subject_id.to_string(),
            value: "missing".to_string(),
        }
    })?;
    // A metadata-file speed wins over the per-row speeds of the run window
    let speed_m_per_s = metadata
        .and_then(|m| m.speed_m_per_s)
        .or_else(|| run.mean_speed())
        .ok_or_else(|| CalculationError::MissingSpeed {
            subject_id: subject_id.to_string(),
        })?;

    let metrics = compute_metrics(subject_id, &rest, &run, body_mass_kg)?;

    debug!(
        subject_id,
        rest_samples = rest.len(),
        run_samples = run.len(),
        net_vo2 = metrics.net_vo2_ml_min,
        power_wkg = metrics.net_metabolic_power_wkg,
        "Subject summarised"
    );

    Ok(SubjectSummary {
        subject_id: subject_id.to_string(),
        rest_vo2_ml_min: metrics.rest_vo2_ml_min,
        run_vo2_ml_min: metrics.run_vo2_ml_min,
        rest_vco2_ml_min: metrics.rest_vco2_ml_min,
        run_vco2_ml_min: metrics.run_vco2_ml_min,
        net_vo2_ml_min: metrics.net_vo2_ml_min,
        net_vco2_ml_min: metrics.net_vco2_ml_min,
        running_economy_ml_kg_min: metrics.running_economy_ml_kg_min,
        net_metabolic_power_wkg: metrics.net_metabolic_power_wkg,
        speed_m_per_s,
    })
}

/// Summaries for every subject that has complete data, plus the exclusions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryOutcome {
    /// Sorted by subject id
    pub summaries: Vec<SubjectSummary>,
    pub excluded: Vec<(String, CalculationError)>,
}

/// Summarise all subjects; incomplete subjects are excluded with a warning.
pub fn summarize_all(dataset: &Dataset, window_s: f64) -> SummaryOutcome {
    let mut outcome = SummaryOutcome::default();

    for (subject_id, observations) in &dataset.observations {
        match summarize_subject(
            subject_id,
            observations,
            dataset.metadata.get(subject_id),
            window_s,
        ) {
            Ok(summary) => outcome.summaries.push(summary),
            Err(err) => {
                if err.severity() == ErrorSeverity::Warning {
                    warn!(
                        subject_id = %subject_id,
                        reason = %err,
                        "Excluding subject from summary"
                    );
                } else {
                    tracing::error!(
                        subject_id = %subject_id,
                        reason = %err,
                        "Excluding subject from summary"
                    );
                }
                outcome.excluded.push((subject_id.clone(), err));
            }
        }
    }

    outcome
}

/// Phase mean with a 95% normal interval (mean ± 1.96·SEM, sample SD).
///
/// The interval collapses to the mean for a single sample.
pub fn mean_ci(values: &[f64]) -> Option<(f64, f64, f64)> {
    let m = mean(values.iter().copied())?;
    let half = if values.len() > 1 {
        let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
        Z_95 * var.sqrt() / (values.len() as f64).sqrt()
    } else {
        0.0
    };
    Some((m, m - half, m + half))
}
