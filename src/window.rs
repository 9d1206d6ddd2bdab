//! Steady-state window extraction
//!
//! A phase window is the trailing `window_s` seconds of one phase of one
//! subject's recording. Phases that are absent, or that do not span the full
//! window, produce a missing-data error instead of a partial average.

use crate::error::CalculationError;
use crate::models::{Observation, Phase};

/// Default steady-state window in seconds
pub const DEFAULT_WINDOW_S: f64 = 120.0;

/// Trailing slice of one phase. Borrowed from the subject's observations.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseWindow<'a> {
    pub phase: Phase,
    /// First time included in the window
    pub start_s: f64,
    /// Last sample time of the phase
    pub end_s: f64,
    pub samples: Vec<&'a Observation>,
}

impl<'a> PhaseWindow<'a> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean_vo2(&self) -> f64 {
        mean(self.samples.iter().map(|o| o.vo2_ml_min)).unwrap_or(f64::NAN)
    }

    pub fn mean_vco2(&self) -> f64 {
        mean(self.samples.iter().map(|o| o.vco2_ml_min)).unwrap_or(f64::NAN)
    }

    /// Mean over the samples that carry a speed
    pub fn mean_speed(&self) -> Option<f64> {
        mean(self.samples.iter().filter_map(|o| o.speed_m_per_s))
    }
}

/// Time range `(first, last)` covered by a phase, if it has any samples
pub fn phase_span(observations: &[Observation], phase: &Phase) -> Option<(f64, f64)> {
    observations
        .iter()
        .filter(|o| &o.phase == phase)
        .fold(None, |span, o| match span {
            None => Some((o.time_s, o.time_s)),
            Some((lo, hi)) => Some((f64::min(lo, o.time_s), f64::max(hi, o.time_s))),
        })
}

/// Select the trailing `window_s` seconds of `phase`.
///
/// Observations need not be sorted. The window is `[end - window_s, end]`
/// where `end` is the phase's last timestamp.
pub fn extract_window<'a>(
    observations: &'a [Observation],
    phase: &Phase,
    window_s: f64,
) -> Result<PhaseWindow<'a>, CalculationError> {
    let subject_id = observations
        .first()
        .map(|o| o.subject_id.clone())
        .unwrap_or_default();

    let (first, last) =
        phase_span(observations, phase).ok_or_else(|| CalculationError::InsufficientWindow {
            subject_id: subject_id.clone(),
            phase: phase.to_string(),
            reason: "phase absent".to_string(),
        })?;

    let covered = last - first;
    if covered < window_s {
        return Err(CalculationError::InsufficientWindow {
            subject_id,
            phase: phase.to_string(),
            reason: format!(
                "phase covers {:.1} s, steady-state window requires {:.1} s",
                covered, window_s
            ),
        });
    }

    let start_s = last - window_s;
    let samples: Vec<&Observation> = observations
        .iter()
        .filter(|o| &o.phase == phase && o.time_s >= start_s)
        .collect();

    Ok(PhaseWindow {
        phase: phase.clone(),
        start_s,
        end_s: last,
        samples,
    })
}

/// Arithmetic mean, `None` for an empty input
pub(crate) fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
