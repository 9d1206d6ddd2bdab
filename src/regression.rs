//! Speed vs net metabolic power regression
//!
//! Ordinary least squares fit of `speed = b0 + b1 * power` across subjects,
//! with Student-t inference on the coefficients and on the mean prediction.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::CalculationError;
use crate::models::SubjectSummary;

/// Minimum number of complete subjects for a fit
pub const MIN_SAMPLE: usize = 2;

/// Confidence level used for all reported intervals
pub const CONFIDENCE: f64 = 0.95;

/// Estimate and inference for one coefficient.
///
/// Inference fields are `None` when there are no residual degrees of freedom
/// (exactly two subjects).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub estimate: f64,
    pub std_error: Option<f64>,
    pub t_value: Option<f64>,
    pub p_value: Option<f64>,
    pub ci_lower: Option<f64>,
    pub ci_upper: Option<f64>,
}

/// Mean prediction with its 95% confidence interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub x: f64,
    pub mean: f64,
    pub ci_lower: Option<f64>,
    pub ci_upper: Option<f64>,
}

/// Fitted single-predictor OLS model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    pub n: usize,
    pub degrees_of_freedom: usize,
    pub intercept: Coefficient,
    pub slope: Coefficient,
    pub r_squared: f64,
    /// Residual standard error
    pub sigma: f64,
    x_mean: f64,
    sxx: f64,
    t_critical: Option<f64>,
}

impl RegressionModel {
    /// Fit speed on net metabolic power
    pub fn fit_speed_vs_power(summaries: &[SubjectSummary]) -> Result<Self, CalculationError> {
        let (x, y): (Vec<f64>, Vec<f64>) = summaries
            .iter()
            .filter(|s| s.net_metabolic_power_wkg.is_finite() && s.speed_m_per_s.is_finite())
            .map(|s| (s.net_metabolic_power_wkg, s.speed_m_per_s))
            .unzip();
        Self::fit(&x, &y)
    }

    /// Fit `y = b0 + b1 * x`
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self, CalculationError> {
        if x.len() != y.len() {
            return Err(CalculationError::LengthMismatch {
                x_len: x.len(),
                y_len: y.len(),
            });
        }
        let n = x.len();
        if n < MIN_SAMPLE {
            return Err(CalculationError::InsufficientSample {
                count: n,
                required: MIN_SAMPLE,
            });
        }

        let nf = n as f64;
        let x_mean = x.iter().sum::<f64>() / nf;
        let y_mean = y.iter().sum::<f64>() / nf;

        let sxx: f64 = x.iter().map(|xi| (xi - x_mean).powi(2)).sum();
        let sxy: f64 = x
            .iter()
            .zip(y)
            .map(|(xi, yi)| (xi - x_mean) * (yi - y_mean))
            .sum();
        let syy: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();

        // Spread below rounding noise of the mean counts as constant
        if sxx <= (f64::EPSILON * x_mean.abs().max(1.0)).powi(2) * nf {
            return Err(CalculationError::DegeneratePredictor { count: n });
        }

        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;

        let sse: f64 = x
            .iter()
            .zip(y)
            .map(|(xi, yi)| (yi - (intercept + slope * xi)).powi(2))
            .sum();
        let r_squared = if syy > 0.0 { 1.0 - sse / syy } else { 1.0 };

        let dof = n - 2;
        let (sigma, t_critical) = if dof > 0 {
            let dist = StudentsT::new(0.0, 1.0, dof as f64)
                .map_err(|e| CalculationError::Distribution(e.to_string()))?;
            let t_crit = dist.inverse_cdf(1.0 - (1.0 - CONFIDENCE) / 2.0);
            ((sse / dof as f64).sqrt(), Some(t_crit))
        } else {
            (0.0, None)
        };

        let slope_se = t_critical.map(|_| sigma / sxx.sqrt());
        let intercept_se = t_critical.map(|_| sigma * (1.0 / nf + x_mean * x_mean / sxx).sqrt());

        let slope_coef = Self::coefficient(slope, slope_se, t_critical, dof)?;
        let intercept_coef = Self::coefficient(intercept, intercept_se, t_critical, dof)?;

        Ok(Self {
            n,
            degrees_of_freedom: dof,
            intercept: intercept_coef,
            slope: slope_coef,
            r_squared,
            sigma,
            x_mean,
            sxx,
            t_critical,
        })
    }

    fn coefficient(
        estimate: f64,
        std_error: Option<f64>,
        t_critical: Option<f64>,
        dof: usize,
    ) -> Result<Coefficient, CalculationError> {
        let (Some(se), Some(t_crit)) = (std_error, t_critical) else {
            return Ok(Coefficient {
                estimate,
                std_error: None,
                t_value: None,
                p_value: None,
                ci_lower: None,
                ci_upper: None,
            });
        };

        let t_value = if se > 0.0 {
            estimate / se
        } else if estimate == 0.0 {
            0.0
        } else {
            f64::INFINITY.copysign(estimate)
        };

        let p_value = if t_value.is_finite() {
            let dist = StudentsT::new(0.0, 1.0, dof as f64)
                .map_err(|e| CalculationError::Distribution(e.to_string()))?;
            (2.0 * dist.sf(t_value.abs())).min(1.0)
        } else {
            // Perfect fit
            0.0
        };

        Ok(Coefficient {
            estimate,
            std_error: Some(se),
            t_value: Some(t_value),
            p_value: Some(p_value),
            ci_lower: Some(estimate - t_crit * se),
            ci_upper: Some(estimate + t_crit * se),
        })
    }

    /// Point prediction
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept.estimate + self.slope.estimate * x
    }

    /// Mean prediction with 95% confidence band
    pub fn predict_mean(&self, x: f64) -> Prediction {
        let mean = self.predict(x);
        match self.t_critical {
            Some(t_crit) => {
                let se = self.sigma
                    * (1.0 / self.n as f64 + (x - self.x_mean).powi(2) / self.sxx).sqrt();
                Prediction {
                    x,
                    mean,
                    ci_lower: Some(mean - t_crit * se),
                    ci_upper: Some(mean + t_crit * se),
                }
            }
            None => Prediction {
                x,
                mean,
                ci_lower: None,
                ci_upper: None,
            },
        }
    }

    /// Evenly spaced mean predictions from `x_min` to `x_max` inclusive
    pub fn prediction_grid(&self, x_min: f64, x_max: f64, points: usize) -> Vec<Prediction> {
        match points {
            0 => Vec::new(),
            1 => vec![self.predict_mean(x_min)],
            _ => {
                let step = (x_max - x_min) / (points - 1) as f64;
                (0..points)
                    .map(|i| self.predict_mean(x_min + step * i as f64))
                    .collect()
            }
        }
    }
}

/// Outcome of a Pearson correlation estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correlation {
    Coefficient(f64),
    /// Fewer than two pairs
    TooFewPairs,
    /// One of the variables is constant
    ZeroVariance,
}

impl Correlation {
    pub fn value(&self) -> Option<f64> {
        match self {
            Correlation::Coefficient(r) => Some(*r),
            _ => None,
        }
    }
}

/// Pearson correlation over the pairs of `x` and `y` (up to the shorter slice)
pub fn pearson_r(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len().min(y.len());
    if n < 2 {
        return Correlation::TooFewPairs;
    }
    let nf = n as f64;
    let x_mean = x[..n].iter().sum::<f64>() / nf;
    let y_mean = y[..n].iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (xi, yi) in x[..n].iter().zip(&y[..n]) {
        sxy += (xi - x_mean) * (yi - y_mean);
        sxx += (xi - x_mean).powi(2);
        syy += (yi - y_mean).powi(2);
    }

    if sxx == 0.0 || syy == 0.0 {
        Correlation::ZeroVariance
    } else {
        Correlation::Coefficient(sxy / (sxx * syy).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, power: f64, speed: f64) -> SubjectSummary {
        SubjectSummary {
            subject_id: id.to_string(),
            rest_vo2_ml_min: 300.0,
            run_vo2_ml_min: 2000.0,
            rest_vco2_ml_min: 250.0,
            run_vco2_ml_min: 1800.0,
            net_vo2_ml_min: 1700.0,
            net_vco2_ml_min: 1550.0,
            running_economy_ml_kg_min: 24.0,
            net_metabolic_power_wkg: power,
            speed_m_per_s: speed,
        }
    }

    #[test]
    fn test_perfect_linear_fit_recovers_coefficients() {
        let powers = [6.0, 8.0, 10.0, 12.0, 14.0];
        let summaries: Vec<SubjectSummary> = powers
            .iter()
            .enumerate()
            .map(|(i, p)| summary(&format!("S{i}"), *p, 0.5 + 0.25 * p))
            .collect();

        let model = RegressionModel::fit_speed_vs_power(&summaries).unwrap();
        assert_eq!(model.n, 5);
        assert!((model.slope.estimate - 0.25).abs() < 1e-12);
        assert!((model.intercept.estimate - 0.5).abs() < 1e-12);
        assert!((model.r_squared - 1.0).abs() < 1e-12);
        assert!(model.slope.p_value.unwrap() < 1e-10);
    }

    #[test]
    fn test_noisy_fit_inference() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.1, 3.9, 6.2, 7.8, 10.1];
        let model = RegressionModel::fit(&x, &y).unwrap();

        // sxx = 10, sxy = 19.9
        assert!((model.slope.estimate - 1.99).abs() < 1e-12);
        assert!((model.intercept.estimate - 0.05).abs() < 1e-12);
        assert_eq!(model.degrees_of_freedom, 3);

        let slope = model.slope;
        let (lo, hi) = (slope.ci_lower.unwrap(), slope.ci_upper.unwrap());
        assert!(lo < 1.99 && 1.99 < hi);
        // t(0.975, 3) = 3.182446...
        let se = slope.std_error.unwrap();
        assert!(((hi - 1.99) / se - 3.182446).abs() < 1e-4);
        assert!(slope.p_value.unwrap() < 0.001);
    }

    #[test]
    fn test_two_subjects_has_no_inference() {
        let model = RegressionModel::fit(&[5.0, 10.0], &[2.0, 3.0]).unwrap();
        assert_eq!(model.degrees_of_freedom, 0);
        assert!((model.slope.estimate - 0.2).abs() < 1e-12);
        assert_eq!(model.slope.p_value, None);
        assert_eq!(model.predict_mean(7.5).ci_lower, None);
    }

    #[test]
    fn test_insufficient_sample() {
        let err = RegressionModel::fit(&[5.0], &[2.0]).unwrap_err();
        assert_eq!(
            err,
            CalculationError::InsufficientSample {
                count: 1,
                required: 2
            }
        );
        assert!(RegressionModel::fit_speed_vs_power(&[]).is_err());
    }

    #[test]
    fn test_degenerate_predictor() {
        let err = RegressionModel::fit(&[7.0, 7.0, 7.0], &[2.0, 3.0, 4.0]).unwrap_err();
        assert!(matches!(err, CalculationError::DegeneratePredictor { count: 3 }));
    }

    #[test]
    fn test_prediction_band_narrowest_at_mean() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.1, 3.9, 6.2, 7.8, 10.1];
        let model = RegressionModel::fit(&x, &y).unwrap();

        let width = |p: Prediction| p.ci_upper.unwrap() - p.ci_lower.unwrap();
        let grid = model.prediction_grid(1.0, 5.0, 5);
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[0].x, 1.0);
        assert_eq!(grid[4].x, 5.0);
        assert!(width(grid[2]) < width(grid[0]));
        assert!((width(grid[0]) - width(grid[4])).abs() < 1e-9);
    }

    #[test]
    fn test_small_scale_predictor_is_not_degenerate() {
        let model = RegressionModel::fit(&[1e-9, 2e-9, 3e-9], &[1.0, 2.0, 3.0]).unwrap();
        assert!((model.slope.estimate / 1e9 - 1.0).abs() < 1e-6);

        let err = RegressionModel::fit(&[1e8, 1e8, 1e8], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, CalculationError::DegeneratePredictor { count: 3 }));
    }

    #[test]
    fn test_mismatched_lengths() {
        let err = RegressionModel::fit(&[1.0, 2.0, 3.0], &[1.0, 2.0]).unwrap_err();
        assert_eq!(err, CalculationError::LengthMismatch { x_len: 3, y_len: 2 });
    }

    #[test]
    fn test_pearson_r() {
        assert_eq!(pearson_r(&[1.0], &[2.0]), Correlation::TooFewPairs);
        assert_eq!(pearson_r(&[1.0, 1.0], &[2.0, 3.0]), Correlation::ZeroVariance);
        assert_eq!(pearson_r(&[1.0, 2.0], &[3.0, 3.0]), Correlation::ZeroVariance);
        let r = pearson_r(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).value().unwrap();
        assert!((r + 1.0).abs() < 1e-12);
    }
}
