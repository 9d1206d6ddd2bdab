use serde::{Deserialize, Serialize};

use crate::error::CalculationError;
use crate::regression::RegressionModel;

pub mod csv;
pub mod json;

/// Outcome of the cross-subject regression as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RegressionReport {
    Fitted { model: RegressionModel },
    Undefined { reason: String },
}

impl RegressionReport {
    pub fn from_fit(fit: Result<RegressionModel, CalculationError>) -> Self {
        match fit {
            Ok(model) => RegressionReport::Fitted { model },
            Err(err) => RegressionReport::Undefined {
                reason: err.to_string(),
            },
        }
    }

    pub fn model(&self) -> Option<&RegressionModel> {
        match self {
            RegressionReport::Fitted { model } => Some(model),
            RegressionReport::Undefined { .. } => None,
        }
    }
}
