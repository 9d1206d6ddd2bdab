use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Protocol phase a cart sample was recorded in
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Rest,
    Run,
    /// Any other label (warm-up, recovery, ...). Kept but never summarised.
    Other(String),
}

impl Phase {
    /// Parse a phase label against the configured rest/run labels.
    pub fn from_label(label: &str, rest_label: &str, run_label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case(rest_label) {
            Phase::Rest
        } else if trimmed.eq_ignore_ascii_case(run_label) {
            Phase::Run
        } else {
            Phase::Other(trimmed.to_lowercase())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Phase::Rest => "rest",
            Phase::Run => "run",
            Phase::Other(label) => label.as_str(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Single breath-by-breath (or averaged) metabolic cart sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub subject_id: String,
    /// Seconds since the start of the subject's recording
    pub time_s: f64,
    pub phase: Phase,
    /// Oxygen uptake (mL/min)
    pub vo2_ml_min: f64,
    /// Carbon dioxide output (mL/min)
    pub vco2_ml_min: f64,
    /// Treadmill speed (m/s) when the recording carries it per row
    #[serde(default)]
    pub speed_m_per_s: Option<f64>,
}

/// Per-subject anthropometrics and test speed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectMetadata {
    pub subject_id: String,
    pub body_mass_kg: Option<f64>,
    pub speed_m_per_s: Option<f64>,
}

impl SubjectMetadata {
    pub fn new(subject_id: impl Into<String>, body_mass_kg: f64, speed_m_per_s: f64) -> Self {
        Self {
            subject_id: subject_id.into(),
            body_mass_kg: Some(body_mass_kg),
            speed_m_per_s: Some(speed_m_per_s),
        }
    }
}

/// Everything ingested from one recording, grouped by subject
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Observations per subject, sorted by time
    pub observations: BTreeMap<String, Vec<Observation>>,
    pub metadata: BTreeMap<String, SubjectMetadata>,
    /// Rows rejected during ingestion
    pub skipped_rows: usize,
}

impl Dataset {
    pub fn subject_ids(&self) -> impl Iterator<Item = &String> {
        self.observations.keys()
    }

    pub fn subject_count(&self) -> usize {
        self.observations.len()
    }

    pub fn observation_count(&self) -> usize {
        self.observations.values().map(Vec::len).sum()
    }

    pub fn observations_for(&self, subject_id: &str) -> &[Observation] {
        self.observations
            .get(subject_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// One row of the exported summary; field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub subject_id: String,
    pub rest_vo2_ml_min: f64,
    pub run_vo2_ml_min: f64,
    pub rest_vco2_ml_min: f64,
    pub run_vco2_ml_min: f64,
    pub net_vo2_ml_min: f64,
    pub net_vco2_ml_min: f64,
    pub running_economy_ml_kg_min: f64,
    #[serde(rename = "net_metabolic_power_Wkg")]
    pub net_metabolic_power_wkg: f64,
    pub speed_m_per_s: f64,
}

/// Summary CSV header, in order
pub const SUMMARY_COLUMNS: [&str; 10] = [
    "subject_id",
    "rest_vo2_ml_min",
    "run_vo2_ml_min",
    "rest_vco2_ml_min",
    "run_vco2_ml_min",
    "net_vo2_ml_min",
    "net_vco2_ml_min",
    "running_economy_ml_kg_min",
    "net_metabolic_power_Wkg",
    "speed_m_per_s",
];
