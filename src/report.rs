//! Filtering and narrative reporting over subject summaries

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::models::SubjectSummary;
use crate::regression::{pearson_r, Correlation};

/// |r| above which an association is called out
const ASSOCIATION_THRESHOLD: f64 = 0.3;

/// Inclusive net metabolic power range (W/kg)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerRange {
    pub min: f64,
    pub max: f64,
}

impl PowerRange {
    pub fn new(min: f64, max: f64) -> Self {
        PowerRange { min, max }
    }

    /// A range whose minimum exceeds its maximum matches nothing
    pub fn is_inverted(&self) -> bool {
        self.min > self.max
    }

    /// Full range spanned by the summaries
    pub fn of(summaries: &[SubjectSummary]) -> Option<Self> {
        let mut powers = summaries.iter().map(|s| s.net_metabolic_power_wkg);
        let first = powers.next()?;
        let (min, max) = powers.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(PowerRange { min, max })
    }

    /// Keep the given bounds as they are and fill a missing side from the data
    pub fn resolve(
        min: Option<f64>,
        max: Option<f64>,
        summaries: &[SubjectSummary],
    ) -> Option<Self> {
        let data = PowerRange::of(summaries);
        let min = min.or(data.map(|r| r.min))?;
        let max = max.or(data.map(|r| r.max))?;
        Some(PowerRange::new(min, max))
    }

    pub fn contains(&self, power: f64) -> bool {
        power >= self.min && power <= self.max
    }
}

/// Summaries whose net metabolic power falls inside `range`
pub fn filter_by_power(summaries: &[SubjectSummary], range: PowerRange) -> Vec<SubjectSummary> {
    summaries
        .iter()
        .filter(|s| range.contains(s.net_metabolic_power_wkg))
        .cloned()
        .collect()
}

/// Aggregate view of a group of subjects
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub count: usize,
    pub mean_power_wkg: f64,
    pub mean_speed_m_per_s: f64,
    pub mean_running_economy: f64,
    pub power_speed_r: Correlation,
    /// Lowest running economy (least O2 per kg)
    pub most_economical: SubjectSummary,
    pub least_economical: SubjectSummary,
}

impl GroupSummary {
    pub fn from_summaries(summaries: &[SubjectSummary]) -> Option<Self> {
        let first = summaries.first()?;
        let n = summaries.len() as f64;

        let mut most = first;
        let mut least = first;
        for summary in summaries {
            if summary.running_economy_ml_kg_min < most.running_economy_ml_kg_min {
                most = summary;
            }
            if summary.running_economy_ml_kg_min > least.running_economy_ml_kg_min {
                least = summary;
            }
        }

        let powers: Vec<f64> = summaries.iter().map(|s| s.net_metabolic_power_wkg).collect();
        let speeds: Vec<f64> = summaries.iter().map(|s| s.speed_m_per_s).collect();

        Some(GroupSummary {
            count: summaries.len(),
            mean_power_wkg: powers.iter().sum::<f64>() / n,
            mean_speed_m_per_s: speeds.iter().sum::<f64>() / n,
            mean_running_economy: summaries
                .iter()
                .map(|s| s.running_economy_ml_kg_min)
                .sum::<f64>()
                / n,
            power_speed_r: pearson_r(&powers, &speeds),
            most_economical: most.clone(),
            least_economical: least.clone(),
        })
    }

    fn association_text(&self) -> String {
        match self.power_speed_r {
            Correlation::TooFewPairs => "not enough data to estimate the relationship.".to_string(),
            Correlation::ZeroVariance => {
                "no measurable relationship: net metabolic power or speed is identical \
                 across the group."
                    .to_string()
            }
            Correlation::Coefficient(r) if r > ASSOCIATION_THRESHOLD => format!(
                "a positive association between net metabolic power and speed (r ≈ {:.2}), \
                 suggesting that faster runners tend to have higher metabolic cost.",
                r
            ),
            Correlation::Coefficient(r) if r < -ASSOCIATION_THRESHOLD => format!(
                "a negative association between net metabolic power and speed (r ≈ {:.2}).",
                r
            ),
            Correlation::Coefficient(r) => format!(
                "a weak or no clear association between net metabolic power and speed (r ≈ {:.2}).",
                r
            ),
        }
    }

    /// Human-readable narrative for the group
    pub fn narrative(&self) -> String {
        format!(
            "- The current filter includes {} subject(s).\n\
             - Average net metabolic power is approximately {:.2} W/kg, with an average speed of {:.2} m/s.\n\
             - Mean running economy is about {:.1} mL·kg⁻¹·min⁻¹.\n\
             - There appears to be {}\n\
             - The most economical runner in this group is {} with a running economy of {:.1} mL·kg⁻¹·min⁻¹.\n\
             - The least economical runner is {} with {:.1} mL·kg⁻¹·min⁻¹.\n",
            self.count,
            self.mean_power_wkg,
            self.mean_speed_m_per_s,
            self.mean_running_economy,
            self.association_text(),
            self.most_economical.subject_id,
            self.most_economical.running_economy_ml_kg_min,
            self.least_economical.subject_id,
            self.least_economical.running_economy_ml_kg_min,
        )
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Subject")]
    subject_id: String,
    #[tabled(rename = "Rest VO₂")]
    rest_vo2: String,
    #[tabled(rename = "Run VO₂")]
    run_vo2: String,
    #[tabled(rename = "Net VO₂")]
    net_vo2: String,
    #[tabled(rename = "Net VCO₂")]
    net_vco2: String,
    #[tabled(rename = "RE (mL/kg/min)")]
    running_economy: String,
    #[tabled(rename = "Power (W/kg)")]
    power: String,
    #[tabled(rename = "Speed (m/s)")]
    speed: String,
}

impl From<&SubjectSummary> for SummaryRow {
    fn from(s: &SubjectSummary) -> Self {
        SummaryRow {
            subject_id: s.subject_id.clone(),
            rest_vo2: format!("{:.0}", s.rest_vo2_ml_min),
            run_vo2: format!("{:.0}", s.run_vo2_ml_min),
            net_vo2: format!("{:.0}", s.net_vo2_ml_min),
            net_vco2: format!("{:.0}", s.net_vco2_ml_min),
            running_economy: format!("{:.1}", s.running_economy_ml_kg_min),
            power: format!("{:.2}", s.net_metabolic_power_wkg),
            speed: format!("{:.2}", s.speed_m_per_s),
        }
    }
}

/// Terminal table of subject summaries
pub fn summary_table(summaries: &[SubjectSummary]) -> String {
    let rows: Vec<SummaryRow> = summaries.iter().map(SummaryRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// One-line running economy, power and speed for a single subject
pub fn subject_details(summary: &SubjectSummary) -> String {
    format!(
        "{}: running economy {:.1} mL·kg⁻¹·min⁻¹, net metabolic power {:.2} W/kg, speed {:.2} m/s",
        summary.subject_id,
        summary.running_economy_ml_kg_min,
        summary.net_metabolic_power_wkg,
        summary.speed_m_per_s
    )
}

#[derive(Tabled)]
struct KeyMetricsRow {
    #[tabled(rename = "Subject")]
    subject_id: String,
    #[tabled(rename = "Running economy (mL/kg/min)")]
    running_economy: String,
    #[tabled(rename = "Net power (W/kg)")]
    power: String,
    #[tabled(rename = "Speed (m/s)")]
    speed: String,
}

/// Key metrics of the listed subjects, in subject id order.
///
/// `None` when none of `subject_ids` is among `summaries`.
pub fn key_metrics_table(summaries: &[SubjectSummary], subject_ids: &[String]) -> Option<String> {
    let mut selected: Vec<&SubjectSummary> = summaries
        .iter()
        .filter(|s| subject_ids.contains(&s.subject_id))
        .collect();
    if selected.is_empty() {
        return None;
    }
    selected.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));

    let rows: Vec<KeyMetricsRow> = selected
        .into_iter()
        .map(|s| KeyMetricsRow {
            subject_id: s.subject_id.clone(),
            running_economy: format!("{:.1}", s.running_economy_ml_kg_min),
            power: format!("{:.2}", s.net_metabolic_power_wkg),
            speed: format!("{:.2}", s.speed_m_per_s),
        })
        .collect();
    Some(Table::new(rows).with(Style::rounded()).to_string())
}
