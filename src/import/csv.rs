use chrono::{DateTime, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::import::validation::RowValidator;
use crate::models::{Observation, Phase, SubjectMetadata};
use crate::window::mean;

/// Columns every time-series file must provide
const REQUIRED_SERIES_COLUMNS: [&str; 5] = ["subject_id", "time_s", "phase", "vo2", "vco2"];

/// Columns a standalone metadata file must provide
const REQUIRED_METADATA_COLUMNS: [&str; 1] = ["subject_id"];

/// A row's time value before it is resolved to elapsed seconds
#[derive(Debug, Clone, Copy, PartialEq)]
enum TimeValue {
    Seconds(f64),
    DateTime(NaiveDateTime),
}

/// Parsed row kept until per-subject timing and metadata are resolved
#[derive(Debug, Clone)]
struct SeriesRow {
    subject_id: String,
    time: TimeValue,
    phase: Phase,
    vo2_ml_min: f64,
    vco2_ml_min: f64,
    body_mass_kg: Option<f64>,
    speed_m_per_s: Option<f64>,
}

/// Result of reading a merged time-series file
#[derive(Debug, Clone, Default)]
pub struct SeriesImport {
    pub observations: BTreeMap<String, Vec<Observation>>,
    /// Body mass gathered from the series rows themselves. Speed stays on the
    /// observations so it can be averaged over the run window.
    pub row_metadata: BTreeMap<String, SubjectMetadata>,
    pub skipped_rows: usize,
}

/// CSV importer with flexible column mapping
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
    rest_label: String,
    run_label: String,
}

impl CsvImporter {
    pub fn new(rest_label: &str, run_label: &str) -> Self {
        let mut column_mapping = HashMap::new();

        // Common column name variations
        Self::add_mapping(
            &mut column_mapping,
            "subject_id",
            &["subject_id", "subject", "subjectid", "participant", "id"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "time_s",
            &["time_s", "time", "timestamp", "elapsed_s", "elapsed", "t"],
        );
        Self::add_mapping(&mut column_mapping, "phase", &["phase", "stage", "condition"]);
        Self::add_mapping(
            &mut column_mapping,
            "vo2",
            &["vo2_ml_min", "vo2", "vo2_mlmin", "vo2_ml"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "vco2",
            &["vco2_ml_min", "vco2", "vco2_mlmin", "vco2_ml"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "body_mass_kg",
            &["body_mass_kg", "body_mass", "mass_kg", "mass", "weight_kg", "weight"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "speed_m_per_s",
            &["speed_m_per_s", "speed_ms", "speed", "velocity"],
        );

        Self {
            column_mapping,
            rest_label: rest_label.to_string(),
            run_label: run_label.to_string(),
        }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name
            .trim()
            .trim_start_matches('\u{feff}')
            .to_lowercase()
            .replace([' ', '-'], "_")
            .replace(['₂'], "2");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    /// Map standard column names to their index in the header
    fn column_indices(&self, headers: &StringRecord) -> HashMap<String, usize> {
        let mut indices = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            // First occurrence wins when aliases collide
            indices.entry(self.normalize_column_name(header)).or_insert(i);
        }
        indices
    }

    fn check_required(
        path: &Path,
        indices: &HashMap<String, usize>,
        required: &[&str],
    ) -> Result<(), IngestError> {
        let missing: Vec<&str> = required
            .iter()
            .filter(|column| !indices.contains_key(**column))
            .copied()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::MissingColumns {
                path: path.to_path_buf(),
                columns: missing.join(", "),
            })
        }
    }

    fn open(path: &Path) -> Result<csv::Reader<std::fs::File>, IngestError> {
        if !path.exists() {
            return Err(IngestError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| IngestError::Unparsable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn read_headers(
        reader: &mut csv::Reader<std::fs::File>,
        path: &Path,
    ) -> Result<StringRecord, IngestError> {
        let headers = reader
            .headers()
            .map_err(|e| IngestError::Unparsable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .clone();

        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(IngestError::Unparsable {
                path: path.to_path_buf(),
                reason: "file has no header row".to_string(),
            });
        }

        Ok(headers)
    }

    fn parse_datetime(date_str: &str) -> Option<NaiveDateTime> {
        let formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%SZ",
            "%Y-%m-%dT%H:%M:%S%.fZ",
            "%d/%m/%Y %H:%M:%S",
            "%m/%d/%Y %H:%M:%S",
        ];

        for format in &formats {
            if let Ok(naive_dt) = NaiveDateTime::parse_from_str(date_str, format) {
                return Some(naive_dt);
            }
        }

        DateTime::parse_from_rfc3339(date_str)
            .ok()
            .map(|dt| dt.naive_utc())
    }

    fn parse_time(value: &str) -> Result<TimeValue, String> {
        if let Ok(seconds) = value.parse::<f64>() {
            return RowValidator::validate_time(seconds).map(TimeValue::Seconds);
        }
        Self::parse_datetime(value)
            .map(TimeValue::DateTime)
            .ok_or_else(|| format!("unparsable time '{}'", value))
    }

    fn field<'r>(
        record: &'r StringRecord,
        indices: &HashMap<String, usize>,
        column: &str,
    ) -> Option<&'r str> {
        indices
            .get(column)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn required_field<'r>(
        record: &'r StringRecord,
        indices: &HashMap<String, usize>,
        column: &str,
    ) -> Result<&'r str, String> {
        Self::field(record, indices, column).ok_or_else(|| format!("missing value for {}", column))
    }

    fn parse_number(value: &str, column: &str) -> Result<f64, String> {
        value
            .parse::<f64>()
            .map_err(|_| format!("non-numeric {} '{}'", column, value))
    }

    fn optional_number(
        record: &StringRecord,
        indices: &HashMap<String, usize>,
        column: &str,
    ) -> Result<Option<f64>, String> {
        Self::field(record, indices, column)
            .map(|value| Self::parse_number(value, column))
            .transpose()
    }

    fn parse_series_row(
        &self,
        record: &StringRecord,
        indices: &HashMap<String, usize>,
    ) -> Result<SeriesRow, String> {
        let subject_id = Self::required_field(record, indices, "subject_id")?.to_string();
        let time = Self::parse_time(Self::required_field(record, indices, "time_s")?)?;
        let phase = Phase::from_label(
            Self::required_field(record, indices, "phase")?,
            &self.rest_label,
            &self.run_label,
        );

        let vo2 = Self::parse_number(Self::required_field(record, indices, "vo2")?, "VO2")?;
        let vco2 = Self::parse_number(Self::required_field(record, indices, "vco2")?, "VCO2")?;

        Ok(SeriesRow {
            subject_id,
            time,
            phase,
            vo2_ml_min: RowValidator::validate_gas("VO2", vo2)?,
            vco2_ml_min: RowValidator::validate_gas("VCO2", vco2)?,
            body_mass_kg: RowValidator::clean_body_mass(Self::optional_number(
                record,
                indices,
                "body_mass_kg",
            )?),
            speed_m_per_s: RowValidator::clean_speed(Self::optional_number(
                record,
                indices,
                "speed_m_per_s",
            )?),
        })
    }

    /// Read a merged time-series file.
    ///
    /// Bad rows are skipped with a warning; the call only fails when the file
    /// itself is unusable or no row survives.
    pub fn import_series(&self, path: &Path) -> Result<SeriesImport, IngestError> {
        let mut reader = Self::open(path)?;
        let headers = Self::read_headers(&mut reader, path)?;
        let indices = self.column_indices(&headers);
        Self::check_required(path, &indices, &REQUIRED_SERIES_COLUMNS)?;

        let mut rows = Vec::new();
        let mut skipped_rows = 0usize;

        for (row_index, result) in reader.records().enumerate() {
            // Header is line 1
            let fallback_line = row_index as u64 + 2;
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    skipped_rows += 1;
                    warn!(line = fallback_line, reason = %e, "Skipping unreadable row");
                    continue;
                }
            };
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(fallback_line);

            if record.iter().all(|field| field.is_empty()) {
                continue;
            }

            match self.parse_series_row(&record, &indices) {
                Ok(row) => rows.push(row),
                Err(reason) => {
                    skipped_rows += 1;
                    warn!(line, reason = %reason, "Skipping malformed row");
                }
            }
        }

        let (observations, timing_skips) = Self::resolve_timing(rows);
        skipped_rows += timing_skips;

        if observations.is_empty() {
            return Err(IngestError::NoValidRows {
                path: path.to_path_buf(),
                skipped: skipped_rows,
            });
        }

        let row_metadata = Self::collect_row_metadata(&observations);
        let observations = observations
            .into_iter()
            .map(|(subject_id, rows)| {
                let series = rows
                    .into_iter()
                    .map(|(observation, _)| observation)
                    .collect::<Vec<_>>();
                (subject_id, series)
            })
            .collect();

        debug!(
            path = %path.display(),
            skipped = skipped_rows,
            "Time series imported"
        );

        Ok(SeriesImport {
            observations,
            row_metadata,
            skipped_rows,
        })
    }

    /// Convert each subject's time column to elapsed seconds and sort by time.
    ///
    /// Datetime stamps are made relative to the subject's earliest stamp. A
    /// subject keeps whichever time kind its first row uses; rows of the other
    /// kind are dropped.
    #[allow(clippy::type_complexity)]
    fn resolve_timing(
        rows: Vec<SeriesRow>,
    ) -> (
        BTreeMap<String, Vec<(Observation, Option<f64>)>>,
        usize,
    ) {
        let mut by_subject: BTreeMap<String, Vec<SeriesRow>> = BTreeMap::new();
        for row in rows {
            by_subject.entry(row.subject_id.clone()).or_default().push(row);
        }

        let mut skipped = 0usize;
        let mut resolved = BTreeMap::new();

        for (subject_id, rows) in by_subject {
            let uses_datetime = matches!(rows[0].time, TimeValue::DateTime(_));
            let origin = rows
                .iter()
                .filter_map(|row| match row.time {
                    TimeValue::DateTime(dt) => Some(dt),
                    TimeValue::Seconds(_) => None,
                })
                .min();

            let mut series = Vec::with_capacity(rows.len());
            for row in rows {
                let time_s = match (row.time, uses_datetime, origin) {
                    (TimeValue::Seconds(seconds), false, _) => seconds,
                    (TimeValue::DateTime(dt), true, Some(origin)) => {
                        (dt - origin).num_milliseconds() as f64 / 1000.0
                    }
                    _ => {
                        skipped += 1;
                        warn!(
                            subject_id = %subject_id,
                            reason = "mixed numeric and datetime timestamps",
                            "Skipping malformed row"
                        );
                        continue;
                    }
                };

                series.push((
                    Observation {
                        subject_id: subject_id.clone(),
                        time_s,
                        phase: row.phase,
                        vo2_ml_min: row.vo2_ml_min,
                        vco2_ml_min: row.vco2_ml_min,
                        speed_m_per_s: row.speed_m_per_s,
                    },
                    row.body_mass_kg,
                ));
            }

            series.sort_by(|a, b| a.0.time_s.total_cmp(&b.0.time_s));
            if !series.is_empty() {
                resolved.insert(subject_id, series);
            }
        }

        (resolved, skipped)
    }

    /// Body mass is averaged over all of a subject's rows.
    fn collect_row_metadata(
        observations: &BTreeMap<String, Vec<(Observation, Option<f64>)>>,
    ) -> BTreeMap<String, SubjectMetadata> {
        observations
            .iter()
            .map(|(subject_id, rows)| {
                let body_mass_kg = mean(rows.iter().filter_map(|(_, mass)| *mass));

                (
                    subject_id.clone(),
                    SubjectMetadata {
                        subject_id: subject_id.clone(),
                        body_mass_kg,
                        speed_m_per_s: None,
                    },
                )
            })
            .collect()
    }

    /// Read a standalone `subject_id, body_mass_kg, speed_m_per_s` file
    pub fn import_metadata(
        &self,
        path: &Path,
    ) -> Result<BTreeMap<String, SubjectMetadata>, IngestError> {
        let mut reader = Self::open(path)?;
        let headers = Self::read_headers(&mut reader, path)?;
        let indices = self.column_indices(&headers);
        Self::check_required(path, &indices, &REQUIRED_METADATA_COLUMNS)?;

        let mut metadata = BTreeMap::new();
        let mut skipped = 0usize;

        for (row_index, result) in reader.records().enumerate() {
            let line = row_index as u64 + 2;
            let parsed = result.map_err(|e| e.to_string()).and_then(|record| {
                let subject_id = Self::required_field(&record, &indices, "subject_id")?;
                let body_mass_kg = Self::optional_number(&record, &indices, "body_mass_kg")?;
                let speed_m_per_s = Self::optional_number(&record, &indices, "speed_m_per_s")?;
                Ok(SubjectMetadata {
                    subject_id: subject_id.to_string(),
                    body_mass_kg: RowValidator::clean_body_mass(body_mass_kg),
                    speed_m_per_s: RowValidator::clean_speed(speed_m_per_s),
                })
            });

            match parsed {
                Ok(entry) => {
                    if metadata.contains_key(&entry.subject_id) {
                        warn!(
                            line,
                            subject_id = %entry.subject_id,
                            "Duplicate metadata row, keeping the first"
                        );
                        continue;
                    }
                    metadata.insert(entry.subject_id.clone(), entry);
                }
                Err(reason) => {
                    skipped += 1;
                    warn!(line, reason = %reason, "Skipping malformed metadata row");
                }
            }
        }

        if metadata.is_empty() {
            return Err(IngestError::NoValidRows {
                path: path.to_path_buf(),
                skipped,
            });
        }

        Ok(metadata)
    }
}
