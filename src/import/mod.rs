use std::path::Path;
use tracing::{info, warn};

use crate::config::AnalysisSettings;
use crate::error::IngestError;
use crate::models::{Dataset, SubjectMetadata};

pub mod csv;
pub mod validation;

use self::csv::CsvImporter;

/// Load a recording and, optionally, a separate metadata file.
///
/// Values from the metadata file win over body mass / speed columns found in
/// the recording itself. Row speeds are averaged later, over the run window.
pub fn load_dataset(
    data_path: &Path,
    metadata_path: Option<&Path>,
    analysis: &AnalysisSettings,
) -> Result<Dataset, IngestError> {
    let importer = CsvImporter::new(&analysis.rest_phase, &analysis.run_phase);
    let series = importer.import_series(data_path)?;

    let mut metadata = series.row_metadata;
    if let Some(metadata_path) = metadata_path {
        let external = importer.import_metadata(metadata_path)?;
        for (subject_id, entry) in external {
            if !series.observations.contains_key(&subject_id) {
                warn!(subject_id = %subject_id, "Metadata row has no matching observations");
                continue;
            }
            let merged = metadata
                .entry(subject_id.clone())
                .or_insert_with(|| SubjectMetadata {
                    subject_id: subject_id.clone(),
                    body_mass_kg: None,
                    speed_m_per_s: None,
                });
            merged.body_mass_kg = entry.body_mass_kg.or(merged.body_mass_kg);
            merged.speed_m_per_s = entry.speed_m_per_s.or(merged.speed_m_per_s);
        }
    }

    let dataset = Dataset {
        observations: series.observations,
        metadata,
        skipped_rows: series.skipped_rows,
    };

    info!(
        path = %data_path.display(),
        subjects = dataset.subject_count(),
        observations = dataset.observation_count(),
        skipped = dataset.skipped_rows,
        "Dataset loaded"
    );

    Ok(dataset)
}
