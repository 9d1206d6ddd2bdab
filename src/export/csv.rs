use csv::WriterBuilder;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::ExportError;
use crate::models::{SubjectSummary, SUMMARY_COLUMNS};

/// Write subject summaries as CSV to any writer.
///
/// The header is written even when there are no rows so the schema is stable.
pub fn write_summaries<W: Write>(
    summaries: &[SubjectSummary],
    writer: W,
) -> Result<(), ExportError> {
    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    csv_writer.write_record(SUMMARY_COLUMNS)?;
    for summary in summaries {
        csv_writer.serialize(summary)?;
    }
    csv_writer.flush()?;

    Ok(())
}

/// Export subject summaries to a CSV file, creating parent directories
pub fn export_summaries<P: AsRef<Path>>(
    summaries: &[SubjectSummary],
    output_path: P,
) -> Result<(), ExportError> {
    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = fs::File::create(output_path)?;
    write_summaries(summaries, file)
}

/// Read a previously exported summary file
pub fn read_summaries<P: AsRef<Path>>(input_path: P) -> Result<Vec<SubjectSummary>, ExportError> {
    let mut reader = csv::Reader::from_path(input_path)?;
    let mut summaries = Vec::new();
    for record in reader.deserialize() {
        summaries.push(record?);
    }
    Ok(summaries)
}
