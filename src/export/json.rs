use std::io::Write;
use std::path::Path;

use super::RegressionReport;
use crate::error::ExportError;

/// Export the regression report to pretty JSON
pub fn export_regression_report<P: AsRef<Path>>(
    report: &RegressionReport,
    output_path: P,
) -> Result<(), ExportError> {
    export_json(report, output_path)
}

/// Export any serializable data structure to JSON
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<(), ExportError>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let json_data = serde_json::to_string_pretty(data)
        .map_err(|e| ExportError::Serialization(e.to_string()))?;

    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json_data.as_bytes())?;
    file.write_all(b"\n")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::RegressionModel;
    use tempfile::TempDir;

    #[test]
    fn test_export_fitted_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("regression.json");
        let model = RegressionModel::fit(&[1.0, 2.0, 3.0], &[1.0, 2.1, 2.9]).unwrap();

        export_regression_report(&RegressionReport::from_fit(Ok(model)), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "fitted");
        assert_eq!(value["model"]["n"], 3);
        assert!(value["model"]["slope"]["p_value"].is_number());
    }

    #[test]
    fn test_export_undefined_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("regression.json");
        let fit = RegressionModel::fit(&[1.0], &[1.0]);

        export_regression_report(&RegressionReport::from_fit(fit), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "undefined");
        assert!(value["reason"].as_str().unwrap().contains("Insufficient"));
    }
}
