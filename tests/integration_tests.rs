use runecon::config::AppConfig;
use runecon::models::SUMMARY_COLUMNS;
use runecon::{pipeline, IngestError, RegressionReport, RunEconError};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Integration tests that run the complete pipeline on CSV fixtures

/// Constant rest/run gas exchange for one subject, rest 0-180 s, run 190-480 s
fn write_subject(csv: &mut String, id: &str, rest_vo2: f64, run_vo2: f64, mass: f64, speed: f64) {
    for t in (0..=180).step_by(10) {
        writeln!(csv, "{id},rest,{t},{rest_vo2},{},{mass},{speed}", rest_vo2 * 0.8).unwrap();
    }
    for t in (190..=480).step_by(10) {
        writeln!(csv, "{id},run,{t},{run_vo2},{},{mass},{speed}", run_vo2 * 0.9).unwrap();
    }
}

fn fixture_config(dir: &Path, csv: &str) -> AppConfig {
    let data_path = dir.join("raw.csv");
    fs::write(&data_path, csv).unwrap();

    let mut config = AppConfig::default();
    config.input.data_path = data_path;
    config.output.output_dir = dir.join("outputs");
    config.output.plots = false;
    config
}

const HEADER: &str = "subject_id,phase,time_s,VO2_ml_min,VCO2_ml_min,body_mass_kg,speed_m_per_s\n";

fn two_subject_csv() -> String {
    let mut csv = HEADER.to_string();
    write_subject(&mut csv, "S01", 300.0, 2000.0, 70.0, 3.0);
    write_subject(&mut csv, "S02", 320.0, 2600.0, 65.0, 3.5);
    csv
}

#[test]
fn test_two_subject_summary_schema() {
    let temp_dir = TempDir::new().unwrap();
    let config = fixture_config(temp_dir.path(), &two_subject_csv());

    let output = pipeline::run(&config).unwrap();
    assert_eq!(output.summary_path, temp_dir.path().join("outputs/example_summary.csv"));

    let content = fs::read_to_string(&output.summary_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], SUMMARY_COLUMNS.join(","));
    assert_eq!(
        lines[0],
        "subject_id,rest_vo2_ml_min,run_vo2_ml_min,rest_vco2_ml_min,run_vco2_ml_min,net_vo2_ml_min,net_vco2_ml_min,running_economy_ml_kg_min,net_metabolic_power_Wkg,speed_m_per_s"
    );
    assert!(lines[1].starts_with("S01,300.0,2000.0,"));
    assert!(lines[2].starts_with("S02,320.0,2600.0,"));

    let s01 = &output.outcome.summaries[0];
    assert_eq!(s01.net_vo2_ml_min, 1700.0);
    assert!((s01.running_economy_ml_kg_min - 24.29).abs() < 0.005);
    assert_eq!(s01.speed_m_per_s, 3.0);
}

#[test]
fn test_rerun_is_bit_identical() {
    let temp_dir = TempDir::new().unwrap();
    let config = fixture_config(temp_dir.path(), &two_subject_csv());

    let first = pipeline::run(&config).unwrap();
    let first_bytes = fs::read(&first.summary_path).unwrap();

    let second = pipeline::run(&config).unwrap();
    let second_bytes = fs::read(&second.summary_path).unwrap();

    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn test_incomplete_subject_is_excluded() {
    let temp_dir = TempDir::new().unwrap();
    let mut csv = two_subject_csv();
    // S03 only runs for 60 s
    for t in (0..=180).step_by(10) {
        writeln!(csv, "S03,rest,{t},310,250,60,3.2").unwrap();
    }
    for t in (190..=250).step_by(10) {
        writeln!(csv, "S03,run,{t},2200,1900,60,3.2").unwrap();
    }
    let config = fixture_config(temp_dir.path(), &csv);

    let output = pipeline::run(&config).unwrap();
    assert_eq!(output.outcome.summaries.len(), 2);
    assert_eq!(output.outcome.excluded.len(), 1);
    assert_eq!(output.outcome.excluded[0].0, "S03");

    let content = fs::read_to_string(&output.summary_path).unwrap();
    assert!(!content.contains("S03"));
}

#[test]
fn test_malformed_rows_do_not_abort() {
    let temp_dir = TempDir::new().unwrap();
    let mut csv = two_subject_csv();
    csv.push_str("S01,run,500,lots,1800,70,3.0\n");
    csv.push_str("S02,run\n");
    let config = fixture_config(temp_dir.path(), &csv);

    let output = pipeline::run(&config).unwrap();
    assert_eq!(output.dataset.skipped_rows, 2);
    assert_eq!(output.outcome.summaries.len(), 2);
}

#[test]
fn test_speed_averaged_over_run_window() {
    let temp_dir = TempDir::new().unwrap();
    let mut csv = HEADER.to_string();
    for t in (0..=180).step_by(10) {
        writeln!(csv, "S01,rest,{t},300,240,70,0").unwrap();
    }
    // 2.0 m/s early in the run, 3.0 m/s across the final 120 s
    for t in (190..=480).step_by(10) {
        let speed = if t >= 360 { 3.0 } else { 2.0 };
        writeln!(csv, "S01,run,{t},2000,1800,70,{speed}").unwrap();
    }
    let config = fixture_config(temp_dir.path(), &csv);

    let (_, outcome) = pipeline::analyze(&config).unwrap();
    assert_eq!(outcome.summaries[0].speed_m_per_s, 3.0);
}

#[test]
fn test_regression_on_linear_subjects() {
    let temp_dir = TempDir::new().unwrap();
    let mut csv = HEADER.to_string();
    // Same mass and constant rest, so power is linear in run VO2. Speeds are
    // chosen afterwards from the computed powers.
    let run_vo2 = [1800.0, 2200.0, 2600.0, 3000.0];
    for (i, vo2) in run_vo2.iter().enumerate() {
        write_subject(&mut csv, &format!("S{i:02}"), 300.0, *vo2, 70.0, 3.0);
    }
    let config = fixture_config(temp_dir.path(), &csv);
    let output = pipeline::run(&config).unwrap();

    let mut summaries = output.outcome.summaries.clone();
    for summary in &mut summaries {
        summary.speed_m_per_s = 0.8 + 0.3 * summary.net_metabolic_power_wkg;
    }
    let model = runecon::RegressionModel::fit_speed_vs_power(&summaries).unwrap();
    assert!((model.slope.estimate - 0.3).abs() < 1e-9);
    assert!((model.intercept.estimate - 0.8).abs() < 1e-9);
    assert!(model.slope.p_value.unwrap() < 1e-6);
}

#[test]
fn test_single_subject_regression_undefined() {
    let temp_dir = TempDir::new().unwrap();
    let mut csv = HEADER.to_string();
    write_subject(&mut csv, "S01", 300.0, 2000.0, 70.0, 3.0);
    let config = fixture_config(temp_dir.path(), &csv);

    let output = pipeline::run(&config).unwrap();
    assert!(matches!(output.regression, RegressionReport::Undefined { .. }));

    let report = fs::read_to_string(&output.regression_path).unwrap();
    assert!(report.contains("\"status\": \"undefined\""));
}

#[test]
fn test_missing_columns_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let config = fixture_config(temp_dir.path(), "subject_id,time_s,VO2_ml_min\nS01,0,300\n");

    let err = pipeline::run(&config).unwrap_err();
    assert!(matches!(
        err,
        RunEconError::Ingest(IngestError::MissingColumns { .. })
    ));
    assert!(!config.output.summary_path().exists());
}

#[test]
fn test_missing_input_file_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.input.data_path = temp_dir.path().join("absent.csv");
    config.output.output_dir = temp_dir.path().join("outputs");

    let err = pipeline::run(&config).unwrap_err();
    assert!(err.user_message().contains("Could not find"));
}

#[test]
fn test_separate_metadata_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut csv = String::from("subject_id,phase,time_s,VO2_ml_min,VCO2_ml_min\n");
    for t in (0..=180).step_by(10) {
        writeln!(csv, "S01,rest,{t},300,240").unwrap();
    }
    for t in (190..=480).step_by(10) {
        writeln!(csv, "S01,run,{t},2000,1800").unwrap();
    }
    let mut config = fixture_config(temp_dir.path(), &csv);

    let metadata_path = temp_dir.path().join("subjects.csv");
    fs::write(&metadata_path, "subject_id,body_mass_kg,speed_m_per_s\nS01,85,3.4\n").unwrap();
    config.input.metadata_path = Some(metadata_path);

    let output = pipeline::run(&config).unwrap();
    let summary = &output.outcome.summaries[0];
    assert!((summary.running_economy_ml_kg_min - 20.0).abs() < 1e-12);
    assert_eq!(summary.speed_m_per_s, 3.4);
}

#[cfg(feature = "charts")]
#[test]
fn test_charts_written() {
    let temp_dir = TempDir::new().unwrap();
    let mut csv = two_subject_csv();
    write_subject(&mut csv, "S03", 310.0, 2300.0, 62.0, 3.2);
    let mut config = fixture_config(temp_dir.path(), &csv);
    config.output.plots = true;

    let output = pipeline::run(&config).unwrap();
    let plot_dir = config.output.plot_path();
    assert!(plot_dir.join("vo2_S01.svg").exists());
    assert!(plot_dir.join(pipeline::SPEED_VS_POWER_CHART).exists());
    assert_eq!(output.charts.len(), 4);
}
