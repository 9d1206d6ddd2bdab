//! SVG charts for subject traces and the cross-subject regression

use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ExportError;
use crate::metrics::mean_ci;
use crate::models::{Dataset, Observation, Phase, SubjectSummary};
use crate::regression::RegressionModel;
use crate::window::phase_span;

type DrawResult = Result<(), Box<dyn std::error::Error>>;

/// Colorblind-safe palette (Paul Tol "bright")
const REST_COLOR: RGBColor = RGBColor(0x44, 0x77, 0xAA);
const RUN_COLOR: RGBColor = RGBColor(0xEE, 0x66, 0x77);
const SERIES_COLORS: [RGBColor; 7] = [
    RGBColor(0x44, 0x77, 0xAA),
    RGBColor(0xEE, 0x66, 0x77),
    RGBColor(0x22, 0x88, 0x33),
    RGBColor(0xCC, 0xBB, 0x44),
    RGBColor(0x66, 0xCC, 0xEE),
    RGBColor(0xAA, 0x33, 0x77),
    RGBColor(0xBB, 0xBB, 0xBB),
];

const CHART_SIZE: (u32, u32) = (900, 560);
/// Points used to draw the regression line and its band
const GRID_POINTS: usize = 100;

fn prepare(path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn chart_error(path: &Path, err: Box<dyn std::error::Error>) -> ExportError {
    ExportError::Chart {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// File name used for a subject's VO2 chart
pub fn vo2_chart_file_name(subject_id: &str) -> String {
    let safe: String = subject_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("vo2_{}.svg", safe)
}

/// Value range padded by 5% on each side; never empty
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-6 * hi.abs().max(1.0));
    (lo - pad, hi + pad)
}

/// VO2 over time for one subject, rest and run phases with their
/// steady-state windows shaded and a 95% band around each phase mean.
pub fn render_vo2_time(
    observations: &[Observation],
    subject_id: &str,
    window_s: f64,
    path: &Path,
) -> Result<(), ExportError> {
    prepare(path)?;
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    draw_vo2_time(&root, observations, subject_id, window_s).map_err(|e| chart_error(path, e))
}

fn draw_vo2_time(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    observations: &[Observation],
    subject_id: &str,
    window_s: f64,
) -> DrawResult {
    root.fill(&WHITE)?;

    let shown: Vec<&Observation> = observations
        .iter()
        .filter(|o| matches!(o.phase, Phase::Rest | Phase::Run))
        .collect();
    let (x_min, x_max) = padded_range(shown.iter().map(|o| o.time_s));
    let (y_min, y_max) = padded_range(shown.iter().map(|o| o.vo2_ml_min));

    let mut chart = ChartBuilder::on(root)
        .caption(format!("VO₂ over time – {}", subject_id), ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(65)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("VO₂ (mL/min)")
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    for (phase, color, stroke) in [(Phase::Rest, REST_COLOR, 1), (Phase::Run, RUN_COLOR, 2)] {
        let points: Vec<(f64, f64)> = shown
            .iter()
            .filter(|o| o.phase == phase)
            .map(|o| (o.time_s, o.vo2_ml_min))
            .collect();
        let values: Vec<f64> = points.iter().map(|p| p.1).collect();
        let Some((mean, low, high)) = mean_ci(&values) else {
            continue;
        };
        let Some((first, last)) = phase_span(observations, &phase) else {
            continue;
        };

        // Steady-state window
        let window_start = (last - window_s).max(first);
        chart.draw_series(std::iter::once(Rectangle::new(
            [(window_start, y_min), (last, y_max)],
            color.mix(0.08).filled(),
        )))?;

        // 95% band around the phase mean
        chart.draw_series(std::iter::once(Rectangle::new(
            [(first, low), (last, high)],
            color.mix(0.15).filled(),
        )))?;

        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(stroke)))?
            .label(format!("{} (mean {:.0} mL/min)", phase, mean))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));

        chart.draw_series(points.iter().map(|&(x, y)| {
            if phase == Phase::Rest {
                Circle::new((x, y), 3, color.stroke_width(1))
            } else {
                Circle::new((x, y), 3, color.filled())
            }
        }))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.9))
        .border_style(BLACK.mix(0.3))
        .draw()?;

    root.present()?;
    Ok(())
}

/// Scatter of speed against net metabolic power with the OLS line and the
/// 95% confidence band of the mean prediction.
pub fn render_speed_vs_power(
    summaries: &[SubjectSummary],
    model: &RegressionModel,
    path: &Path,
) -> Result<(), ExportError> {
    prepare(path)?;
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    draw_speed_vs_power(&root, summaries, model).map_err(|e| chart_error(path, e))
}

fn draw_speed_vs_power(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    summaries: &[SubjectSummary],
    model: &RegressionModel,
) -> DrawResult {
    root.fill(&WHITE)?;

    let points: Vec<(f64, f64)> = summaries
        .iter()
        .map(|s| (s.net_metabolic_power_wkg, s.speed_m_per_s))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();

    let data_x_min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let data_x_max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let grid = if data_x_min.is_finite() && data_x_max.is_finite() {
        model.prediction_grid(data_x_min, data_x_max, GRID_POINTS)
    } else {
        Vec::new()
    };

    let (x_min, x_max) = padded_range(points.iter().map(|p| p.0));
    let (y_min, y_max) = padded_range(
        points
            .iter()
            .map(|p| p.1)
            .chain(grid.iter().flat_map(|p| {
                [
                    p.mean,
                    p.ci_lower.unwrap_or(p.mean),
                    p.ci_upper.unwrap_or(p.mean),
                ]
            })),
    );

    let mut chart = ChartBuilder::on(root)
        .caption(
            format!("Speed vs Net Metabolic Power (R² ≈ {:.2})", model.r_squared),
            ("sans-serif", 24),
        )
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Net metabolic power (W/kg)")
        .y_desc("Speed (m/s)")
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    let band: Vec<(f64, f64)> = grid
        .iter()
        .filter_map(|p| p.ci_upper.map(|upper| (p.x, upper)))
        .chain(
            grid.iter()
                .rev()
                .filter_map(|p| p.ci_lower.map(|lower| (p.x, lower))),
        )
        .collect();
    if !band.is_empty() {
        chart.draw_series(std::iter::once(Polygon::new(band, REST_COLOR.mix(0.25).filled())))?;
    }

    chart
        .draw_series(LineSeries::new(
            grid.iter().map(|p| (p.x, p.mean)),
            REST_COLOR.stroke_width(2),
        ))?
        .label(format!(
            "speed = {:.3} + {:.3} × power",
            model.intercept.estimate, model.slope.estimate
        ))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], REST_COLOR));

    chart
        .draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 5, RUN_COLOR.mix(0.9).filled())),
        )?
        .label("subjects")
        .legend(|(x, y)| Circle::new((x + 10, y), 5, RUN_COLOR.filled()));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.9))
        .border_style(BLACK.mix(0.3))
        .draw()?;

    root.present()?;
    Ok(())
}

/// Run-phase VO2 for several subjects, each aligned to its run start
pub fn render_vo2_compare(
    dataset: &Dataset,
    subject_ids: &[String],
    window_s: f64,
    path: &Path,
) -> Result<(), ExportError> {
    prepare(path)?;
    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    draw_vo2_compare(&root, dataset, subject_ids, window_s).map_err(|e| chart_error(path, e))
}

fn draw_vo2_compare(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    dataset: &Dataset,
    subject_ids: &[String],
    window_s: f64,
) -> DrawResult {
    root.fill(&WHITE)?;

    let traces: Vec<(&String, Vec<(f64, f64)>)> = subject_ids
        .iter()
        .filter_map(|id| {
            let run: Vec<&Observation> = dataset
                .observations_for(id)
                .iter()
                .filter(|o| o.phase == Phase::Run)
                .collect();
            let start = run.iter().map(|o| o.time_s).fold(f64::INFINITY, f64::min);
            if run.is_empty() {
                None
            } else {
                Some((id, run.iter().map(|o| (o.time_s - start, o.vo2_ml_min)).collect()))
            }
        })
        .collect();

    if traces.is_empty() {
        let (width, height) = root.dim_in_pixel();
        root.draw(&Text::new(
            "No run-phase data for selected subjects.".to_string(),
            (width as i32 / 2 - 180, height as i32 / 2),
            ("sans-serif", 22).into_font(),
        ))?;
        root.present()?;
        return Ok(());
    }

    let (x_min, x_max) = padded_range(traces.iter().flat_map(|(_, t)| t.iter().map(|p| p.0)));
    let (y_min, y_max) = padded_range(traces.iter().flat_map(|(_, t)| t.iter().map(|p| p.1)));

    let mut chart = ChartBuilder::on(root)
        .caption(
            "Run-phase VO₂ comparison (aligned to start of run)",
            ("sans-serif", 24),
        )
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(65)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Time since run start (s)")
        .y_desc("VO₂ (mL/min)")
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    for (idx, (subject_id, trace)) in traces.iter().enumerate() {
        let color = SERIES_COLORS[idx % SERIES_COLORS.len()];
        let end = trace.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let start = (end - window_s).max(0.0);

        chart.draw_series(std::iter::once(Rectangle::new(
            [(start, y_min), (end, y_max)],
            color.mix(0.08).filled(),
        )))?;

        chart
            .draw_series(LineSeries::new(trace.iter().copied(), color.stroke_width(2)))?
            .label(subject_id.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.9))
        .border_style(BLACK.mix(0.3))
        .draw()?;

    root.present()?;
    Ok(())
}

/// Render one VO2 chart per subject into `dir`, returning the written paths.
///
/// A failed chart is logged and skipped.
pub fn render_subject_charts(
    dataset: &Dataset,
    subject_ids: &[String],
    window_s: f64,
    dir: &Path,
) -> Vec<PathBuf> {
    let progress = indicatif::ProgressBar::new(subject_ids.len() as u64);
    let mut written = Vec::new();

    for subject_id in subject_ids {
        let path = dir.join(vo2_chart_file_name(subject_id));
        match render_vo2_time(dataset.observations_for(subject_id), subject_id, window_s, &path) {
            Ok(()) => written.push(path),
            Err(err) => tracing::warn!(subject_id = %subject_id, reason = %err, "Chart skipped"),
        }
        progress.inc(1);
    }

    progress.finish_and_clear();
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn subject_series(id: &str) -> Vec<Observation> {
        (0..=60)
            .map(|i| {
                let t = i as f64 * 5.0;
                let phase = if t < 150.0 { Phase::Rest } else { Phase::Run };
                let vo2 = if phase == Phase::Rest {
                    300.0 + (i % 3) as f64
                } else {
                    2000.0 + (i % 4) as f64 * 10.0
                };
                Observation {
                    subject_id: id.to_string(),
                    time_s: t,
                    phase,
                    vo2_ml_min: vo2,
                    vco2_ml_min: vo2 * 0.85,
                    speed_m_per_s: None,
                }
            })
            .collect()
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_chart_file_name_is_sanitised() {
        assert_eq!(vo2_chart_file_name("S01"), "vo2_S01.svg");
        assert_eq!(vo2_chart_file_name("a/b c"), "vo2_a_b_c.svg");
    }

    #[test]
    fn test_render_vo2_time() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plots").join("vo2_S01.svg");

        render_vo2_time(&subject_series("S01"), "S01", 120.0, &path).unwrap();

        let svg = read(&path);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("S01"));
        assert!(svg.contains("Time (s)"));
    }

    #[test]
    fn test_render_speed_vs_power() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("speed_vs_power.svg");
        let summaries: Vec<SubjectSummary> = [(7.0, 2.6), (8.0, 3.0), (9.5, 3.3), (11.0, 3.9)]
            .iter()
            .enumerate()
            .map(|(i, &(power, speed))| SubjectSummary {
                subject_id: format!("S{i}"),
                rest_vo2_ml_min: 300.0,
                run_vo2_ml_min: 2000.0,
                rest_vco2_ml_min: 250.0,
                run_vco2_ml_min: 1800.0,
                net_vo2_ml_min: 1700.0,
                net_vco2_ml_min: 1550.0,
                running_economy_ml_kg_min: 24.0,
                net_metabolic_power_wkg: power,
                speed_m_per_s: speed,
            })
            .collect();
        let model = RegressionModel::fit_speed_vs_power(&summaries).unwrap();

        render_speed_vs_power(&summaries, &model, &path).unwrap();

        let svg = read(&path);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Net metabolic power (W/kg)"));
    }

    #[test]
    fn test_render_compare_without_run_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("compare.svg");

        render_vo2_compare(&Dataset::default(), &["S01".to_string()], 120.0, &path).unwrap();
        assert!(read(&path).contains("No run-phase data"));
    }

    #[test]
    fn test_render_subject_charts() {
        let temp_dir = TempDir::new().unwrap();
        let mut dataset = Dataset::default();
        for id in ["S01", "S02"] {
            dataset.observations.insert(id.to_string(), subject_series(id));
        }
        let ids: Vec<String> = dataset.subject_ids().cloned().collect();

        let written = render_subject_charts(&dataset, &ids, 120.0, temp_dir.path());
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));

        let compare = temp_dir.path().join("compare.svg");
        render_vo2_compare(&dataset, &ids, 120.0, &compare).unwrap();
        assert!(read(&compare).contains("S02"));
    }
}
