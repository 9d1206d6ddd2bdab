use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use runecon::{metrics, models, regression, window};
use std::collections::BTreeMap;

/// Benchmarks for the windowing, summary and regression hot paths
/// across growing numbers of subjects and samples.

fn create_subject(id: &str, samples_per_phase: usize) -> Vec<models::Observation> {
    let mut observations = Vec::with_capacity(samples_per_phase * 2);
    for i in 0..samples_per_phase {
        observations.push(models::Observation {
            subject_id: id.to_string(),
            time_s: i as f64,
            phase: models::Phase::Rest,
            vo2_ml_min: 300.0 + (i % 7) as f64,
            vco2_ml_min: 250.0 + (i % 5) as f64,
            speed_m_per_s: None,
        });
    }
    for i in 0..samples_per_phase {
        observations.push(models::Observation {
            subject_id: id.to_string(),
            time_s: (samples_per_phase + i) as f64,
            phase: models::Phase::Run,
            vo2_ml_min: 2400.0 + (i % 11) as f64,
            vco2_ml_min: 2150.0 + (i % 13) as f64,
            speed_m_per_s: None,
        });
    }
    observations
}

fn create_dataset(subjects: usize) -> models::Dataset {
    let mut observations = BTreeMap::new();
    let mut metadata = BTreeMap::new();
    for s in 0..subjects {
        let id = format!("S{:04}", s);
        observations.insert(id.clone(), create_subject(&id, 600));
        metadata.insert(
            id.clone(),
            models::SubjectMetadata::new(id, 60.0 + (s % 25) as f64, 2.5 + (s % 10) as f64 * 0.15),
        );
    }
    models::Dataset {
        observations,
        metadata,
        skipped_rows: 0,
    }
}

fn bench_window_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("Window Extraction");

    for &samples in &[120, 600, 3600] {
        let observations = create_subject("S0001", samples);

        group.throughput(Throughput::Elements(observations.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("extract_window", samples),
            &observations,
            |b, observations| {
                b.iter(|| {
                    window::extract_window(black_box(observations), &models::Phase::Run, 120.0)
                });
            },
        );
    }

    group.finish();
}

fn bench_summarize_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("Subject Summaries");

    for &subjects in &[10, 100, 1000] {
        let dataset = create_dataset(subjects);

        group.throughput(Throughput::Elements(subjects as u64));
        group.bench_with_input(
            BenchmarkId::new("summarize_all", subjects),
            &dataset,
            |b, dataset| {
                b.iter(|| metrics::summarize_all(black_box(dataset), 120.0));
            },
        );
    }

    group.finish();
}

fn bench_regression(c: &mut Criterion) {
    let mut group = c.benchmark_group("Regression");

    for &subjects in &[10, 100, 1000] {
        let summaries = metrics::summarize_all(&create_dataset(subjects), 120.0).summaries;

        group.bench_with_input(
            BenchmarkId::new("fit_speed_vs_power", subjects),
            &summaries,
            |b, summaries| {
                b.iter(|| regression::RegressionModel::fit_speed_vs_power(black_box(summaries)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_window_extraction,
    bench_summarize_all,
    bench_regression
);
criterion_main!(benches);
