use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;

use runecon::config::AppConfig;
use runecon::export::{self, RegressionReport};
use runecon::logging::{init_logging, LogLevel};
use runecon::pipeline;
use runecon::regression::{Coefficient, RegressionModel};
use runecon::report::{
    filter_by_power, key_metrics_table, subject_details, summary_table, GroupSummary, PowerRange,
};
use runecon::RunEconError;

/// Speed vs power chart for the filtered group, kept apart from the full-run chart
#[cfg(feature = "charts")]
const REPORT_SPEED_VS_POWER_CHART: &str = "speed_vs_power_filtered.svg";

/// runecon - Running economy and net metabolic power from metabolic cart data
///
/// Reads rest/run VO2 and VCO2 recordings, averages the trailing steady-state
/// window of each phase, and reports net VO2, running economy and net
/// metabolic power per subject together with a speed vs power regression.
#[derive(Parser)]
#[command(name = "runecon")]
#[command(version)]
#[command(about = "Running economy and net metabolic power analysis", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Metabolic data CSV (overrides config)
    #[arg(short, long, value_name = "FILE", global = true)]
    input: Option<PathBuf>,

    /// Per-subject body mass / speed CSV (overrides config)
    #[arg(short, long, value_name = "FILE", global = true)]
    metadata: Option<PathBuf>,

    /// Output directory (overrides config)
    #[arg(short, long, value_name = "DIR", global = true)]
    output_dir: Option<PathBuf>,

    /// Skip chart rendering
    #[arg(long, global = true)]
    no_plots: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline (the default when no command is given)
    Run,

    /// Filter subjects by net metabolic power and summarise the group
    Report {
        /// Lower net metabolic power bound in W/kg (default: data minimum)
        #[arg(long)]
        min_power: Option<f64>,

        /// Upper net metabolic power bound in W/kg (default: data maximum)
        #[arg(long)]
        max_power: Option<f64>,

        /// Write the filtered summary CSV to this path
        #[arg(short, long, value_name = "FILE")]
        export: Option<PathBuf>,

        /// Print this subject's metrics and render its VO2 trace
        #[arg(short, long)]
        subject: Option<String>,

        /// Compare these subjects (comma separated): metrics table and run-phase chart
        #[arg(long, value_delimiter = ',')]
        compare: Vec<String>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Also write it to the user config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = err
                .downcast_ref::<RunEconError>()
                .map(RunEconError::user_message)
                .unwrap_or_else(|| format!("{:#}", err));
            eprintln!("{} {}", "✗".red().bold(), message.red());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(input) = cli.input {
        config.input.data_path = input;
    }
    if let Some(metadata) = cli.metadata {
        config.input.metadata_path = Some(metadata);
    }
    if let Some(output_dir) = cli.output_dir {
        config.output.output_dir = output_dir;
    }
    if cli.no_plots {
        config.output.plots = false;
    }
    config.logging.level = LogLevel::from_verbosity(config.logging.level, cli.verbose);
    init_logging(&config.logging)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_pipeline(&config),
        Commands::Report {
            min_power,
            max_power,
            export,
            subject,
            compare,
        } => run_report(&config, min_power, max_power, export, subject, compare),
        Commands::Config { save } => {
            print!("{}", config.to_toml()?);
            if save {
                let path = AppConfig::default_config_path();
                config.save(&path)?;
                println!("{} {}", "✓ Saved to".green(), path.display());
            }
            Ok(())
        }
    }
}

fn run_pipeline(config: &AppConfig) -> Result<()> {
    println!("{}", "Computing metabolic summaries...".green().bold());
    println!("  Input: {}", config.input.data_path.display());

    let output = pipeline::run(config)?;

    if output.dataset.skipped_rows > 0 {
        println!(
            "  {} {} malformed row(s) skipped",
            "!".yellow().bold(),
            output.dataset.skipped_rows
        );
    }
    for (subject_id, reason) in &output.outcome.excluded {
        println!("  {} {} excluded: {}", "!".yellow().bold(), subject_id, reason);
    }

    if output.outcome.summaries.is_empty() {
        println!("{}", "No subject had complete rest and run data.".yellow());
    } else {
        println!("\n{}", summary_table(&output.outcome.summaries));
    }

    println!();
    print_regression(&output.regression);

    println!();
    println!("{} {}", "✓ Summary:".green(), output.summary_path.display());
    println!("{} {}", "✓ Regression:".green(), output.regression_path.display());
    if !output.charts.is_empty() {
        println!(
            "{} {} chart(s) in {}",
            "✓ Charts:".green(),
            output.charts.len(),
            config.output.plot_path().display()
        );
    }

    Ok(())
}

fn run_report(
    config: &AppConfig,
    min_power: Option<f64>,
    max_power: Option<f64>,
    export_path: Option<PathBuf>,
    subject: Option<String>,
    compare: Vec<String>,
) -> Result<()> {
    let (dataset, outcome) = pipeline::analyze(config)?;

    if outcome.summaries.is_empty() {
        println!("{}", "No subjects found in the uploaded data.".yellow());
        return Ok(());
    }

    let Some(range) = PowerRange::resolve(min_power, max_power, &outcome.summaries) else {
        return Ok(());
    };
    if range.is_inverted() {
        println!(
            "{}",
            format!(
                "Minimum power {:.1} W/kg is above the maximum {:.1} W/kg.",
                range.min, range.max
            )
            .yellow()
        );
    }
    let filtered = filter_by_power(&outcome.summaries, range);

    println!(
        "{}",
        format!(
            "Subject-level summary, net metabolic power {:.1}–{:.1} W/kg",
            range.min, range.max
        )
        .cyan()
        .bold()
    );

    if filtered.is_empty() {
        println!(
            "{}",
            "No subjects in range: none fall within the selected power range. Try widening it."
                .yellow()
        );
        return Ok(());
    }

    println!("{}", summary_table(&filtered));

    let regression = RegressionReport::from_fit(RegressionModel::fit_speed_vs_power(&filtered));
    println!();
    print_regression(&regression);

    if let Some(subject_id) = &subject {
        match filtered.iter().find(|s| &s.subject_id == subject_id) {
            Some(summary) => println!("\n{}", subject_details(summary)),
            None => println!(
                "\n{}",
                format!("Subject {} is not in the filtered group.", subject_id).yellow()
            ),
        }
    }

    if !compare.is_empty() {
        println!("\n{}", "Compared subjects - key metrics".cyan().bold());
        match key_metrics_table(&filtered, &compare) {
            Some(table) => println!("{}", table),
            None => println!(
                "{}",
                "None of the compared subjects is in the filtered group.".yellow()
            ),
        }
    }

    if let Some(group) = GroupSummary::from_summaries(&filtered) {
        println!("\n{}", "Group summary".cyan().bold());
        print!("{}", group.narrative());
    }

    if let Some(path) = export_path {
        export::csv::export_summaries(&filtered, &path)
            .with_context(|| format!("Failed to export filtered summary to {}", path.display()))?;
        println!("{} {}", "✓ Filtered summary:".green(), path.display());
    }

    if !config.output.plots {
        return Ok(());
    }
    render_report_charts(config, &dataset, &filtered, &regression, subject, compare)
}

#[cfg(feature = "charts")]
fn render_report_charts(
    config: &AppConfig,
    dataset: &runecon::Dataset,
    filtered: &[runecon::SubjectSummary],
    regression: &RegressionReport,
    subject: Option<String>,
    compare: Vec<String>,
) -> Result<()> {
    use runecon::charts;

    let plot_dir = config.output.plot_path();
    let window_s = config.analysis.window_s;

    if let Some(model) = regression.model() {
        let path = plot_dir.join(REPORT_SPEED_VS_POWER_CHART);
        charts::render_speed_vs_power(filtered, model, &path)?;
        println!("{} {}", "✓ Speed vs power chart:".green(), path.display());
    }

    if let Some(subject_id) = subject {
        if filtered.iter().any(|s| s.subject_id == subject_id) {
            let path = plot_dir.join(charts::vo2_chart_file_name(&subject_id));
            let observations = dataset.observations_for(&subject_id);
            charts::render_vo2_time(observations, &subject_id, window_s, &path)?;
            println!("{} {}", "✓ VO₂ chart:".green(), path.display());
        }
    }

    if !compare.is_empty() {
        let path = plot_dir.join("vo2_compare.svg");
        charts::render_vo2_compare(dataset, &compare, window_s, &path)?;
        println!("{} {}", "✓ Comparison chart:".green(), path.display());
    }

    Ok(())
}

#[cfg(not(feature = "charts"))]
fn render_report_charts(
    _config: &AppConfig,
    _dataset: &runecon::Dataset,
    _filtered: &[runecon::SubjectSummary],
    _regression: &RegressionReport,
    subject: Option<String>,
    compare: Vec<String>,
) -> Result<()> {
    if subject.is_some() || !compare.is_empty() {
        println!("{}", "Charts are unavailable: built without the `charts` feature.".yellow());
    }
    Ok(())
}

fn format_coefficient(name: &str, coef: &Coefficient) -> String {
    match (coef.ci_lower, coef.ci_upper, coef.p_value) {
        (Some(lo), Some(hi), Some(p)) => format!(
            "  {:<10} {:>9.4}  95% CI [{:.4}, {:.4}]  p = {:.3e}",
            name, coef.estimate, lo, hi, p
        ),
        _ => format!("  {:<10} {:>9.4}  (no residual degrees of freedom)", name, coef.estimate),
    }
}

fn print_regression(report: &RegressionReport) {
    println!("{}", "Speed vs net metabolic power (OLS)".blue().bold());
    match report {
        RegressionReport::Fitted { model } => {
            println!("{}", format_coefficient("intercept", &model.intercept));
            println!("{}", format_coefficient("slope", &model.slope));
            println!("  n = {}, R² = {:.3}", model.n, model.r_squared);
        }
        RegressionReport::Undefined { reason } => {
            println!("  {} {}", "model undefined:".yellow(), reason);
        }
    }
}
