// DataGuard CLI - outlier detection & preprocessing guidance for time series

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use comfy_table::{Table, presets::UTF8_FULL};
use dataguard_anomaly::advisor::{PreprocessingAdvisor, PreprocessingSuggestion};
use dataguard_anomaly::config::{DataGuardConfig, DetectionConfig, DetectionMethod, ScoringPreset, Sensitivity, load_config};
use dataguard_anomaly::detection::{DetectionResult, Severity, detect};
use dataguard_anomaly::error::GuidanceError;
use dataguard_anomaly::strategy::StrategyKind;
use dataguard_anomaly::validation::ValidationReport;
use dataguard_anomaly::workflow::{Workflow, WorkflowRun};
use dataguard_anomaly::should_activate;
use dataguard_core::DataPoint;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dataguard")]
#[command(version = "0.1.0")]
#[command(about = "Outlier detection and preprocessing guidance for time series", long_about = None)]
struct Cli {
    /// Guidance/detection policy file (TOML)
    #[arg(short, long, global = true, env = "DATAGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a request asks for a data quality analysis
    Check {
        /// The user's request
        utterance: String,
    },

    /// Detect outliers in a series
    Detect {
        /// JSON array of data points
        file: PathBuf,

        #[command(flatten)]
        detection: DetectionArgs,
    },

    /// Suggest preprocessing strategies for a series
    Suggest {
        file: PathBuf,

        #[command(flatten)]
        detection: DetectionArgs,

        /// Applicability scoring preset
        #[arg(short, long)]
        preset: Option<PresetArg>,
    },

    /// Detect, build a workflow, run it and validate the result
    Clean {
        file: PathBuf,

        #[command(flatten)]
        detection: DetectionArgs,

        /// Strategies to apply in order (default: all suggested)
        #[arg(short, long, value_delimiter = ',')]
        strategy: Vec<StrategyKind>,

        /// Write the processed series here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct DetectionArgs {
    /// Detection method
    #[arg(short, long)]
    method: Option<MethodArg>,

    /// Detection sensitivity
    #[arg(short = 'S', long)]
    sensitivity: Option<SensitivityArg>,

    /// Explicit threshold (IQR multiplier, |z| or isolation score)
    #[arg(short, long)]
    threshold: Option<f64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Iqr,
    Zscore,
    Isolation,
}

#[derive(Clone, Copy, ValueEnum)]
enum SensitivityArg {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Simple,
    Policy,
}

impl DetectionArgs {
    // command line wins over the config file
    fn resolve(&self, base: DetectionConfig) -> DetectionConfig {
        let mut config = base;
        if let Some(method) = self.method {
            config.method = match method {
                MethodArg::Iqr => DetectionMethod::Iqr,
                MethodArg::Zscore => DetectionMethod::ZScore,
                MethodArg::Isolation => DetectionMethod::IsolationHeuristic,
            };
        }
        if let Some(sensitivity) = self.sensitivity {
            config.sensitivity = match sensitivity {
                SensitivityArg::Low => Sensitivity::Low,
                SensitivityArg::Medium => Sensitivity::Medium,
                SensitivityArg::High => Sensitivity::High,
            };
        }
        if self.threshold.is_some() {
            config.threshold = self.threshold;
        }
        config
    }
}

#[derive(Serialize)]
struct CleanReport<'a> {
    workflow: &'a Workflow,
    processed: &'a [DataPoint],
    validation: &'a ValidationReport,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path).map_err(GuidanceError::from)?,
        None => DataGuardConfig::default(),
    };

    match cli.command {
        Commands::Check { utterance } => {
            check(&utterance, cli.json)?;
        }
        Commands::Detect { file, detection } => {
            let series = load_series(&file)?;
            let result = detect(&series, &detection.resolve(config.detection));
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_detection(&result);
            }
        }
        Commands::Suggest { file, detection, preset } => {
            let series = load_series(&file)?;
            let result = detect(&series, &detection.resolve(config.detection));

            let mut guidance = config.guidance;
            if let Some(preset) = preset {
                guidance.scoring = match preset {
                    PresetArg::Simple => ScoringPreset::Simple,
                    PresetArg::Policy => ScoringPreset::PolicyDriven,
                };
            }
            let suggestions = PreprocessingAdvisor::new(guidance).generate_suggestions(&result, &series);

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&suggestions)?);
            } else {
                print_detection(&result);
                print_suggestions(&suggestions);
            }
        }
        Commands::Clean {
            file,
            detection,
            strategy,
            output,
        } => {
            let series = load_series(&file)?;
            let result = detect(&series, &detection.resolve(config.detection));
            let advisor = PreprocessingAdvisor::new(config.guidance);

            let (suggestions, skipped) = select(advisor.generate_suggestions(&result, &series), &strategy);
            // stdout carries the report (JSON in --json mode); notices go to stderr
            for kind in &skipped {
                eprintln!("{} {} is not applicable to this series, skipping", "⚠".yellow(), kind);
            }
            if suggestions.is_empty() {
                eprintln!("{}", "No applicable preprocessing steps.".yellow());
                return Ok(());
            }

            let mut workflow = advisor.create_workflow(&suggestions, &series, &result);
            let run = workflow.run(advisor.executor(), &series);
            let report = advisor.validate_results(&series, &run.series);

            if let Some(path) = &output {
                fs::write(path, serde_json::to_string_pretty(&run.series)?)?;
            }

            if cli.json {
                let clean = CleanReport {
                    workflow: &workflow,
                    processed: &run.series,
                    validation: &report,
                };
                println!("{}", serde_json::to_string_pretty(&clean)?);
            } else {
                print_detection(&result);
                print_run(&workflow, &run);
                print_validation(&report);
                if let Some(path) = &output {
                    println!("\n{} {}", "Saved:".dimmed(), path.display().to_string().green());
                }
            }
        }
    }

    Ok(())
}

fn load_series(path: &Path) -> Result<Vec<DataPoint>, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let series = dataguard_core::parse_series(&content).map_err(GuidanceError::from)?;
    if series.is_empty() {
        return Err(GuidanceError::EmptySeries.into());
    }
    tracing::debug!(points = series.len(), path = %path.display(), "series loaded");
    Ok(series)
}

// keep the requested strategies, in the requested order; also returns the
// requested kinds that were not suggested
fn select(
    suggestions: Vec<PreprocessingSuggestion>,
    wanted: &[StrategyKind],
) -> (Vec<PreprocessingSuggestion>, Vec<StrategyKind>) {
    if wanted.is_empty() {
        return (suggestions, Vec::new());
    }

    let mut skipped = Vec::new();
    let selected = wanted
        .iter()
        .filter_map(|kind| {
            let found = suggestions.iter().find(|s| s.kind == *kind).cloned();
            if found.is_none() {
                skipped.push(*kind);
            }
            found
        })
        .collect();
    (selected, skipped)
}

fn check(utterance: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let active = should_activate(utterance);
    if json {
        println!("{}", serde_json::json!({ "activate": active }));
    } else if active {
        println!("{}", "✓ Data quality analysis requested".green());
    } else {
        println!("{}", "✗ Not a data quality request".dimmed());
    }
    Ok(())
}

fn severity_colored(severity: Severity) -> String {
    match severity {
        Severity::Critical => severity.as_str().red().bold().to_string(),
        Severity::High => severity.as_str().red().to_string(),
        Severity::Medium => severity.as_str().yellow().to_string(),
        Severity::Low => severity.as_str().normal().to_string(),
    }
}

fn print_detection(result: &DetectionResult) {
    println!("\n{}", "Outlier Detection".cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    println!(
        "{} {} | {} {:.2} | {} {}",
        "Method:".dimmed(),
        result.method.as_str().cyan(),
        "Threshold:".dimmed(),
        result.threshold,
        "Points:".dimmed(),
        result.statistics.total_points.to_string().yellow()
    );

    if !result.outliers.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Index", "Time", "Value", "Z", "Severity", "Reason"]);

        for o in &result.outliers {
            table.add_row(vec![
                o.index.to_string(),
                o.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                format!("{:.2}", o.value),
                format!("{:.2}", o.z_score),
                severity_colored(o.severity),
                o.reason.clone(),
            ]);
        }
        println!("{table}");
    }

    println!("{}", result.summary);
}

fn print_suggestions(suggestions: &[PreprocessingSuggestion]) {
    println!("\n{}", "Preprocessing Suggestions".cyan().bold());
    println!("{}", "─".repeat(60).dimmed());

    if suggestions.is_empty() {
        println!("{}", "Nothing to suggest.".yellow());
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Strategy", "Applicability", "Expected outcome"]);
    for (i, s) in suggestions.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            s.title.clone(),
            format!("{:.0}%", s.applicability * 100.0),
            s.implementation.expected_outcome.clone(),
        ]);
    }
    println!("{table}");

    for s in suggestions {
        println!("\n{}", s.title.bold());
        println!("  {}", s.description.dimmed());
        for pro in &s.pros {
            println!("  {} {}", "+".green(), pro);
        }
        for con in &s.cons {
            println!("  {} {}", "-".red(), con);
        }
    }
}

fn print_run(workflow: &Workflow, run: &WorkflowRun) {
    println!("\n{} {}", "Workflow".cyan().bold(), workflow.id.to_string().dimmed());
    println!("{}", "─".repeat(60).dimmed());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Step", "Strategy", "Status", "Removed", "Modified", "Quality +"]);

    for step in &workflow.steps {
        let (removed, modified, quality) = match &step.result {
            Some(r) => (
                r.records_removed.to_string(),
                r.records_modified.to_string(),
                format!("{:.1}", r.quality_improvement),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        table.add_row(vec![
            step.id.clone(),
            step.kind.to_string(),
            format!("{:?}", step.status),
            removed,
            modified,
            quality,
        ]);
    }
    println!("{table}");

    for result in run.results.iter().filter(|r| !r.success) {
        println!("{} {}", "✗".red(), result.message.red());
        for err in result.errors.iter().flatten() {
            println!("    {}", err.dimmed());
        }
    }

    let (done, total) = workflow.progress();
    println!(
        "{} {}/{} steps | {} {} points",
        "Progress:".dimmed(),
        done.to_string().green(),
        total,
        "Result:".dimmed(),
        run.series.len().to_string().yellow()
    );
}

fn print_validation(report: &ValidationReport) {
    println!("\n{}", "Validation".cyan().bold());
    println!("{}", "─".repeat(60).dimmed());

    let verdict = if report.is_valid {
        "✓ Valid".green().bold()
    } else {
        "✗ Needs attention".red().bold()
    };
    println!("{} {:.1}/100  {}", "Quality score:".dimmed(), report.improvements.data_quality_score, verdict);
    println!(
        "{} {:.1}% | {} {:.1}% | {} {:.1}",
        "Outlier reduction:".dimmed(),
        report.improvements.outlier_reduction,
        "Variance reduction:".dimmed(),
        report.improvements.variance_reduction,
        "Normality:".dimmed(),
        report.improvements.normality_improvement
    );

    for concern in &report.concerns {
        println!("  {} {}", "⚠".yellow(), concern);
    }
    for rec in &report.recommendations {
        println!("  {} {}", "→".cyan(), rec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spike() -> Vec<DataPoint> {
        let json = r#"[
            {"timestamp": "2024-01-01T00:00:00Z", "value": 100.0},
            {"timestamp": "2024-01-02T00:00:00Z", "value": 105.0},
            {"timestamp": "2024-01-03T00:00:00Z", "value": 500.0},
            {"timestamp": "2024-01-04T00:00:00Z", "value": 102.0},
            {"timestamp": "2024-01-05T00:00:00Z", "value": 98.0},
            {"timestamp": "2024-01-06T00:00:00Z", "value": 103.0},
            {"timestamp": "2024-01-07T00:00:00Z", "value": 101.0}
        ]"#;
        dataguard_core::parse_series(json).unwrap()
    }

    #[test]
    fn test_select_reports_unavailable_strategies() {
        let series = spike();
        let result = detect(&series, &DetectionConfig::default());
        let suggestions = PreprocessingAdvisor::default().generate_suggestions(&result, &series);

        // removal is not offered at 14.3% outliers
        let (selected, skipped) = select(
            suggestions,
            &[StrategyKind::Removal, StrategyKind::Imputation, StrategyKind::Capping],
        );

        let kinds: Vec<StrategyKind> = selected.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StrategyKind::Imputation, StrategyKind::Capping]);
        assert_eq!(skipped, vec![StrategyKind::Removal]);
    }

    #[test]
    fn test_select_without_request_keeps_everything() {
        let series = spike();
        let result = detect(&series, &DetectionConfig::default());
        let suggestions = PreprocessingAdvisor::default().generate_suggestions(&result, &series);
        let count = suggestions.len();

        let (selected, skipped) = select(suggestions, &[]);
        assert_eq!(selected.len(), count);
        assert!(skipped.is_empty());
    }
}
