#![deny(missing_docs)]
//! CodeGauge command-line interface.
//!
//! Runs code-quality analyses, re-renders stored snapshots, generates
//! weekly narrative reports, and starts the HTTP service.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use codegauge_core::{
    AnalysisService, OutputStore, Settings, WeeklyReportGenerator, render_html_report,
    render_text_report,
};

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "codegauge", version, about = "CodeGauge CLI")]
struct Cli {
    /// Path to a JSON config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum AnalysisKind {
    All,
    Uncommented,
    Duplicate,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service and the daily scheduler.
    Serve {
        /// Bind address override.
        #[arg(long)]
        host: Option<String>,
        /// Bind port override.
        #[arg(short, long)]
        port: Option<u16>,
        /// Enable debug mode.
        #[arg(short, long)]
        debug: bool,
    },
    /// Run a code-quality analysis.
    Analyze {
        /// Which analysis to run.
        #[arg(short = 't', long = "type", value_enum, default_value_t = AnalysisKind::All)]
        kind: AnalysisKind,
    },
    /// Re-render a stored classified snapshot.
    DataAnalyze {
        /// Snapshot file; defaults to the newest in the output directory.
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Also export the records as CSV.
        #[arg(long)]
        export_csv: bool,
        /// Also render the HTML report.
        #[arg(long)]
        export_html: bool,
    },
    /// Generate a weekly narrative report from commit history.
    Weekly {
        /// Entity (task/ticket) identifier.
        #[arg(short, long)]
        entity_id: String,
        /// Workspace identifier.
        #[arg(short, long)]
        workspace_id: String,
        /// Custom prompt override.
        #[arg(short = 'P', long)]
        prompt: Option<String>,
        /// Skip saving the report to a file.
        #[arg(long)]
        no_save: bool,
        /// Print the generated report to stdout.
        #[arg(long)]
        print_report: bool,
    },
    /// Fetch and summarize duplicate-function data.
    FetchDuplicate,
}

fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port, debug } => run_serve(settings, host, port, debug),
        Commands::Analyze { kind } => run_analyze(&settings, kind),
        Commands::DataAnalyze {
            file,
            export_csv,
            export_html,
        } => run_data_analyze(&settings, file, export_csv, export_html),
        Commands::Weekly {
            entity_id,
            workspace_id,
            prompt,
            no_save,
            print_report,
        } => run_weekly(
            &settings,
            &entity_id,
            &workspace_id,
            prompt.as_deref(),
            no_save,
            print_report,
        ),
        Commands::FetchDuplicate => run_fetch_duplicate(&settings),
    }
}

fn run_serve(
    mut settings: Settings,
    host: Option<String>,
    port: Option<u16>,
    debug: bool,
) -> CliResult<()> {
    if let Some(host) = host {
        settings.server.host = host;
    }
    if let Some(port) = port {
        settings.server.port = port;
    }
    if debug {
        settings.server.debug = true;
    }
    println!(
        "Starting service on http://{}:{}",
        settings.server.host, settings.server.port
    );
    codegauge_server::run(settings)?;
    Ok(())
}

fn run_analyze(settings: &Settings, kind: AnalysisKind) -> CliResult<()> {
    let service = AnalysisService::new(settings.clone());
    match kind {
        AnalysisKind::All => {
            let outcome = service.run_all();
            println!("Combined analysis finished.");
            print_branch("uncommented", &outcome.uncommented);
            print_branch("duplicate", &outcome.duplicate);
        }
        AnalysisKind::Uncommented => {
            let outcome = service.run_uncommented()?;
            print!("{}", outcome.report_text);
            println!("Analysis finished.");
            println!(
                "- projects: {} ({} failed)",
                outcome.summary.total_projects, outcome.summary.failed_projects
            );
            println!("- flagged functions: {}", outcome.summary.total_function_count);
            print_artifact("HTML report", outcome.report_file.as_deref());
            print_artifact("CSV export", outcome.csv_file.as_deref());
        }
        AnalysisKind::Duplicate => {
            let outcome = service.run_duplicate()?;
            print!("{}", outcome.report_text);
            println!("Analysis finished.");
            println!(
                "- projects: {} ({} failed)",
                outcome.total, outcome.failed
            );
            print_artifact("HTML report", outcome.report_file.as_deref());
            print_artifact("CSV export", outcome.csv_file.as_deref());
        }
    }
    Ok(())
}

fn print_branch(name: &str, branch: &codegauge_core::BranchResult) {
    match &branch.error {
        Some(error) => println!("- {name}: {} ({error})", branch.status),
        None => println!("- {name}: {}", branch.status),
    }
}

fn print_artifact(label: &str, path: Option<&str>) {
    if let Some(path) = path {
        println!("- {label}: {path}");
    }
}

fn run_data_analyze(
    settings: &Settings,
    file: Option<PathBuf>,
    export_csv: bool,
    export_html: bool,
) -> CliResult<()> {
    let service = AnalysisService::new(settings.clone());
    let report = service.load_classified(file.as_deref())?;
    let options = service.render_options();

    print!("{}", render_text_report(&report, &options));

    let store = service.store();
    if export_csv || export_html {
        store.ensure()?;
    }
    let stamp = OutputStore::timestamp();
    if export_csv {
        let path = store.save_records_csv(
            &format!("uncommented_functions_export_{stamp}.csv"),
            &report.all_records,
        )?;
        println!("CSV export: {}", path.display());
    }
    if export_html {
        let path = store.save_text(
            &format!("uncommented_functions_report_{stamp}.html"),
            &render_html_report(&report, &options),
        )?;
        println!("HTML report: {}", path.display());
    }
    Ok(())
}

fn run_weekly(
    settings: &Settings,
    entity_id: &str,
    workspace_id: &str,
    prompt: Option<&str>,
    no_save: bool,
    print_report: bool,
) -> CliResult<()> {
    let generator = WeeklyReportGenerator::from_settings(settings)?;
    let report = generator.generate(entity_id, workspace_id, prompt)?;
    println!("Weekly report generated.");

    if !no_save {
        let store = OutputStore::from_settings(settings);
        store.ensure()?;
        let name = format!("weekly_report_{entity_id}_{}.md", OutputStore::timestamp());
        let path = store.save_weekly(&name, &report)?;
        println!("Saved to {}", path.display());
    }
    if print_report {
        println!("{}", "-".repeat(60));
        println!("{report}");
    }
    Ok(())
}

fn run_fetch_duplicate(settings: &Settings) -> CliResult<()> {
    let service = AnalysisService::new(settings.clone());
    let outcome = service.run_duplicate()?;
    print!("{}", outcome.report_text);
    println!(
        "Fetched duplicate data for {} projects ({} failed).",
        outcome.total, outcome.failed
    );
    print_artifact("HTML report", outcome.report_file.as_deref());
    print_artifact("CSV export", outcome.csv_file.as_deref());
    Ok(())
}
