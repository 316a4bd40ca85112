use crate::{commands::RunOptions, env::EnvManager, error::CliError};
use chrono::Local;
use clap::Parser;
use commands::Commands;
use engine_config::settings::Settings;
use engine_runtime::{factory, window::RunDates};
use model::core::window::FetchWindow;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;

#[derive(Parser)]
#[command(
    name = "seller-sync",
    version,
    about = "Pulls marketplace seller analytics into the warehouse"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let mut env = EnvManager::new();
    let env_file = cli.command.env_file();
    env.load_from_file(env_file, env_file.as_os_str() != ".env")?;

    init_tracing(env.get("LOG_LEVEL").unwrap_or("info"));

    let mut settings = Settings::from_vars(env.all())?;

    match cli.command {
        Commands::Run { date, options } => {
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            run(&mut settings, RunDates::Daily { today }, &options).await?;
        }
        Commands::Backfill { from, to, options } => {
            let window = FetchWindow::new(from, to)?;
            run(&mut settings, RunDates::Backfill(window), &options).await?;
        }
        Commands::Sources { .. } => output::print_sources(&settings),
    }

    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(settings: &mut Settings, dates: RunDates, options: &RunOptions) -> Result<(), CliError> {
    if !options.only.is_empty() {
        settings.restrict_to(&options.only);
    }

    // Build every connector before touching the network.
    let sources = factory::build_sources(settings)?;
    if sources.is_empty() {
        info!("No sources enabled, nothing to do");
    }
    let warehouse = factory::build_warehouse(settings, options.dry_run).await?;
    let orchestrator = factory::build_orchestrator(settings, warehouse);

    info!(
        sources = sources.len(),
        dry_run = options.dry_run,
        dates = %describe(dates),
        "Starting run"
    );
    let summary = orchestrator.run(&sources, dates).await;

    match &options.output {
        Some(path) => output::write_report(&summary, path).await?,
        None => output::print_report(&summary)?,
    }

    if summary.failed {
        let critical: Vec<String> = summary
            .reports
            .iter()
            .filter(|r| r.critical && r.is_failed())
            .map(|r| r.source_name.clone())
            .collect();
        error!(run_id = %summary.run_id, sources = ?critical, "Critical sources failed");
        return Err(CliError::CriticalSourcesFailed(critical));
    }

    info!(run_id = %summary.run_id, "Run finished");
    Ok(())
}

fn describe(dates: RunDates) -> String {
    match dates {
        RunDates::Daily { today } => format!("daily as of {}", today.format("%Y-%m-%d")),
        RunDates::Backfill(window) => format!("backfill {window}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_run_options() {
        let cli = Cli::try_parse_from([
            "seller-sync",
            "run",
            "--date",
            "2026-01-19",
            "--only",
            "sales_funnel,spp",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Run { date, options } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 1, 19));
                assert_eq!(options.only.len(), 2);
                assert!(options.dry_run);
                assert_eq!(options.env_file.as_os_str(), ".env");
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn rejects_unknown_sources() {
        assert!(Cli::try_parse_from(["seller-sync", "run", "--only", "orders"]).is_err());
    }

    #[test]
    fn backfill_requires_both_bounds() {
        assert!(Cli::try_parse_from(["seller-sync", "backfill", "--from", "2026-01-01"]).is_err());
        let cli = Cli::try_parse_from([
            "seller-sync",
            "backfill",
            "--from",
            "2026-01-01",
            "--to",
            "2026-01-31",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Backfill { .. }));
    }
}
