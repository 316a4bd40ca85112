use crate::error::CliError;
use engine_config::{settings::Settings, sources::SourceKind};
use engine_runtime::orchestrator::RunSummary;
use std::path::Path;

fn generate_report_json(summary: &RunSummary) -> Result<String, CliError> {
    let json = serde_json::to_string_pretty(summary)?;
    Ok(json)
}

pub async fn write_report(summary: &RunSummary, path: &Path) -> Result<(), CliError> {
    let report_json = generate_report_json(summary)?;
    tokio::fs::write(path, report_json).await?;
    Ok(())
}

pub fn print_report(summary: &RunSummary) -> Result<(), CliError> {
    let report_json = generate_report_json(summary)?;
    println!("{report_json}");
    Ok(())
}

pub fn print_sources(settings: &Settings) {
    println!(
        "{:<20} {:<8} {:<9} {:<30} {}",
        "Source", "Enabled", "Critical", "Table", "Key"
    );
    println!("{}", "-".repeat(100));
    for kind in SourceKind::ALL {
        println!(
            "{:<20} {:<8} {:<9} {:<30} {}",
            kind.name(),
            yes_no(settings.is_enabled(kind)),
            yes_no(settings.is_critical(kind)),
            settings.table(kind),
            kind.key_columns().join(", ")
        );
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
