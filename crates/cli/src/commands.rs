use chrono::NaiveDate;
use clap::{Args, Subcommand};
use engine_config::sources::SourceKind;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the enabled sources for one day
    Run {
        #[arg(long, help = "Run as if today were this date (YYYY-MM-DD)")]
        date: Option<NaiveDate>,

        #[command(flatten)]
        options: RunOptions,
    },
    /// Run the enabled sources over an explicit window
    Backfill {
        #[arg(long, help = "First day of the window (YYYY-MM-DD)")]
        from: NaiveDate,

        #[arg(long, help = "Last day of the window (YYYY-MM-DD)")]
        to: NaiveDate,

        #[command(flatten)]
        options: RunOptions,
    },
    /// List the source catalogue with flags, tables and keys
    Sources {
        #[arg(long, default_value = ".env", help = "Env file merged under the process environment")]
        env_file: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunOptions {
    #[arg(
        long,
        value_delimiter = ',',
        help = "Only run these sources, ignoring the RUN_* flags"
    )]
    pub only: Vec<SourceKind>,

    #[arg(long, help = "Fetch and transform, but keep rows in memory")]
    pub dry_run: bool,

    #[arg(
        long,
        help = "If specified, writes the JSON report to this file instead of stdout"
    )]
    pub output: Option<PathBuf>,

    #[arg(long, default_value = ".env", help = "Env file merged under the process environment")]
    pub env_file: PathBuf,
}

impl Commands {
    pub fn env_file(&self) -> &PathBuf {
        match self {
            Commands::Run { options, .. } | Commands::Backfill { options, .. } => &options.env_file,
            Commands::Sources { env_file } => env_file,
        }
    }
}
