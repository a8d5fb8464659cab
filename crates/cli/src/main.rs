// hrlf - reconcile HRL approval manifests against exported artifact folders

mod exit_codes;
mod filter;
mod jobs;
mod paths;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hrlfilter_recon::JobId;

use exit_codes::{EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};
use filter::JobArgs;

#[derive(Parser)]
#[command(name = "hrlf")]
#[command(about = "Filter exported HRL artifacts against an approval manifest")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(flatten)]
    globals: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Filtration config file [default: <config dir>/hrlfilter/filtration.toml]
    #[arg(long, global = true, env = "HRLF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding job status records
    #[arg(long, global = true, env = "HRLF_JOBS_DIR")]
    pub jobs_dir: Option<PathBuf>,
}

impl GlobalOpts {
    pub fn jobs_dir(&self) -> PathBuf {
        self.jobs_dir.clone().unwrap_or_else(paths::default_jobs_dir)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a filtration job in the foreground, printing progress
    #[command(after_help = "\
Examples:
  hrlf run Approved.xlsx ./hrl
  hrlf run Approved.xlsx ./hrl --policy all --output-dir ./out
  hrlf run Approved.xlsx ./hrl --json")]
    Run {
        #[command(flatten)]
        args: JobArgs,

        /// Print a JSON summary instead of the output path
        #[arg(long)]
        json: bool,

        /// Suppress progress output
        #[arg(long, short = 'q')]
        quiet: bool,

        /// Use a pre-assigned job id (set by `hrlf start`)
        #[arg(long, hide = true)]
        job_id: Option<JobId>,
    },

    /// Start a filtration job in the background and print its id
    #[command(after_help = "\
Examples:
  id=$(hrlf start Approved.xlsx ./hrl --policy oldest)
  hrlf status $id")]
    Start {
        #[command(flatten)]
        args: JobArgs,

        /// Print the job id as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a job's state and progress (-1 means cancelled or failed)
    Status {
        /// Job id or unique prefix
        job: String,

        #[arg(long)]
        json: bool,
    },

    /// Ask a running job to stop at its next checkpoint
    Cancel {
        /// Job id or unique prefix
        job: String,
    },

    /// List known jobs, most recent first
    Jobs {
        #[arg(long)]
        json: bool,
    },

    /// Check a manifest's sheets, columns and load order without running
    #[command(after_help = "\
Examples:
  hrlf validate Approved.xlsx
  hrlf validate Approved.xlsx --artifacts ./hrl --json")]
    Validate {
        /// Manifest workbook
        manifest: PathBuf,

        /// Also report which config types have a folder under this root
        #[arg(long)]
        artifacts: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_COMMIT_HASH"),
        ")",
        "\ntarget:  ",
        env!("TARGET"),
    )
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let globals = cli.globals;
    let result = match cli.command {
        Commands::Run { args, json, quiet, job_id } => filter::cmd_run(&globals, args, job_id, json, quiet),
        Commands::Start { args, json } => filter::cmd_start(&globals, args, json),
        Commands::Status { job, json } => jobs::cmd_status(&globals, job, json),
        Commands::Cancel { job } => jobs::cmd_cancel(&globals, job),
        Commands::Jobs { json } => jobs::cmd_jobs(&globals, json),
        Commands::Validate { manifest, artifacts, json } => filter::cmd_validate(&globals, manifest, artifacts, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
