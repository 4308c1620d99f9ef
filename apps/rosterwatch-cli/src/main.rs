//! rosterwatch - Group membership audit for CI pipelines
//!
//! Each run:
//! - Reads the groups to audit from a names file or a directory filter
//! - Fetches their members from Microsoft Graph
//! - Compares against the snapshot saved by the previous run
//! - Writes the new snapshot, a JSON delta and an HTML report
//! - Publishes the outcome as an exit code and pipeline variables

use clap::Parser;
use rosterwatch_core::{GroupSelection, SNAPSHOT_FILE_NAME};
use rosterwatch_entra::{EntraConfig, EntraRosterFetcher, FetchMode};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod audit;
mod error;
mod groups_file;
mod report;
mod signal;

use audit::RunConfig;
use error::{CliError, CliResult};
use signal::PipelineSignal;

/// rosterwatch - Audit directory group membership between pipeline runs
#[derive(Parser, Debug)]
#[command(name = "rosterwatch")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXIT CODES:
    0  No membership changes (or first run)
    1  Membership changes detected
    2  Configuration or input error
    3  Authentication or directory service error
    4  Snapshot or artifact write error

Directory credentials are read from TENANT_ID, CLIENT_ID and CLIENT_SECRET.")]
struct Cli {
    /// File with one group display name per line
    #[arg(long, env = "GROUPS_FILE", conflicts_with = "groups_filter")]
    groups_file: Option<PathBuf>,

    /// OData filter selecting the groups to audit, e.g. "startswith(displayName,'SEC-')"
    #[arg(long, env = "GROUPS_FILTER")]
    groups_filter: Option<String>,

    /// Snapshot written by the previous run
    #[arg(long, env = "PREVIOUS_SNAPSHOT")]
    previous: Option<PathBuf>,

    /// Directory for the new snapshot, delta and report
    #[arg(
        long,
        env = "BUILD_ARTIFACTSTAGINGDIRECTORY",
        default_value = "./pipeline-artifacts"
    )]
    output_dir: PathBuf,

    /// Member fetch strategy: batch or per-group (overrides FETCH_MODE)
    #[arg(long)]
    fetch_mode: Option<FetchMode>,

    /// Skip the HTML report
    #[arg(long)]
    no_report: bool,

    /// Emit Azure Pipelines logging commands (implied when TF_BUILD is set)
    #[arg(long)]
    vso: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn vso_enabled(&self) -> bool {
        self.vso || std::env::var_os("TF_BUILD").is_some()
    }

    fn selection(&self) -> CliResult<GroupSelection> {
        match (&self.groups_file, &self.groups_filter) {
            (Some(path), _) => Ok(GroupSelection::names(groups_file::read_group_names(path)?)),
            (None, Some(filter)) if !filter.trim().is_empty() => {
                Ok(GroupSelection::Filter(filter.trim().to_string()))
            }
            _ => Err(CliError::Config(
                "no groups to audit: pass --groups-file or --groups-filter".to_string(),
            )),
        }
    }

    fn run_config(&self) -> CliResult<RunConfig> {
        Ok(RunConfig {
            selection: self.selection()?,
            previous: self
                .previous
                .clone()
                .unwrap_or_else(|| default_previous_path(std::env::var_os("PIPELINE_WORKSPACE"))),
            output_dir: self.output_dir.clone(),
            write_report: !self.no_report,
        })
    }
}

/// Where a pipeline downloads the previous run's artifact, or the local
/// output directory outside a pipeline.
fn default_previous_path(pipeline_workspace: Option<std::ffi::OsString>) -> PathBuf {
    match pipeline_workspace {
        Some(workspace) => PathBuf::from(workspace)
            .join("group-report-artifacts")
            .join(SNAPSHOT_FILE_NAME),
        None => PathBuf::from("./pipeline-artifacts").join(SNAPSHOT_FILE_NAME),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "debug"
    } else {
        "info,rosterwatch=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let vso = cli.vso_enabled();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            CliError::from(e).print();
            std::process::exit(4);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(signal) => {
            if vso {
                if let Err(e) = signal.emit(&mut std::io::stdout().lock()) {
                    CliError::from(e).print();
                }
            }
            std::process::exit(if signal.changes_detected { 1 } else { 0 });
        }
        Err(e) => {
            e.print();
            if vso {
                println!("{}", signal::log_error(&e.to_string()));
            }
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<PipelineSignal> {
    let mut entra = EntraConfig::from_env()?;
    if let Some(mode) = cli.fetch_mode {
        entra.fetch_mode = mode;
    }
    let config = cli.run_config()?;
    debug!(
        previous = %config.previous.display(),
        output_dir = %config.output_dir.display(),
        fetch_mode = %entra.fetch_mode,
        "Starting group snapshot comparison"
    );

    let fetcher = EntraRosterFetcher::new(entra)?;
    let outcome = audit::execute(&fetcher, &config).await?;
    Ok(PipelineSignal::from_outcome(&outcome))
}
