//! datadog-sync CLI entrypoint.
//!
//! This is the main entrypoint for the datadog-sync command-line tool.

use std::io::Write;
use std::process::ExitCode;

use datadog_sync::cli::{Cli, Commands, OutputFormatter, SyncArgs, TagArgs};
use datadog_sync::config::{Command, ConfigBuilder, ConfigFile, ConfigParser};
use datadog_sync::error::Result;
use datadog_sync::resources::ResourceRegistry;
use datadog_sync::runner::SyncRunner;
use datadog_sync::state::{LocalStateStore, DEFAULT_DESTINATION_PATH, DEFAULT_SOURCE_PATH};
use datadog_sync::tagging::{Retagger, TagMapping, TagReport};

use clap::Parser;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    // Flags fall back to environment variables, so .env is loaded first.
    if let Err(e) = ConfigParser::new().load_dotenv() {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point. Returns whether a diff found changes.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);

    let file = match &cli.config {
        Some(path) => ConfigParser::new().load_file(path)?,
        None => ConfigFile::default(),
    };

    let registry = ResourceRegistry::with_defaults();

    if let Commands::Tag(args) = &cli.command {
        let report = run_tag(args, file, &registry).await?;
        writeln!(std::io::stdout().lock(), "{}", formatter.format_tag_report(&report))?;
        return Ok(false);
    }
    let Some((command, args)) = cli.command.parts() else {
        return Ok(false);
    };

    let config = ConfigBuilder::new(command, &registry).with_file(file).build(args)?;
    debug!("Resolved configuration: {config:?}");

    let store = LocalStateStore::new(&config.source_resources_path, &config.destination_resources_path);
    let runner = SyncRunner::new(&config, &registry, &store)?;

    let report = runner.run(|candidates| confirm_cleanup(command, args, candidates)).await?;
    writeln!(std::io::stdout().lock(), "{}", formatter.format_report(&report))?;

    Ok(report.has_changes())
}

/// Runs the `tag` command against the local source state.
async fn run_tag(args: &TagArgs, file: ConfigFile, registry: &ResourceRegistry) -> Result<TagReport> {
    let mapping = match &args.mapping {
        Some(path) => TagMapping::load(path)?,
        None => {
            warn!("No tag mapping given; only the generic steps run");
            TagMapping::default()
        }
    };

    let source = args
        .source_resources_path
        .clone()
        .or(file.source_resources_path)
        .unwrap_or_else(|| DEFAULT_SOURCE_PATH.into());
    let destination = file
        .destination_resources_path
        .unwrap_or_else(|| DEFAULT_DESTINATION_PATH.into());

    let store = LocalStateStore::new(source, destination);
    Retagger::new(registry, &store, &mapping).run(&args.options()).await
}

/// Asks on the terminal whether cleanup may delete `candidates`.
fn confirm_cleanup(command: Command, args: &SyncArgs, candidates: &[(String, String)]) -> bool {
    if args.yes {
        return true;
    }

    eprint!("{}", OutputFormatter::format_cleanup_prompt(candidates));
    if std::io::stderr().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    let confirmed = input.trim().eq_ignore_ascii_case("y");
    if !confirmed {
        eprintln!("Cleanup cancelled; {command} continues without deleting.");
    }
    confirmed
}
