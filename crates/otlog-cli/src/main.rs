#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "otlog: encrypted, branchable operation log",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Blob store directory (overrides `[store] path`).
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Config file to use instead of `.otlog/config.toml`.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Generate a signing identity",
        long_about = "Generate an Ed25519 signing key and a self-signed certificate.",
        after_help = "EXAMPLES:\n    # Create .otlog/identity/{signing.key,cert.der}\n    otlog keygen --name alice.example\n\n    # Replace an existing identity\n    otlog keygen --name alice.example --force"
    )]
    Keygen(cmd::keygen::KeygenArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Initialize a log",
        long_about = "Write the project config and create the root entry of a new log.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    OTLOG_PASSPHRASE=... otlog init\n\n    # Emit machine-readable output\n    otlog init --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Write",
        about = "Insert or replace a record",
        long_about = "Append an upsert entry carrying one record on top of the head.",
        after_help = "EXAMPLES:\n    # New record with a generated id\n    otlog put '{\"title\": \"hello\"}'\n\n    # Replace an existing record\n    otlog put '\"v2\"' --id 0190c6c0-1f4e-7000-8000-000000000001"
    )]
    Put(cmd::put::PutArgs),

    #[command(
        next_help_heading = "Write",
        about = "Delete a record",
        long_about = "Append a delete entry for one record id on top of the head.",
        after_help = "EXAMPLES:\n    otlog delete 0190c6c0-1f4e-7000-8000-000000000001"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one entry",
        long_about = "Fetch, verify and decrypt one entry by reference.",
        after_help = "EXAMPLES:\n    # The current head\n    otlog show\n\n    # A specific entry\n    otlog show blake3:3f2a..."
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "List records at an entry",
        long_about = "Materialize the record set from an entry's snapshot.",
        after_help = "EXAMPLES:\n    otlog records\n    otlog records blake3:3f2a... --json"
    )]
    Records(cmd::records::RecordsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show history",
        long_about = "Walk every ancestor of an entry, newest first.",
        after_help = "EXAMPLES:\n    otlog log\n    otlog log --limit 10"
    )]
    Log(cmd::log::LogArgs),

    #[command(
        next_help_heading = "Branches",
        about = "Find a common ancestor",
        long_about = "Find the lowest common ancestor of two entries.",
        after_help = "EXAMPLES:\n    otlog lca blake3:aaaa... blake3:bbbb..."
    )]
    Lca(cmd::lca::LcaArgs),

    #[command(
        next_help_heading = "Branches",
        about = "Merge another head",
        long_about = "Merge another head into the current one and record a merge entry.",
        after_help = "EXAMPLES:\n    # Merge a replica's head into ours\n    otlog merge blake3:bbbb...\n\n    # Preview without moving the head\n    otlog merge blake3:bbbb... --dry-run"
    )]
    Merge(cmd::merge::MergeArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("OTLOG_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "otlog=debug,info"
        } else {
            "otlog=info,warn"
        })
    });

    let format = env::var("OTLOG_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let effective = otlog_core::config::resolve_config(&project_root, cli.config.as_deref(), cli.json)?;
    let output = OutputMode::from_resolved(&effective.resolved_output);
    let globals = cmd::Globals {
        config: effective,
        store_override: cli.store,
        output,
    };
    debug!(root = %project_root.display(), ?output, "config resolved");

    let result = match &cli.command {
        Commands::Keygen(args) => cmd::keygen::run_keygen(args, &globals),
        Commands::Init(args) => cmd::init::run_init(args, &globals),
        Commands::Put(args) => cmd::put::run_put(args, &globals),
        Commands::Delete(args) => cmd::delete::run_delete(args, &globals),
        Commands::Show(args) => cmd::show::run_show(args, &globals),
        Commands::Records(args) => cmd::records::run_records(args, &globals),
        Commands::Log(args) => cmd::log::run_log(args, &globals),
        Commands::Lca(args) => cmd::lca::run_lca(args, &globals),
        Commands::Merge(args) => cmd::merge::run_merge(args, &globals),
    };

    if let Err(err) = result {
        render_error(output, &CliError::from(&err))?;
        std::process::exit(1);
    }
    Ok(())
}
