use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fxcache", version)]
struct Cli {
    /// Log filter-cache decisions to stderr (repeat for more detail).
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a frame script through a headless filter cache and print the report as JSON.
    Replay(ReplayArgs),
    /// Validate a filter cache config and print it with defaults filled in.
    CheckConfig(CheckConfigArgs),
}

#[derive(Parser, Debug)]
struct ReplayArgs {
    /// Input scenario JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Override the scenario's cache config with this JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print only the final counters.
    #[arg(long, default_value_t = false)]
    stats_only: bool,
}

#[derive(Parser, Debug)]
struct CheckConfigArgs {
    /// Input config JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Replay(args) => cmd_replay(args),
        Command::CheckConfig(args) => cmd_check_config(args),
    }
}

fn cmd_replay(args: ReplayArgs) -> anyhow::Result<()> {
    let mut scenario = fxcache::Scenario::from_path(&args.in_path)?;
    if let Some(path) = &args.config {
        scenario.config = fxcache::FilterCacheConfig::from_path(path)?;
    }

    let report = fxcache::replay(&scenario)
        .with_context(|| format!("replay '{}'", args.in_path.display()))?;

    let json = if args.stats_only {
        serde_json::to_string_pretty(&report.stats)?
    } else {
        serde_json::to_string_pretty(&report)?
    };

    match &args.out {
        Some(out) => {
            if let Some(parent) = out.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(out, json + "\n")
                .with_context(|| format!("write report '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_check_config(args: CheckConfigArgs) -> anyhow::Result<()> {
    let config = fxcache::FilterCacheConfig::from_path(&args.in_path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
