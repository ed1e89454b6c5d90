//! memspect - Process Memory Debugging Engine
//!
//! Entry point that handles CLI argument parsing, logger setup, and
//! hand-off to the interactive REPL.

use clap::Parser;
use memspect::cli::run_cli;
use memspect::config::SessionConfig;

/// memspect: typed memory inspection over simulated and real processes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API key for the optional analysis assistant
    #[arg(long, env = "MEMSPECT_ASSISTANT_KEY")]
    assistant_key: Option<String>,

    /// Step budget for run-to-breakpoint (default 1000)
    #[arg(long)]
    max_steps: Option<usize>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        },
    ))
    .init();

    log::info!("memspect core initialized");

    let mut config = SessionConfig::default();
    config.assistant_api_key = args.assistant_key;
    if let Some(max_steps) = args.max_steps {
        config.default_max_steps = max_steps;
    }

    println!("[*] memspect v{}", env!("CARGO_PKG_VERSION"));
    run_cli(config)?;

    Ok(())
}
