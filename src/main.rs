use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use autofill_engine::cli::commands::{cmd_autosubmit, cmd_collect, cmd_fill, cmd_serve};
use autofill_engine::cli::config::{Cli, Commands, load_config, resolve_engine_config};

/// Logs go to stderr; stdout carries command output and NDJSON host traffic.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref());
    let engine = resolve_engine_config(&cli, &config);

    match &cli.command {
        Commands::Collect { page } => {
            cmd_collect(page, &engine)?;
        }
        Commands::Fill { page, script } => {
            cmd_fill(page, script, &engine, cli.yes)?;
        }
        Commands::Autosubmit { page, script } => {
            cmd_autosubmit(page, script, &engine, cli.yes)?;
        }
        Commands::Serve { page, host_url } => {
            cmd_serve(page, host_url.as_deref(), &engine, cli.yes)?;
        }
    }

    Ok(())
}
