//! warren: AMQP command-line client.
//!
//! ```text
//! warren --gen-config                  Write default config to stdout
//! warren [--config <path>] <command>   Connect, run one command, close
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warren_core::Connection;

use warren_cli::commands::{self, Command};
use warren_cli::config::CliConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "warren", version, about = "AMQP 0-8 / 0-9-1 command-line client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "warren.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        println!("{}", CliConfig::default_toml()?);
        return Ok(());
    }
    let Some(command) = cli.command else {
        eprintln!("no command given; see --help");
        std::process::exit(2);
    };

    let config = CliConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        "warren v{} -> {}:{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.broker.host,
        config.broker.port(),
        config.broker.spec
    );

    let mut conn = Connection::new(config.broker);
    conn.start().await?;

    let outcome = tokio::select! {
        result = commands::run(&mut conn, command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received; shutting down");
            Ok(())
        }
    };

    if let Err(e) = conn.close().await {
        warn!("close failed: {e}");
    }
    outcome?;
    Ok(())
}
