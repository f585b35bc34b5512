//! rescuewatch: terminal operator console for rescue-drone alerts.
//! Connects to the event relay, keeps the session alive across drops and
//! relays operator decisions back.

use clap::Parser;

mod cli;
mod commands;
mod driver;
mod terminal;
mod transport;

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("RESCUEWATCH_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = args.resolve()?;
    tracing::info!(
        endpoint = %config.endpoint,
        operator = %config.operator_id,
        history = config.history_capacity,
        max_attempts = config.reconnect.max_attempts,
        "rescuewatch starting"
    );

    // One thread: every callback runs to completion before the next.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(driver::run(config))
}
