//! annofork command-line front end
//!
//! ```text
//! annofork [--root DIR] [--config FILE] <command>
//! ```
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`).

mod cli;
mod commands;

use annofork_store::CancelFlag;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = cli::Cli::parse();

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current file");
            on_interrupt.cancel();
        }
    });

    let output = commands::run(cli, &cancel).await?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
