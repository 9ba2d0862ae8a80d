//! learnmap - personal learning tracker

use clap::Parser;
use learnmap::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // WARN by default; --verbose raises it to INFO, RUST_LOG still applies
    let level = if cli.verbose { tracing::Level::INFO } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    cli::run(cli)
}
