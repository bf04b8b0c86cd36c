//! fraudlab - fraud detection model training from the command line

use clap::Parser;
use fraudlab::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraudlab=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}
