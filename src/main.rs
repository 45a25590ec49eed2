//! iris-lab entry point

use clap::Parser;
use iris_lab::cli::{dispatch, Cli};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iris_lab=info".into()),
        )
        .init();

    let cli = Cli::parse();
    dispatch(cli)
}
