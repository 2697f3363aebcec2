//! pangea-login CLI entry point

use clap::Parser;
use pangea_login::cli::{Cli, Commands};
use pangea_login::core::error::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_env("PANGEA_LOGIN_LOG"))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Login(args) => pangea_login::cli::login::run(args).await,
    }
}
