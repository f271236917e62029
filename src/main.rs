// ssorole - tag-searchable AWS SSO roles

mod arn;
mod auth;
mod cache;
mod catalog;
mod cli;
mod config;
mod console;
mod credentials;
mod error;
mod expiry;
mod models;
mod select;
mod source;
mod store;
mod url;

use clap::Parser;
use error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first to get verbose flag
    let args = cli::Cli::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // stdout is reserved for command output such as `eval` exports
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    cli::execute(args).await
}
