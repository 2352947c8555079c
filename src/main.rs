use clap::Parser;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod client;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

#[cfg(test)]
mod tests;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,library_jobs=debug,sqlx=warn")),
        )
        .init();

    cli::run(cli::Cli::parse()).await
}
