mod collectors;
mod config;
mod console;
mod db;
mod error;
mod models;
mod normalize;

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::collectors::hh::HhClient;
use crate::collectors::runner;
use crate::config::{Command, Config};
use crate::console::Console;

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vacancydb=info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let file = File::create(path)?;
            subscriber
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        // stdout belongs to the report menu
        None => subscriber.with_writer(std::io::stderr).init(),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    init_tracing(config.log_file.as_deref())?;

    tracing::info!("The program has been launched");
    let command = config.resolved_command();

    let store = db::connect(&config, command != Command::Menu).await?;

    if command != Command::Menu {
        let employer_ids = config.employer_ids();
        if employer_ids.is_empty() {
            tracing::warn!("No employer IDs to load");
        } else {
            tracing::info!("Employer IDs: {employer_ids:?}");
        }

        let mut client = HhClient::new(&config.api_url, &config.user_agent)?;
        let report = runner::ingest(&mut client, store.as_ref(), &employer_ids).await?;
        if !report.fetched.skipped.is_empty() {
            tracing::warn!("Skipped employers: {:?}", report.fetched.skipped);
        }
        if report.stored.vacancies == 0 {
            tracing::warn!("No vacancies were stored");
        }
    }

    if command != Command::Load {
        let input = tokio::io::BufReader::new(tokio::io::stdin());
        Console::new(input, tokio::io::stdout())
            .run(store.as_ref())
            .await?;
    }

    Ok(())
}
