// src/main.rs
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use ct_tailer::config::Config;
use ct_tailer::sink::PostgresSink;
use ct_tailer::supervisor::Supervisor;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "fatal startup error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    let sink = PostgresSink::new(&config.sink_database_url, config.sink_max_connections)
        .await
        .context("failed to reach sink database")?;
    sink.migrate().await.context("failed to prepare sink schema")?;
    sink.ping().await.context("sink database is unreachable")?;

    let supervisor = Supervisor::new(config, Arc::new(sink));
    supervisor.run().await
}
