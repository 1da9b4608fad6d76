//! Fedora cloud image tests CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load the fedora-messaging `config.toml` and
//!    apply environment overrides.
//! 2. **Wire observability**: configure `tracing-subscriber` with a human or
//!    JSON layer and, optionally, an OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: create the [`lisa::LisaRunner`] trigger
//!    and inject it into a [`dispatch::Dispatcher`].
//! 4. **Select the message source** from the subcommand:
//!    - `consume`: [`listener::AmqpEventSource`] until interrupted.
//!    - `reconsume <id>`: [`listener::DatagrepperSource`] for one archived message.
//!    - `dispatch <file>...`: [`listener::FileSource`] for messages on disk.
//!    - `summarize-results <file>`: validate a results body and print its summary.

mod config;
mod observability;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dispatch::{AzureTestResults, Dispatcher, EventSource, MessageId};
use lisa::LisaRunner;
use listener::{AmqpEventSource, DatagrepperClient, DatagrepperSource, FileSource};
use tracing::info;

use crate::config::{Config, LogFormat, DEFAULT_CONFIG_PATH};

/// Runs LISA against Fedora Cloud images as they are published to Azure.
#[derive(Debug, Parser)]
#[command(name = "fedora-cloud-tests", version, about)]
struct Cli {
    /// fedora-messaging configuration file.
    #[arg(long, env = "FEDORA_MESSAGING_CONF", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log output format; overrides `[log] format`.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Consume AzurePublishedV1 messages from the broker until interrupted.
    Consume,
    /// Fetch one message from datagrepper by id and process it again.
    Reconsume {
        /// Id of the message to replay.
        message_id: String,
    },
    /// Process messages saved as JSON files.
    Dispatch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Validate a test results message body and print its summary.
    SummarizeResults { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::SummarizeResults { file } = &cli.command {
        let telemetry = observability::init(cli.log_format.unwrap_or_default(), None)?;
        let result = summarize_results(file);
        telemetry.shutdown();
        return result;
    }

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let telemetry = observability::init(
        cli.log_format.unwrap_or(config.log.format),
        config.log.otlp_endpoint.as_deref(),
    )?;

    let result = run(cli.command, &config).await;
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "exiting with error");
    }
    telemetry.shutdown();
    result
}

async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new(
        config.supported_images(),
        config.dispatch_settings()?,
        LisaRunner::new(config.lisa_settings()),
    );

    match command {
        Command::Consume => {
            info!("starting AzurePublishedV1 consumer");
            let mut source = AmqpEventSource::new(config.amqp_settings());
            tokio::select! {
                result = source.run(&dispatcher) => result?,
                _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
            }
        }
        Command::Reconsume { message_id } => {
            let id = MessageId::new(message_id).context("message id must not be empty")?;
            let client = DatagrepperClient::new(config.datagrepper_url.as_str());
            DatagrepperSource::new(client, id).run(&dispatcher).await?;
        }
        Command::Dispatch { files } => {
            FileSource::new(files).run(&dispatcher).await?;
        }
        Command::SummarizeResults { file } => summarize_results(&file)?,
    }
    Ok(())
}

/// Accepts a bare results body or a full message envelope with a `body` field.
fn summarize_results(path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut value: serde_json::Value = serde_json::from_str(&raw)?;
    if let Some(body) = value.get_mut("body") {
        value = body.take();
    }
    let results = AzureTestResults::from_value(value)?;
    info!(topic = %AzureTestResults::topic(), "{results}");
    println!("{}", results.summary());
    Ok(())
}
