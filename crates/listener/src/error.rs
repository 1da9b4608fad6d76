use std::path::PathBuf;

use thiserror::Error;

/// Transport failures of a message source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("datagrepper request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("message could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration value the source needs is unusable.
    #[error("invalid source configuration: {0}")]
    Config(String),
}
