//! Messages stored as JSON files on local disk.
//!
//! A file holds either a full envelope (`id`, `topic`, `headers`, `body`, as
//! saved from datagrepper) or a bare message body.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dispatch::{EventSource, MessageHandler, PublishedImageMessage};
use serde_json::Value;
use tracing::info;

use crate::SourceError;

/// Reads one message file.
///
/// # Errors
///
/// Returns [`SourceError::Read`] if the file cannot be read and
/// [`SourceError::Decode`] if it is not a JSON message.
pub async fn read_message(path: &Path) -> Result<PublishedImageMessage, SourceError> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|source| SourceError::Read { path: path.to_path_buf(), source })?;
    let value: Value = serde_json::from_slice(&raw)?;
    if value.get("body").is_some() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(PublishedImageMessage::from_body(value))
    }
}

/// [`EventSource`] that feeds each file in order, once.
pub struct FileSource {
    paths: Vec<PathBuf>,
}

impl FileSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl EventSource for FileSource {
    type Error = SourceError;

    async fn run(&mut self, handler: &dyn MessageHandler) -> Result<(), SourceError> {
        for path in &self.paths {
            let message = read_message(path).await?;
            let disposition = handler.handle(message).await;
            info!(path = %path.display(), accepted = disposition.is_accepted(), "message file processed");
        }
        Ok(())
    }
}
