//! One-shot replay of an archived message, fetched from datagrepper by id.
//!
//! This is the debug `reconsume` path: the same message fed through the same
//! dispatcher produces the same decision as when it was first delivered.

use async_trait::async_trait;
use dispatch::{EventSource, MessageHandler, MessageId, PublishedImageMessage};
use tracing::{info, instrument};

use crate::SourceError;

/// Public datagrepper instance for the production bus.
pub const DEFAULT_DATAGREPPER_URL: &str = "https://apps.fedoraproject.org/datagrepper";

/// HTTP client for datagrepper's message-by-id endpoint.
#[derive(Debug, Clone)]
pub struct DatagrepperClient {
    http: reqwest::Client,
    base_url: String,
}

impl DatagrepperClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// Fetches the raw message with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] for transport failures and non-success
    /// statuses (including unknown ids).
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn fetch(&self, id: &MessageId) -> Result<PublishedImageMessage, SourceError> {
        let url = format!("{}/v2/id", self.base_url);
        let mut message: PublishedImageMessage = self
            .http
            .get(&url)
            .query(&[("id", id.as_str()), ("is_raw", "true")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if message.id.is_none() {
            message.id = Some(id.clone());
        }
        info!(topic = message.topic.as_ref().map(|t| t.as_str()), "fetched message");
        Ok(message)
    }
}

/// [`EventSource`] that yields exactly one archived message.
pub struct DatagrepperSource {
    client: DatagrepperClient,
    message_id: MessageId,
}

impl DatagrepperSource {
    pub fn new(client: DatagrepperClient, message_id: MessageId) -> Self {
        Self { client, message_id }
    }
}

#[async_trait]
impl EventSource for DatagrepperSource {
    type Error = SourceError;

    async fn run(&mut self, handler: &dyn MessageHandler) -> Result<(), SourceError> {
        let message = self.client.fetch(&self.message_id).await?;
        let disposition = handler.handle(message).await;
        info!(message_id = %self.message_id, accepted = disposition.is_accepted(), "message reconsumed");
        Ok(())
    }
}
