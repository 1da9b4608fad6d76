//! The inbound bus message.
//!
//! The `AzurePublishedV1` schema is owned by the image uploader, not by this
//! repository, so the body is kept as raw JSON and only the fields the filter
//! needs are read from it. The same envelope shape (`id`, `topic`, `headers`,
//! `body`) is used by the AMQP consumer, datagrepper, and JSON files on disk.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{MessageId, Topic};

/// Topic fragment shared by every `AzurePublishedV1` routing key.
pub const AZURE_PUBLISHED_TOPIC: &str = "fedora_image_uploader.published.v1.azure";

/// Default routing key the consumer binds to on the production broker.
pub const AZURE_PUBLISHED_ROUTING_KEY: &str =
    "org.fedoraproject.prod.fedora_image_uploader.published.v1.azure.*";

/// A decoded bus message announcing a newly published Azure image.
///
/// Immutable once received and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedImageMessage {
    /// Publisher-assigned message id, if the transport carried one.
    #[serde(default)]
    pub id: Option<MessageId>,

    /// Routing key the message was published under.
    #[serde(default)]
    pub topic: Option<Topic>,

    /// AMQP headers, as JSON.
    #[serde(default)]
    pub headers: Map<String, Value>,

    /// The message body, schema owned by the publisher.
    pub body: Value,
}

impl PublishedImageMessage {
    /// Creates a message from its body with no id, topic, or headers.
    pub fn from_body(body: Value) -> Self {
        Self { id: None, topic: None, headers: Map::new(), body }
    }

    /// Sets the message id.
    #[must_use]
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the topic.
    #[must_use]
    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = Some(topic);
        self
    }

    /// Returns `true` if the topic names the `AzurePublishedV1` schema.
    ///
    /// Messages with other topics are still evaluated; the filter decides on
    /// the body alone.
    pub fn is_azure_published(&self) -> bool {
        self.topic
            .as_ref()
            .is_some_and(|t| t.as_str().contains(AZURE_PUBLISHED_TOPIC))
    }

    /// Returns the body as a JSON object, or `None` if it is any other JSON value.
    pub fn body_object(&self) -> Option<&Map<String, Value>> {
        self.body.as_object()
    }

    /// Returns a body field if the body is an object and the field is a string.
    pub fn body_str(&self, field: &str) -> Option<&str> {
        self.body_object()?.get(field)?.as_str()
    }

    /// Message id for log fields; `"-"` when absent.
    pub fn id_for_log(&self) -> &str {
        self.id.as_ref().map_or("-", MessageId::as_str)
    }
}
