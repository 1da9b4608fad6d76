//! Live consumption from the fedora-messaging AMQP broker.
//!
//! Declares a durable queue, binds it to the configured routing keys, and
//! consumes with a prefetch of one so the next message is not delivered until
//! the current test run has finished. Every handled message is acknowledged,
//! whatever its disposition; undecodable deliveries are rejected without
//! requeue.

use std::path::PathBuf;

use async_trait::async_trait;
use dispatch::{
    EventSource, MessageHandler, MessageId, PublishedImageMessage, Topic,
    AZURE_PUBLISHED_ROUTING_KEY,
};
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::tcp::OwnedTLSConfig;
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::SourceError;

/// Consumer tag announced to the broker.
pub const CONSUMER_TAG: &str = "fedora-cloud-tests";

/// Default queue name.
pub const DEFAULT_QUEUE: &str = "azure_published_consumer";

/// One queue binding, in fedora-messaging's `[[bindings]]` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    #[serde(default = "default_exchange")]
    pub exchange: String,
    pub queue: String,
    pub routing_keys: Vec<String>,
}

impl Default for Binding {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            queue: DEFAULT_QUEUE.to_string(),
            routing_keys: vec![AZURE_PUBLISHED_ROUTING_KEY.to_string()],
        }
    }
}

fn default_exchange() -> String {
    "amq.topic".to_string()
}

/// TLS options for `amqps://` brokers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSettings {
    /// PEM bundle of CA certificates trusted for the broker.
    pub ca_cert: Option<PathBuf>,
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmqpSettings {
    pub url: String,
    pub bindings: Vec<Binding>,
    pub tls: Option<TlsSettings>,
}

impl AmqpSettings {
    /// The single queue consumed from: the queue of the first binding.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if there are no bindings or they name
    /// more than one queue.
    pub fn queue(&self) -> Result<&str, SourceError> {
        let first = self
            .bindings
            .first()
            .ok_or_else(|| SourceError::Config("at least one binding is required".into()))?;
        if let Some(other) = self.bindings.iter().find(|b| b.queue != first.queue) {
            return Err(SourceError::Config(format!(
                "all bindings must use one queue, found '{}' and '{}'",
                first.queue, other.queue
            )));
        }
        Ok(&first.queue)
    }
}

/// Decodes one delivery into a message.
///
/// # Errors
///
/// Returns [`SourceError::Decode`] if the payload is not JSON.
pub fn decode_delivery(
    message_id: Option<&str>,
    routing_key: &str,
    payload: &[u8],
) -> Result<PublishedImageMessage, SourceError> {
    let body = serde_json::from_slice(payload)?;
    let mut message = PublishedImageMessage::from_body(body);
    message.id = message_id.and_then(MessageId::new);
    message.topic = Topic::new(routing_key);
    Ok(message)
}

/// [`EventSource`] over a fedora-messaging broker queue.
pub struct AmqpEventSource {
    settings: AmqpSettings,
}

impl AmqpEventSource {
    pub fn new(settings: AmqpSettings) -> Self {
        Self { settings }
    }

    async fn connect(&self) -> Result<Connection, SourceError> {
        let properties = ConnectionProperties::default();
        let connection = match self.settings.tls.as_ref().and_then(|t| t.ca_cert.as_ref()) {
            Some(ca_cert) => {
                let cert_chain = tokio::fs::read_to_string(ca_cert).await.map_err(|source| {
                    SourceError::Read { path: ca_cert.clone(), source }
                })?;
                let tls = OwnedTLSConfig { identity: None, cert_chain: Some(cert_chain) };
                Connection::connect_with_config(&self.settings.url, properties, tls).await?
            }
            None => Connection::connect(&self.settings.url, properties).await?,
        };
        Ok(connection)
    }
}

#[async_trait]
impl EventSource for AmqpEventSource {
    type Error = SourceError;

    async fn run(&mut self, handler: &dyn MessageHandler) -> Result<(), SourceError> {
        let queue = self.settings.queue()?.to_string();
        let connection = self.connect().await?;
        let channel = connection.create_channel().await?;
        channel.basic_qos(1, BasicQosOptions::default()).await?;

        channel
            .queue_declare(
                &queue,
                QueueDeclareOptions { durable: true, ..QueueDeclareOptions::default() },
                FieldTable::default(),
            )
            .await?;
        for binding in &self.settings.bindings {
            for key in &binding.routing_keys {
                channel
                    .queue_bind(
                        &queue,
                        &binding.exchange,
                        key,
                        QueueBindOptions::default(),
                        FieldTable::default(),
                    )
                    .await?;
                info!(%queue, exchange = %binding.exchange, routing_key = %key, "queue bound");
            }
        }

        let mut consumer = channel
            .basic_consume(&queue, CONSUMER_TAG, BasicConsumeOptions::default(), FieldTable::default())
            .await?;
        info!(%queue, "consuming");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            let message_id = delivery.properties.message_id().as_ref().map(|id| id.as_str());
            match decode_delivery(message_id, delivery.routing_key.as_str(), &delivery.data) {
                Ok(message) => {
                    info!(message_id = message.id_for_log(), "received message");
                    let disposition = handler.handle(message).await;
                    info!(accepted = disposition.is_accepted(), "message processed");
                    delivery.acker.ack(BasicAckOptions::default()).await?;
                }
                Err(err) => {
                    error!(error = %err, routing_key = delivery.routing_key.as_str(), "dropping undecodable message");
                    delivery.acker.reject(BasicRejectOptions { requeue: false }).await?;
                }
            }
        }

        warn!("consumer stream ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binding_matches_fedora_messaging_layout() {
        let binding = Binding::default();
        assert_eq!(binding.exchange, "amq.topic");
        assert_eq!(binding.queue, "azure_published_consumer");
        assert_eq!(
            binding.routing_keys,
            vec!["org.fedoraproject.prod.fedora_image_uploader.published.v1.azure.*"]
        );
    }

    #[test]
    fn settings_require_exactly_one_queue() {
        let mut settings = AmqpSettings {
            url: "amqp://localhost".into(),
            bindings: vec![],
            tls: None,
        };
        assert!(settings.queue().is_err());

        settings.bindings.push(Binding::default());
        assert_eq!(settings.queue().unwrap(), "azure_published_consumer");

        settings.bindings.push(Binding { queue: "other".into(), ..Binding::default() });
        assert!(matches!(settings.queue(), Err(SourceError::Config(_))));
    }

    #[test]
    fn decodes_json_delivery() {
        let message = decode_delivery(
            Some("0b0b6c55-6b57-4b8e-a6a2-9d1b8f2c0d3e"),
            "org.fedoraproject.prod.fedora_image_uploader.published.v1.azure.Fedora-Cloud-42-x64",
            br#"{"image_definition_name": "Fedora-Cloud-42-x64"}"#,
        )
        .unwrap();

        assert_eq!(message.id_for_log(), "0b0b6c55-6b57-4b8e-a6a2-9d1b8f2c0d3e");
        assert!(message.is_azure_published());
        assert_eq!(message.body_str("image_definition_name"), Some("Fedora-Cloud-42-x64"));
    }

    #[test]
    fn missing_id_and_non_json_payloads() {
        let message = decode_delivery(None, "some.topic", b"\"plain string\"").unwrap();
        assert_eq!(message.id_for_log(), "-");
        assert!(!message.is_azure_published());

        assert!(matches!(
            decode_delivery(None, "some.topic", b"not json"),
            Err(SourceError::Decode(_))
        ));
    }
}
