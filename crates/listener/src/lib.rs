//! Message source infrastructure.
//!
//! Implements the [`dispatch::EventSource`] trait with three backends:
//!
//! - [`AmqpEventSource`]: consumes `AzurePublishedV1` messages from the
//!   fedora-messaging broker via `lapin`, one at a time.
//! - [`DatagrepperSource`]: fetches one archived message by id over HTTP and
//!   replays it (the `reconsume` debug path).
//! - [`FileSource`]: replays messages saved as JSON files.
//!
//! | Command | EventSource |
//! |---------|-------------|
//! | `consume` | `AmqpEventSource` |
//! | `reconsume <id>` | `DatagrepperSource` |
//! | `dispatch <file>...` | `FileSource` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Broker connection, queue declaration, acknowledgement,
//! HTTP transport, and message decoding all live here. The [`dispatch`] crate
//! sees only [`dispatch::EventSource`] and [`dispatch::PublishedImageMessage`].

pub mod amqp;
pub mod datagrepper;
pub mod error;
pub mod file;

pub use amqp::{AmqpEventSource, AmqpSettings, Binding, TlsSettings};
pub use datagrepper::{DatagrepperClient, DatagrepperSource, DEFAULT_DATAGREPPER_URL};
pub use error::SourceError;
pub use file::{read_message, FileSource};
