//! Port traits implemented by infrastructure crates.
//!
//! | Trait | Implemented by |
//! |-------|----------------|
//! | [`TestTrigger`] | `lisa::LisaRunner` |
//! | [`EventSource`] | `listener::AmqpEventSource`, `listener::DatagrepperSource`, `listener::FileSource` |
//! | [`MessageHandler`] | [`crate::Dispatcher`] |

use async_trait::async_trait;

use crate::{Disposition, PublishedImageMessage, RunConfiguration, TriggerError, TriggerOutcome};

/// Starts one external test run and waits for it to finish.
#[async_trait]
pub trait TestTrigger: Send + Sync {
    /// Runs the tests described by `run` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError`] only when the run could not be started or
    /// supervised. A run that starts and fails is `Ok(TriggerOutcome::Failed)`.
    async fn trigger(&self, run: RunConfiguration) -> Result<TriggerOutcome, TriggerError>;
}

/// Processes one decoded message.
///
/// Handlers never fail: every message ends in a [`Disposition`] and is then
/// acknowledged by the source.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: PublishedImageMessage) -> Disposition;
}

/// A supplier of bus messages.
///
/// Sources deliver messages one at a time and wait for the handler to return
/// before fetching the next one.
#[async_trait]
pub trait EventSource: Send {
    /// Error type for transport failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Feeds messages to `handler` until the source is exhausted or shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails; per-message problems are
    /// logged and do not end the loop.
    async fn run(&mut self, handler: &dyn MessageHandler) -> Result<(), Self::Error>;
}
