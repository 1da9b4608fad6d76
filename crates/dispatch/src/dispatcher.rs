//! Filter-then-trigger handling of one message.
//!
//! The dispatcher is stateless between messages: each call evaluates the
//! message, builds a fresh [`RunConfiguration`] if it is accepted, awaits the
//! trigger, and reports a [`Disposition`]. Nothing is retried.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use crate::{
    AcceptedImage, AzureRegion, Disposition, ImageFilter, MessageHandler, PublishedImageMessage,
    RejectReason, RunConfiguration, RunId, SubscriptionId, SupportedImages, TestTrigger,
    Timestamp,
};

/// Static per-process settings applied to every accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Region test VMs are deployed in; also the region of the gallery reference.
    pub region: AzureRegion,
    /// Subscription test VMs are billed to.
    pub subscription_id: SubscriptionId,
    /// SSH private key for the VMs. `None` means generate one per run.
    pub private_key: Option<PathBuf>,
    /// Name runs after their start time instead of letting LISA pick.
    pub custom_run_name: bool,
}

/// Routes accepted messages to a [`TestTrigger`].
pub struct Dispatcher<T> {
    filter: ImageFilter,
    settings: DispatchSettings,
    trigger: T,
}

impl<T: TestTrigger> Dispatcher<T> {
    pub fn new(supported: SupportedImages, settings: DispatchSettings, trigger: T) -> Self {
        let filter = ImageFilter::new(supported, settings.region.clone());
        Self { filter, settings, trigger }
    }

    /// The trigger this dispatcher hands accepted runs to.
    pub fn trigger(&self) -> &T {
        &self.trigger
    }

    /// Accept/reject decision for `message` without triggering anything.
    ///
    /// # Errors
    ///
    /// Returns the [`RejectReason`] for messages the filter declines.
    pub fn evaluate(&self, message: &PublishedImageMessage) -> Result<AcceptedImage, RejectReason> {
        self.filter.evaluate(message)
    }

    /// Builds the run configuration for an accepted image started at `started`.
    pub fn run_configuration(&self, image: &AcceptedImage, started: Timestamp) -> RunConfiguration {
        RunConfiguration {
            run_id: RunId::new_random(),
            region: self.settings.region.clone(),
            subscription_id: self.settings.subscription_id.clone(),
            private_key: self.settings.private_key.clone(),
            image: image.gallery_image.clone(),
            image_definition: image.definition.clone(),
            run_name: self.settings.custom_run_name.then(|| started.run_name()),
        }
    }

    /// Evaluates `message` and, if accepted, runs the tests for it.
    #[instrument(
        name = "dispatch",
        skip_all,
        fields(message_id = message.id_for_log(), run_id = tracing::field::Empty)
    )]
    pub async fn dispatch(&self, message: &PublishedImageMessage) -> Disposition {
        match &message.topic {
            Some(topic) if message.is_azure_published() => {
                info!(%topic, "message properties match AzurePublishedV1 schema");
            }
            Some(topic) => warn!(%topic, "message topic is not an AzurePublishedV1 topic"),
            None => warn!("message has no topic"),
        }

        let image = match self.filter.evaluate(message) {
            Ok(image) => image,
            Err(reason) => {
                info!(%reason, "skipping message");
                return Disposition::Rejected(reason);
            }
        };

        let run = self.run_configuration(&image, Timestamp::now());
        let run_id = run.run_id;
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        info!(
            image = %run.image,
            release = %image.release,
            architecture = %image.architecture,
            run_name = run.run_name.as_ref().map(|n| n.as_str()),
            "triggering test run"
        );

        match self.trigger.trigger(run).await {
            Ok(outcome) => {
                if outcome.is_success() {
                    info!("test run completed successfully");
                } else {
                    error!(?outcome, "test run failed");
                }
                Disposition::Completed { run_id, outcome }
            }
            Err(err) => {
                error!(error = %err, "failed to trigger test run");
                Disposition::TriggerFailed { run_id, error: err.to_string() }
            }
        }
    }
}

#[async_trait]
impl<T: TestTrigger> MessageHandler for Dispatcher<T> {
    async fn handle(&self, message: PublishedImageMessage) -> Disposition {
        self.dispatch(&message).await
    }
}
