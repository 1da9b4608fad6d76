//! Core dispatch domain for the Fedora cloud image tests.
//!
//! This crate decides which published images get tested and describes what a
//! test run needs. Infrastructure crates implement the traits defined here;
//! they never add filtering rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; the `lisa` and `listener` crates define *how*
//! to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype names (`MessageId`, `ImageDefinitionName`, `RunId`, etc.) |
//! | [`types`] | Releases, architectures, the allow-list, run configuration, outcomes |
//! | [`errors`] | Rejection reasons and trigger/results error types |
//! | [`message`] | The inbound `AzurePublishedV1` envelope |
//! | [`filter`] | The accept/reject decision |
//! | [`dispatcher`] | Filter-then-trigger handling of one message |
//! | [`ports`] | `TestTrigger`, `MessageHandler`, `EventSource` |
//! | [`results`] | The outbound test results schema |

pub mod dispatcher;
pub mod errors;
pub mod filter;
pub mod identifiers;
pub mod message;
pub mod ports;
pub mod results;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use dispatcher::{DispatchSettings, Dispatcher};
pub use errors::{RejectReason, ResultsError, TriggerError};
pub use filter::ImageFilter;
pub use identifiers::{
    AzureRegion, ImageDefinitionName, ImageVersionName, MessageId, RunId, RunName,
    SubscriptionId, Topic,
};
pub use message::{PublishedImageMessage, AZURE_PUBLISHED_ROUTING_KEY, AZURE_PUBLISHED_TOPIC};
pub use ports::{EventSource, MessageHandler, TestTrigger};
pub use results::{AzureTestResults, TestResultGroup};
pub use types::{
    definition_name, parse_image_definition, AcceptedImage, Architecture, CommunityGalleryImage,
    Disposition, FedoraRelease, RunConfiguration, SupportedImages, Timestamp, TriggerOutcome,
};
