//! Error and rejection types for the dispatch domain.
//!
//! [`RejectReason`] is not a failure: it records why the filter declined a
//! message so the decision can be logged. [`TriggerError`] covers the ways the
//! test trigger can fail to start a run. [`ResultsError`] reports schema
//! violations in a test results message body.
//!
//! Message-source failures (broker connection, HTTP, file I/O) are defined in
//! the `listener` crate.

use thiserror::Error;

use crate::{Architecture, FedoraRelease};

// ---------------------------------------------------------------------------
// Filter decisions
// ---------------------------------------------------------------------------

/// Why a message was dropped without starting a run.
///
/// Rejected messages are acknowledged; they are never retried or dead-lettered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The message body is not a JSON object.
    #[error("message body is not an object")]
    BodyNotObject,

    /// `image_definition_name` is absent or not a string.
    #[error("message body has no string 'image_definition_name'")]
    MissingDefinitionName,

    /// The definition name does not follow `Fedora-Cloud-<release>-<x64|Arm64>`.
    #[error("image definition '{name}' is not a Fedora Cloud image definition")]
    UnrecognisedDefinitionName {
        /// The offending name as received.
        name: String,
    },

    /// The release is not in the allow-list.
    #[error("release '{release}' is not in the supported release list")]
    UnsupportedRelease {
        /// The release parsed from the definition name.
        release: FedoraRelease,
    },

    /// The architecture is not in the allow-list.
    #[error("architecture '{architecture}' is not in the supported architecture list")]
    UnsupportedArchitecture {
        /// The architecture parsed from the definition name.
        architecture: Architecture,
    },

    /// The body's `architecture` field disagrees with the definition name.
    #[error("body architecture '{declared}' does not match image definition architecture '{expected}'")]
    ArchitectureMismatch {
        /// Value of the body's `architecture` field.
        declared: String,
        /// Architecture implied by the definition name.
        expected: Architecture,
    },

    /// A required image field is absent, empty, or not a string.
    #[error("missing required image field '{field}'")]
    MissingImageField {
        /// Name of the body field.
        field: &'static str,
    },

    /// `image_resource_id` has fewer than three `/`-separated segments.
    #[error("image resource id '{resource_id}' is not a valid resource path")]
    InvalidResourceId {
        /// The resource id as received.
        resource_id: String,
    },
}

// ---------------------------------------------------------------------------
// Trigger failures
// ---------------------------------------------------------------------------

/// Failures to start or supervise an external test run.
///
/// An unsuccessful exit of the external framework is *not* an error; it is
/// reported as [`crate::TriggerOutcome::Failed`].
#[derive(Debug, Error)]
pub enum TriggerError {
    /// A required run parameter is empty or missing.
    ///
    /// Produced before anything is spawned.
    #[error("invalid run configuration: {reason}")]
    InvalidRunConfiguration {
        /// Which parameter was rejected.
        reason: String,
    },

    /// The external framework process could not be started.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        /// The program that was executed.
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A throwaway SSH key pair could not be generated for the run.
    #[error("SSH key generation failed: {reason}")]
    KeyGeneration {
        /// What went wrong.
        reason: String,
    },

    /// I/O failed while supervising the running process.
    #[error("I/O error while running tests: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Results schema
// ---------------------------------------------------------------------------

/// Schema violations in an `AzureTestResults` message body.
#[derive(Debug, Error)]
pub enum ResultsError {
    /// The body does not match the schema's shape or types.
    #[error("results body does not match schema: {0}")]
    Schema(#[from] serde_json::Error),

    /// A required string field is empty.
    #[error("results field '{field}' must not be empty")]
    EmptyField {
        /// Name of the body field.
        field: &'static str,
    },
}
