//! Newtype domain identifiers.
//!
//! Every name that travels between the bus message, the filter, and the LISA
//! invocation is a distinct newtype wrapping a `String`. This prevents
//! accidentally passing, for example, an [`ImageVersionName`] where an
//! [`ImageDefinitionName`] is expected even though both are strings under the
//! hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// Deserialization goes through new(), so empty strings are rejected there too.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String")]
        pub struct $name(String);

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
                    .ok_or_else(|| concat!(stringify!($name), " must not be empty").to_string())
            }
        }

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: bus-assigned
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a single bus message.
    ///
    /// Assigned by the publisher (a UUID in practice, but treated as opaque).
    /// Used for correlation in logs and to look a message up again through the
    /// `reconsume` path.
    MessageId
}

string_id! {
    /// The AMQP routing key a message was published under, e.g.
    /// `"org.fedoraproject.prod.fedora_image_uploader.published.v1.azure.Fedora-Cloud-Rawhide-x64"`.
    Topic
}

// ---------------------------------------------------------------------------
// Identifiers: Azure Compute Gallery names
// ---------------------------------------------------------------------------

string_id! {
    /// An image definition within the Fedora community gallery,
    /// e.g. `"Fedora-Cloud-Rawhide-x64"` or `"Fedora-Cloud-42-Arm64"`.
    ImageDefinitionName
}

string_id! {
    /// A version of an image definition, e.g. `"20250101.0"`.
    ImageVersionName
}

string_id! {
    /// An Azure region name, e.g. `"westus3"`.
    AzureRegion
}

string_id! {
    /// An Azure subscription identifier (a GUID string).
    SubscriptionId
}

// ---------------------------------------------------------------------------
// Identifiers: LISA run labelling
// ---------------------------------------------------------------------------

string_id! {
    /// The LISA run name passed with `-i`, e.g. `"January01-2025-1200"`.
    RunName
}

/// Identifies one dispatch of one message.
///
/// Generated fresh for every accepted message; recorded on the dispatch span
/// so all activity for one LISA run can be correlated across crates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`RunId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
