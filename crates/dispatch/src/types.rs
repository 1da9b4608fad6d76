//! Shared value types for the dispatch domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! invariants (a release is either Rawhide or a positive release number, an
//! architecture is one Azure supports) and participate in filter decisions.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AzureRegion, ImageDefinitionName, ImageVersionName, RejectReason, RunId, RunName,
    SubscriptionId,
};

/// Prefix shared by every Fedora Cloud image definition in the community gallery.
pub const IMAGE_DEFINITION_PREFIX: &str = "Fedora-Cloud-";

// ---------------------------------------------------------------------------
// Release and architecture
// ---------------------------------------------------------------------------

/// A Fedora release as named in an image definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FedoraRelease {
    /// The rolling development branch.
    Rawhide,
    /// A numbered release, e.g. `42`.
    Numbered(u32),
}

impl FromStr for FedoraRelease {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("rawhide") {
            return Ok(Self::Rawhide);
        }
        match s.parse::<u32>() {
            Ok(n) if n > 0 => Ok(Self::Numbered(n)),
            _ => Err(format!("not a Fedora release: '{s}'")),
        }
    }
}

impl TryFrom<String> for FedoraRelease {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FedoraRelease> for String {
    fn from(release: FedoraRelease) -> Self {
        release.to_string()
    }
}

impl std::fmt::Display for FedoraRelease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rawhide => write!(f, "Rawhide"),
            Self::Numbered(n) => write!(f, "{n}"),
        }
    }
}

// ---------------------------------------------------------------------------

/// CPU architecture of a published image.
///
/// Displayed and parsed using the Fedora names (`x86_64`, `aarch64`); the
/// gallery uses its own suffixes (`x64`, `Arm64`) which are handled by
/// [`Architecture::from_gallery_suffix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Architecture {
    X86_64,
    Aarch64,
}

impl Architecture {
    /// Maps an image definition suffix (`x64`, `Arm64`) to an architecture.
    pub fn from_gallery_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "x64" => Some(Self::X86_64),
            "Arm64" => Some(Self::Aarch64),
            _ => None,
        }
    }

    /// The suffix this architecture carries in gallery image definition names.
    pub fn gallery_suffix(self) -> &'static str {
        match self {
            Self::X86_64 => "x64",
            Self::Aarch64 => "Arm64",
        }
    }

    /// The Fedora name of this architecture.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
        }
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" => Ok(Self::X86_64),
            "aarch64" => Ok(Self::Aarch64),
            other => Err(format!("not a supported architecture name: '{other}'")),
        }
    }
}

impl TryFrom<String> for Architecture {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Architecture> for String {
    fn from(arch: Architecture) -> Self {
        arch.as_str().to_string()
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits an image definition name of the form
/// `Fedora-Cloud-<release>-<x64|Arm64>` into its release and architecture.
///
/// Returns `None` for names outside that scheme, including non-canonical
/// spellings such as `rawhide` or `042` that name no gallery definition.
pub fn parse_image_definition(name: &str) -> Option<(FedoraRelease, Architecture)> {
    let rest = name.strip_prefix(IMAGE_DEFINITION_PREFIX)?;
    let (release, suffix) = rest.rsplit_once('-')?;
    let release: FedoraRelease = release.parse().ok()?;
    let arch = Architecture::from_gallery_suffix(suffix)?;
    (name == definition_name(release, arch)).then_some((release, arch))
}

/// The gallery image definition name for a release/architecture pair.
pub fn definition_name(release: FedoraRelease, arch: Architecture) -> String {
    format!("{IMAGE_DEFINITION_PREFIX}{release}-{}", arch.gallery_suffix())
}

// ---------------------------------------------------------------------------
// Allow-list
// ---------------------------------------------------------------------------

/// The releases and architectures that are tested.
///
/// This is the single source of truth for the allow-list. The defaults track
/// Rawhide plus the two most recent stable releases; deployments override them
/// from configuration when a new release branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedImages {
    /// Releases whose images are tested.
    pub releases: Vec<FedoraRelease>,
    /// Architectures whose images are tested.
    pub architectures: Vec<Architecture>,
}

impl Default for SupportedImages {
    fn default() -> Self {
        Self {
            releases: vec![
                FedoraRelease::Rawhide,
                FedoraRelease::Numbered(42),
                FedoraRelease::Numbered(41),
            ],
            architectures: vec![Architecture::X86_64, Architecture::Aarch64],
        }
    }
}

impl SupportedImages {
    /// Checks a release/architecture pair against the allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`RejectReason::UnsupportedRelease`] or
    /// [`RejectReason::UnsupportedArchitecture`] for pairs outside the list.
    pub fn check(&self, release: FedoraRelease, arch: Architecture) -> Result<(), RejectReason> {
        if !self.releases.contains(&release) {
            return Err(RejectReason::UnsupportedRelease { release });
        }
        if !self.architectures.contains(&arch) {
            return Err(RejectReason::UnsupportedArchitecture { architecture: arch });
        }
        Ok(())
    }

    /// Every image definition name covered by this allow-list,
    /// e.g. `Fedora-Cloud-Rawhide-x64`.
    pub fn definition_names(&self) -> Vec<String> {
        self.releases
            .iter()
            .flat_map(|release| {
                self.architectures.iter().map(move |arch| definition_name(*release, *arch))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Accepted image
// ---------------------------------------------------------------------------

/// A reference to a community gallery image version in the form
/// `"{region}/{gallery}/{image_definition}/{image_version}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommunityGalleryImage(String);

impl CommunityGalleryImage {
    /// Builds the reference from its parts. `gallery` may be empty; the
    /// reference is still well-formed in that case.
    pub fn from_parts(
        region: &AzureRegion,
        gallery: &str,
        definition: &ImageDefinitionName,
        version: &ImageVersionName,
    ) -> Self {
        Self(format!("{region}/{gallery}/{definition}/{version}"))
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommunityGalleryImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The normalized descriptor of a message that passed the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedImage {
    pub release: FedoraRelease,
    pub architecture: Architecture,
    pub definition: ImageDefinitionName,
    pub version: ImageVersionName,
    /// The image reference handed to LISA.
    pub gallery_image: CommunityGalleryImage,
}

// ---------------------------------------------------------------------------
// Run configuration and outcome
// ---------------------------------------------------------------------------

/// Everything the trigger needs to start one LISA run.
///
/// Built by the dispatcher for one accepted message and consumed by the
/// trigger; it is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    /// Correlates this run across log lines.
    pub run_id: RunId,
    /// Region the test VMs are deployed in.
    pub region: AzureRegion,
    /// Subscription the test VMs are billed to.
    pub subscription_id: SubscriptionId,
    /// Private key LISA uses to reach the VMs.
    ///
    /// `None` asks the trigger to provision a throwaway key pair for this run.
    pub private_key: Option<PathBuf>,
    /// The gallery image under test.
    pub image: CommunityGalleryImage,
    /// Image definition the image belongs to; names the per-image log directory.
    pub image_definition: ImageDefinitionName,
    /// LISA run name. `None` lets LISA choose its own.
    pub run_name: Option<RunName>,
}

/// What the external framework reported, judged only by its exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The process exited with status 0.
    Passed,
    /// The process exited unsuccessfully.
    Failed {
        /// Exit code, or `None` if the process was terminated by a signal.
        code: Option<i32>,
    },
}

impl TriggerOutcome {
    /// Returns `true` for [`TriggerOutcome::Passed`].
    pub fn is_success(self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// How the dispatcher finished with a message.
///
/// Every disposition ends with the message acknowledged; there is no retry.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// The filter rejected the message; no run was started.
    Rejected(RejectReason),
    /// A run was started and the framework exited.
    Completed { run_id: RunId, outcome: TriggerOutcome },
    /// A run was attempted but the framework could not be invoked.
    TriggerFailed { run_id: RunId, error: String },
}

impl Disposition {
    /// Returns `true` if the message passed the filter.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// The LISA run name for a run started at this time, e.g. `January01-2025-1200`.
    pub fn run_name(self) -> RunName {
        RunName::new(self.0.format("%B%d-%Y-%H%M").to_string())
            .unwrap_or_else(|| unreachable!("formatted timestamps are never empty"))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
