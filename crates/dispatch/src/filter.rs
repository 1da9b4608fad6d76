//! Accept/reject decision for inbound messages.
//!
//! The filter is a pure function of the message body and the allow-list: the
//! same message always yields the same decision, which is what makes the
//! `reconsume` debug path meaningful.

use tracing::debug;

use crate::{
    parse_image_definition, AcceptedImage, AzureRegion, CommunityGalleryImage,
    ImageDefinitionName, ImageVersionName, PublishedImageMessage, RejectReason, SupportedImages,
};

/// Body field carrying the gallery image definition name.
pub const FIELD_DEFINITION_NAME: &str = "image_definition_name";
/// Body field carrying the gallery image version name.
pub const FIELD_VERSION_NAME: &str = "image_version_name";
/// Body field carrying the ARM resource id of the gallery.
pub const FIELD_RESOURCE_ID: &str = "image_resource_id";
/// Optional body field carrying the Fedora architecture name.
pub const FIELD_ARCHITECTURE: &str = "architecture";

/// Decides which published images are tested and where.
#[derive(Debug, Clone)]
pub struct ImageFilter {
    supported: SupportedImages,
    region: AzureRegion,
}

impl ImageFilter {
    /// Creates a filter for the given allow-list. Accepted images are
    /// referenced in `region`.
    pub fn new(supported: SupportedImages, region: AzureRegion) -> Self {
        Self { supported, region }
    }

    /// The allow-list this filter applies.
    pub fn supported(&self) -> &SupportedImages {
        &self.supported
    }

    /// Evaluates one message.
    ///
    /// # Errors
    ///
    /// Returns the first [`RejectReason`] that applies, checked in this order:
    /// body shape, definition name, allow-list, declared architecture, required
    /// image fields, resource id shape.
    pub fn evaluate(&self, message: &PublishedImageMessage) -> Result<AcceptedImage, RejectReason> {
        if message.body_object().is_none() {
            return Err(RejectReason::BodyNotObject);
        }

        let definition = message
            .body_str(FIELD_DEFINITION_NAME)
            .ok_or(RejectReason::MissingDefinitionName)?;
        let (release, architecture) = parse_image_definition(definition).ok_or_else(|| {
            RejectReason::UnrecognisedDefinitionName { name: definition.to_string() }
        })?;
        self.supported.check(release, architecture)?;

        if let Some(declared) = message.body_str(FIELD_ARCHITECTURE) {
            if declared != architecture.as_str() {
                return Err(RejectReason::ArchitectureMismatch {
                    declared: declared.to_string(),
                    expected: architecture,
                });
            }
        }

        let version = message
            .body_str(FIELD_VERSION_NAME)
            .and_then(ImageVersionName::new)
            .ok_or(RejectReason::MissingImageField { field: FIELD_VERSION_NAME })?;
        let resource_id = message
            .body_str(FIELD_RESOURCE_ID)
            .filter(|s| !s.is_empty())
            .ok_or(RejectReason::MissingImageField { field: FIELD_RESOURCE_ID })?;

        // "/subscriptions/<id>/..." splits as ["", "subscriptions", "<id>", ...].
        let gallery = resource_id.split('/').nth(2).ok_or_else(|| {
            RejectReason::InvalidResourceId { resource_id: resource_id.to_string() }
        })?;

        let definition = ImageDefinitionName::new(definition)
            .ok_or(RejectReason::MissingDefinitionName)?;
        let gallery_image =
            CommunityGalleryImage::from_parts(&self.region, gallery, &definition, &version);
        debug!(image = %gallery_image, "constructed community gallery image");

        Ok(AcceptedImage { release, architecture, definition, version, gallery_image })
    }
}
