//! Renderable previews for selected media.
//!
//! A preview is either an embeddable image (a `data:` URL) or a marker for
//! media that cannot be rendered inline. Consumers match on [`Preview`]
//! instead of comparing sentinel strings.

use serde::{Deserialize, Serialize};

/// Media types that have no inline preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Pdf,
    Video,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Preview {
    /// Self-contained `data:` URL.
    Image(String),
    NonPreviewable(MediaKind),
}

impl Preview {
    pub fn as_image(&self) -> Option<&str> {
        match self {
            Preview::Image(data) => Some(data),
            Preview::NonPreviewable(_) => None,
        }
    }
}

/// Previews persisted alongside (but separately from) the field draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePreviewCache {
    pub cover_image: Option<Preview>,
    pub government_id: Option<Preview>,
    pub proof_of_need: Option<Preview>,
}

impl ImagePreviewCache {
    pub fn is_empty(&self) -> bool {
        self.cover_image.is_none() && self.government_id.is_none() && self.proof_of_need.is_none()
    }
}
