//! Serde model for IIIF Presentation manifests and collections.
//!
//! Only the fields needed to enumerate page images are modelled. Both the
//! 2.x `@id` spelling and the 3.x `id` spelling are accepted.

use serde::Deserialize;

/// A manifest, or a collection listing member manifests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    /// Sequences of canvases; only the first is used.
    #[serde(default)]
    pub sequences: Vec<Sequence>,
    /// Member manifests when this document is a collection.
    #[serde(default)]
    pub manifests: Vec<ManifestRef>,
}

/// An ordered run of canvases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sequence {
    /// Pages in reading order.
    #[serde(default)]
    pub canvases: Vec<Canvas>,
}

/// One page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Canvas {
    /// Image annotations painted on this canvas.
    #[serde(default)]
    pub images: Vec<ImageAnnotation>,
}

/// Image annotation wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageAnnotation {
    /// The painted image.
    pub resource: ImageResource,
}

/// An image resource and its optional image service.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageResource {
    /// Full image URL.
    #[serde(rename = "@id", alias = "id")]
    pub id: String,
    /// IIIF Image API service.
    #[serde(default)]
    pub service: Option<ServiceRef>,
}

/// A service given as one object or a list of objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceRef {
    /// Single service.
    One(Service),
    /// Several services; the first is used.
    Many(Vec<Service>),
}

/// IIIF Image API endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    /// Service base URL.
    #[serde(rename = "@id", alias = "id")]
    pub id: String,
}

/// Reference to a member manifest inside a collection.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestRef {
    /// Member manifest URL.
    #[serde(rename = "@id", alias = "id")]
    pub id: String,
}

impl Manifest {
    /// True when the document lists member manifests instead of canvases.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.sequences.is_empty() && !self.manifests.is_empty()
    }

    /// Every image resource of the first sequence, flattened in order.
    pub fn images(&self) -> impl Iterator<Item = &ImageResource> {
        self.sequences
            .first()
            .into_iter()
            .flat_map(|seq| seq.canvases.iter())
            .flat_map(|canvas| canvas.images.iter())
            .map(|annotation| &annotation.resource)
    }
}

impl ImageResource {
    /// Image-service base URL, without a trailing slash.
    ///
    /// Uses `service.@id` when present, otherwise the prefix of the resource
    /// id before `/full/`.
    #[must_use]
    pub fn service_endpoint(&self) -> Option<String> {
        let declared = match &self.service {
            Some(ServiceRef::One(service)) => Some(service.id.as_str()),
            Some(ServiceRef::Many(services)) => services.first().map(|s| s.id.as_str()),
            None => None,
        };

        declared
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.id.find("/full/").map(|pos| &self.id[..pos]))
            .map(|endpoint| endpoint.trim().trim_end_matches('/').to_string())
    }
}
