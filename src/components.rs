// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Component image catalog and image reference resolution.
//!
//! Every workload the operator renders runs one of the images below. A
//! reference is built from three inputs:
//!
//! - the registry prefix (installation `spec.registry`, then
//!   `status.computed.registry`, then [`DEFAULT_REGISTRY`]);
//! - an optional image path replacing the leading path segment;
//! - an optional digest override catalog built from the release's `ImageSet`.
//!
//! ```rust
//! use vigil::components::{resolve_image, ImageOverrides, COMPONENT_INTRUSION_DETECTION_CONTROLLER};
//!
//! let image = resolve_image(
//!     &COMPONENT_INTRUSION_DETECTION_CONTROLLER,
//!     "quay.io/",
//!     None,
//!     &ImageOverrides::default(),
//! )
//! .unwrap();
//! assert_eq!(image, "quay.io/vigil/intrusion-detection-controller:v3.14.0");
//! ```

use crate::constants::{DEFAULT_REGISTRY, IMAGE_SET_PREFIX, RELEASE_VERSION};
use crate::crd::{ImageSet, Installation};
use crate::errors::ImageError;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// A component's canonical image name and default version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentImage {
    /// Canonical image name, e.g. `vigil/deep-packet-inspection`.
    pub image: &'static str,
    /// Default tag for this release.
    pub version: &'static str,
}

pub const COMPONENT_INTRUSION_DETECTION_CONTROLLER: ComponentImage = ComponentImage {
    image: "vigil/intrusion-detection-controller",
    version: RELEASE_VERSION,
};

pub const COMPONENT_ELASTICSEARCH_INSTALLER: ComponentImage = ComponentImage {
    image: "vigil/intrusion-detection-job-installer",
    version: RELEASE_VERSION,
};

pub const COMPONENT_ANOMALY_DETECTION_JOBS: ComponentImage = ComponentImage {
    image: "vigil/anomaly_detection_jobs",
    version: RELEASE_VERSION,
};

pub const COMPONENT_ANOMALY_DETECTION_API: ComponentImage = ComponentImage {
    image: "vigil/anomaly-detection-api",
    version: RELEASE_VERSION,
};

pub const COMPONENT_DEEP_PACKET_INSPECTION: ComponentImage = ComponentImage {
    image: "vigil/deep-packet-inspection",
    version: RELEASE_VERSION,
};

/// Every image this release can run. `ImageSet` entries must name one of these.
pub const RELEASE_COMPONENTS: [ComponentImage; 5] = [
    COMPONENT_INTRUSION_DETECTION_CONTROLLER,
    COMPONENT_ELASTICSEARCH_INSTALLER,
    COMPONENT_ANOMALY_DETECTION_JOBS,
    COMPONENT_ANOMALY_DETECTION_API,
    COMPONENT_DEEP_PACKET_INSPECTION,
];

/// Name of the `ImageSet` that applies to this release.
#[must_use]
pub fn image_set_name() -> String {
    format!("{IMAGE_SET_PREFIX}{RELEASE_VERSION}")
}

/// Digest overrides keyed by canonical image name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageOverrides {
    digests: BTreeMap<String, String>,
}

impl ImageOverrides {
    /// Validate an `ImageSet` and build the override catalog from it.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidImageSet`] if the set is misnamed, lists an
    /// image this release does not run, lists an image twice, or carries a
    /// digest without a `sha256:` prefix and value.
    pub fn from_image_set(image_set: &ImageSet) -> Result<Self, ImageError> {
        let name = image_set.name_any();
        let invalid = |reason: String| ImageError::InvalidImageSet {
            name: name.clone(),
            reason,
        };

        if name != image_set_name() {
            return Err(invalid(format!(
                "name must be {} for this release",
                image_set_name()
            )));
        }

        let mut digests = BTreeMap::new();
        for entry in &image_set.spec.images {
            if !RELEASE_COMPONENTS.iter().any(|c| c.image == entry.image) {
                return Err(invalid(format!("unexpected image {}", entry.image)));
            }
            if !is_valid_digest(&entry.digest) {
                return Err(invalid(format!(
                    "digest {:?} for image {} is not a sha256 digest",
                    entry.digest, entry.image
                )));
            }
            if digests
                .insert(entry.image.clone(), entry.digest.clone())
                .is_some()
            {
                return Err(invalid(format!("image {} is listed twice", entry.image)));
            }
        }

        Ok(Self { digests })
    }

    /// Digest for `image`, if overridden.
    #[must_use]
    pub fn digest_for(&self, image: &str) -> Option<&str> {
        self.digests.get(image).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

/// Digests are opaque past the algorithm prefix.
fn is_valid_digest(digest: &str) -> bool {
    digest
        .strip_prefix("sha256:")
        .is_some_and(|value| !value.is_empty())
}

/// Normalize a registry prefix so it always ends with `/`.
fn normalize_registry(registry: &str) -> String {
    if registry.ends_with('/') {
        registry.to_string()
    } else {
        format!("{registry}/")
    }
}

/// Registry prefix for an installation.
///
/// The declared `spec.registry` wins over the computed one, which wins over
/// [`DEFAULT_REGISTRY`]. Empty strings count as unset.
#[must_use]
pub fn resolve_registry(installation: &Installation) -> String {
    let declared = installation.spec.registry.as_deref();
    let computed = installation
        .status
        .as_ref()
        .and_then(|s| s.computed.as_ref())
        .and_then(|c| c.registry.as_deref());

    declared
        .filter(|r| !r.is_empty())
        .or_else(|| computed.filter(|r| !r.is_empty()))
        .map_or_else(|| DEFAULT_REGISTRY.to_string(), normalize_registry)
}

/// Image path for an installation, declared before computed.
#[must_use]
pub fn resolve_image_path(installation: &Installation) -> Option<String> {
    let computed = installation
        .status
        .as_ref()
        .and_then(|s| s.computed.as_ref())
        .and_then(|c| c.image_path.clone());

    installation
        .spec
        .image_path
        .clone()
        .or(computed)
        .filter(|p| !p.is_empty())
}

/// Resolve the full reference for `component`.
///
/// With an override for the component's canonical image the result is
/// `<registry><image>@<digest>`, otherwise `<registry><image>:<version>`.
///
/// # Errors
///
/// Returns [`ImageError::Unresolvable`] when the component has no default
/// version and no override.
pub fn resolve_image(
    component: &ComponentImage,
    registry: &str,
    image_path: Option<&str>,
    overrides: &ImageOverrides,
) -> Result<String, ImageError> {
    let image = match image_path {
        Some(path) => {
            let base = component
                .image
                .rsplit_once('/')
                .map_or(component.image, |(_, base)| base);
            format!("{}/{base}", path.trim_end_matches('/'))
        }
        None => component.image.to_string(),
    };

    if let Some(digest) = overrides.digest_for(component.image) {
        return Ok(format!("{registry}{image}@{digest}"));
    }

    if component.version.is_empty() {
        return Err(ImageError::Unresolvable {
            image: component.image.to_string(),
        });
    }

    Ok(format!("{registry}{image}:{}", component.version))
}

#[cfg(test)]
#[path = "components_tests.rs"]
mod components_tests;
