//! Merge patch documents
//!
//! The wire shape is a JSON merge patch restricted to object metadata:
//!
//! ```json
//! { "metadata": { "labels": { "k": "v" }, "annotations": { "k": null } } }
//! ```
//!
//! A key mapped to a string is set, a key mapped to `null` is removed and
//! keys that are not mentioned are left untouched.

use locsync_common::{Error, Metadata, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key changes for one metadata map; `None` removes the key
pub type PatchMap = BTreeMap<String, Option<String>>;

/// Metadata merge patch document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePatch {
    #[serde(default)]
    pub metadata: MetadataPatch,
}

/// Changes to labels and annotations
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<PatchMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<PatchMap>,
}

impl MergePatch {
    /// Build a patch from label and annotation changes
    #[must_use]
    pub fn new(labels: Option<PatchMap>, annotations: Option<PatchMap>) -> Self {
        Self {
            metadata: MetadataPatch {
                labels,
                annotations,
            },
        }
    }

    /// Whether applying the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metadata.labels.as_ref().is_none_or(BTreeMap::is_empty)
            && self.metadata.annotations.as_ref().is_none_or(BTreeMap::is_empty)
    }

    /// Serialize to the JSON wire format
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::serialization(e.to_string()))
    }

    /// Parse from the JSON wire format
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::InvalidPatch(e.to_string()))
    }

    /// Apply merge semantics to `metadata`
    pub fn apply(&self, metadata: &mut Metadata) {
        if let Some(labels) = &self.metadata.labels {
            apply_map(&mut metadata.labels, labels);
        }
        if let Some(annotations) = &self.metadata.annotations {
            apply_map(&mut metadata.annotations, annotations);
        }
    }
}

fn apply_map(target: &mut BTreeMap<String, String>, patch: &PatchMap) {
    for (key, value) in patch {
        match value {
            Some(value) => {
                target.insert(key.clone(), value.clone());
            }
            None => {
                target.remove(key);
            }
        }
    }
}

/// Render a patch map as JSON for logging
#[must_use]
pub fn patch_map_json(map: Option<&PatchMap>) -> String {
    map.map_or_else(
        || "null".to_string(),
        |m| serde_json::to_string(m).unwrap_or_else(|_| "<unprintable>".to_string()),
    )
}
