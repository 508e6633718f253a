//! Location set extraction
//!
//! An object's placement is encoded in its metadata: a label
//! `<state prefix><location>` marks the location as assigned, and an
//! annotation `<deletion prefix><location>` carries the timestamp at which
//! the location started being withdrawn.

use crate::timestamp::valid_rfc3339;
use locsync_common::{LocationId, Metadata, PlacementConfig};
use std::collections::BTreeSet;

/// Key layout used to encode placement in metadata
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationKeys {
    state_label_prefix: String,
    deletion_annotation_prefix: String,
    sync_state: String,
}

impl LocationKeys {
    /// Create a key layout
    pub fn new(
        state_label_prefix: impl Into<String>,
        deletion_annotation_prefix: impl Into<String>,
        sync_state: impl Into<String>,
    ) -> Self {
        Self {
            state_label_prefix: state_label_prefix.into(),
            deletion_annotation_prefix: deletion_annotation_prefix.into(),
            sync_state: sync_state.into(),
        }
    }

    /// Label key marking `location` as assigned
    #[must_use]
    pub fn state_label(&self, location: &LocationId) -> String {
        format!("{}{}", self.state_label_prefix, location)
    }

    /// Annotation key carrying the deletion timestamp of `location`
    #[must_use]
    pub fn deletion_annotation(&self, location: &LocationId) -> String {
        format!("{}{}", self.deletion_annotation_prefix, location)
    }

    /// State written for a newly assigned location
    #[must_use]
    pub fn sync_state(&self) -> &str {
        &self.sync_state
    }

    fn assigned_location(&self, label: &str) -> Option<LocationId> {
        suffix(label, &self.state_label_prefix)
    }

    fn deleting_location(&self, annotation: &str) -> Option<LocationId> {
        suffix(annotation, &self.deletion_annotation_prefix)
    }
}

impl Default for LocationKeys {
    fn default() -> Self {
        Self::from(&PlacementConfig::default())
    }
}

impl From<&PlacementConfig> for LocationKeys {
    fn from(config: &PlacementConfig) -> Self {
        Self::new(
            config.state_label_prefix.clone(),
            config.deletion_annotation_prefix.clone(),
            config.sync_state.clone(),
        )
    }
}

fn suffix(key: &str, prefix: &str) -> Option<LocationId> {
    key.strip_prefix(prefix)
        .filter(|loc| !loc.is_empty())
        .map(LocationId::from)
}

/// Which side of the comparison the metadata belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The namespace: deletion annotations count only with a valid timestamp
    Namespace,
    /// The object inside the namespace: deletion annotations count on presence
    Resource,
}

/// Locations derived from one object's metadata
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocationSets {
    /// Locations with an assignment label, whatever its value
    pub assigned: BTreeSet<LocationId>,
    /// Locations with a deletion annotation
    pub deleting: BTreeSet<LocationId>,
}

/// Extract the assigned and pending-deletion locations from `metadata`
#[must_use]
pub fn locations(keys: &LocationKeys, metadata: &Metadata, side: Side) -> LocationSets {
    let assigned = metadata
        .labels
        .keys()
        .filter_map(|label| keys.assigned_location(label))
        .collect();

    let deleting = metadata
        .annotations
        .iter()
        .filter(|(_, value)| side == Side::Resource || valid_rfc3339(value))
        .filter_map(|(annotation, _)| keys.deleting_location(annotation))
        .collect();

    LocationSets { assigned, deleting }
}
