//! Placement diffing
//!
//! Compares the locations a namespace is assigned to with those recorded on
//! an object inside it and computes the label and annotation changes that
//! align the object with its namespace:
//!
//! - locations the namespace no longer claims lose their assignment label
//!   and, if present, their deletion annotation;
//! - valid deletion timestamps on the namespace are copied onto the object
//!   when the object has none or an invalid one;
//! - locations the namespace claims but the object lacks are set to the
//!   sync state.
//!
//! The computation is pure and recomputed from scratch on every call.

use crate::locations::{LocationKeys, LocationSets, Side, locations};
use crate::patch::{MergePatch, PatchMap};
use crate::timestamp::valid_rfc3339;
use locsync_common::{LocationId, Metadata};
use std::collections::BTreeSet;

/// Label and annotation changes for one object
///
/// `None` means the map is unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlacementPatch {
    pub labels: Option<PatchMap>,
    pub annotations: Option<PatchMap>,
}

impl PlacementPatch {
    /// Whether the object already matches its namespace
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.labels.is_none() && self.annotations.is_none()
    }

    /// Wire document placing labels and annotations under `metadata`
    #[must_use]
    pub fn to_merge_patch(&self) -> MergePatch {
        MergePatch::new(self.labels.clone(), self.annotations.clone())
    }
}

/// Compute the patch aligning `object` with `namespace`
#[must_use]
pub fn compute_placement(
    keys: &LocationKeys,
    namespace: &Metadata,
    object: &Metadata,
) -> PlacementPatch {
    let ns = locations(keys, namespace, Side::Namespace);
    let obj = locations(keys, object, Side::Resource);

    if obj.assigned == ns.assigned && valid_deleting(keys, object, &obj) == ns.deleting {
        return PlacementPatch::default();
    }

    let mut labels = PatchMap::new();
    let mut annotations = PatchMap::new();

    // Withdrawn from the namespace but still on the object.
    for loc in obj.assigned.difference(&ns.assigned) {
        labels.insert(keys.state_label(loc), None);
        let deletion = keys.deletion_annotation(loc);
        if object.annotations.contains_key(&deletion) {
            annotations.insert(deletion, None);
        }
    }

    // Pending deletion on the namespace: propagate unless the object already
    // carries a valid timestamp.
    for loc in ns.assigned.intersection(&ns.deleting) {
        let deletion = keys.deletion_annotation(loc);
        let Some(ts) = namespace.annotation(&deletion) else {
            continue;
        };
        if !object.annotation(&deletion).is_some_and(valid_rfc3339) {
            annotations.insert(deletion, Some(ts.to_string()));
        }
    }

    // Claimed by the namespace, missing on the object.
    for loc in ns.assigned.difference(&obj.assigned) {
        labels.insert(keys.state_label(loc), Some(keys.sync_state().to_string()));
    }

    PlacementPatch {
        labels: (!labels.is_empty()).then_some(labels),
        annotations: (!annotations.is_empty()).then_some(annotations),
    }
}

fn valid_deleting(
    keys: &LocationKeys,
    object: &Metadata,
    sets: &LocationSets,
) -> BTreeSet<LocationId> {
    sets.deleting
        .iter()
        .filter(|loc| {
            object
                .annotation(&keys.deletion_annotation(loc))
                .is_some_and(valid_rfc3339)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TS: &str = "2024-05-01T12:00:00Z";
    const TS2: &str = "2024-06-01T08:30:00+02:00";

    fn keys() -> LocationKeys {
        LocationKeys::default()
    }

    fn assigned(meta: Metadata, locs: &[&str]) -> Metadata {
        let keys = keys();
        locs.iter().fold(meta, |m, loc| {
            m.with_label(keys.state_label(&(*loc).into()), "Sync")
        })
    }

    fn deleting(meta: Metadata, loc: &str, ts: &str) -> Metadata {
        meta.with_annotation(keys().deletion_annotation(&loc.into()), ts)
    }

    fn label(loc: &str) -> String {
        keys().state_label(&loc.into())
    }

    fn annotation(loc: &str) -> String {
        keys().deletion_annotation(&loc.into())
    }

    #[test]
    fn test_move_between_locations() {
        let ns = assigned(Metadata::new(), &["east"]);
        let obj = assigned(Metadata::new(), &["west"]);

        let patch = compute_placement(&keys(), &ns, &obj);

        let labels = patch.labels.unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[&label("west")], None);
        assert_eq!(labels[&label("east")], Some("Sync".to_string()));
        assert_eq!(patch.annotations, None);
    }

    #[test]
    fn test_no_op_when_aligned() {
        let ns = deleting(assigned(Metadata::new(), &["east", "west"]), "west", TS);
        let obj = deleting(assigned(Metadata::new(), &["east", "west"]), "west", TS);

        assert!(compute_placement(&keys(), &ns, &obj).is_empty());
    }

    #[test]
    fn test_no_op_with_different_valid_timestamp() {
        let ns = deleting(assigned(Metadata::new(), &["east"]), "east", TS);
        let obj = deleting(assigned(Metadata::new(), &["east"]), "east", TS2);

        assert!(compute_placement(&keys(), &ns, &obj).is_empty());
    }

    #[test]
    fn test_no_op_ignores_unrelated_metadata() {
        let ns = assigned(Metadata::new().with_label("team", "a"), &["east"]);
        let obj = assigned(
            Metadata::new().with_label("app", "web").with_annotation("note", "x"),
            &["east"],
        );

        assert!(compute_placement(&keys(), &ns, &obj).is_empty());
    }

    #[test]
    fn test_removal_clears_both_markers() {
        let ns = assigned(Metadata::new(), &["east"]);
        let obj = deleting(assigned(Metadata::new(), &["east", "west"]), "west", TS);

        let patch = compute_placement(&keys(), &ns, &obj);

        assert_eq!(patch.labels.unwrap()[&label("west")], None);
        assert_eq!(patch.annotations.unwrap()[&annotation("west")], None);
    }

    #[test]
    fn test_removal_clears_invalid_deletion_marker() {
        let ns = Metadata::new();
        let obj = deleting(assigned(Metadata::new(), &["west"]), "west", "garbage");

        let patch = compute_placement(&keys(), &ns, &obj);

        assert_eq!(patch.labels.unwrap()[&label("west")], None);
        assert_eq!(patch.annotations.unwrap()[&annotation("west")], None);
    }

    #[test]
    fn test_removal_without_deletion_marker_touches_labels_only() {
        let ns = Metadata::new();
        let obj = assigned(Metadata::new(), &["west"]);

        let patch = compute_placement(&keys(), &ns, &obj);

        assert_eq!(patch.labels.unwrap()[&label("west")], None);
        assert_eq!(patch.annotations, None);
    }

    #[test]
    fn test_deletion_timestamp_propagates() {
        let ns = deleting(assigned(Metadata::new(), &["east"]), "east", TS);
        let obj = assigned(Metadata::new(), &["east"]);

        let patch = compute_placement(&keys(), &ns, &obj);

        assert_eq!(patch.labels, None);
        assert_eq!(
            patch.annotations.unwrap()[&annotation("east")],
            Some(TS.to_string())
        );
    }

    #[test]
    fn test_invalid_object_timestamp_is_replaced() {
        let ns = deleting(assigned(Metadata::new(), &["east"]), "east", TS);
        let obj = deleting(assigned(Metadata::new(), &["east"]), "east", "yesterday");

        let patch = compute_placement(&keys(), &ns, &obj);

        assert_eq!(
            patch.annotations.unwrap()[&annotation("east")],
            Some(TS.to_string())
        );
    }

    #[test]
    fn test_invalid_namespace_timestamp_never_propagates() {
        let ns = deleting(assigned(Metadata::new(), &["east", "west"]), "east", "tomorrow");
        let obj = assigned(Metadata::new(), &["east"]);

        let patch = compute_placement(&keys(), &ns, &obj);

        assert_eq!(patch.annotations, None);
        assert_eq!(
            patch.labels.unwrap()[&label("west")],
            Some("Sync".to_string())
        );
    }

    #[test]
    fn test_space_separated_namespace_timestamp_never_propagates() {
        for ts in ["2024-05-01 12:00:00Z", "2024-05-01t12:00:00z", "2024-05-01T12:00:00z"] {
            let ns = deleting(assigned(Metadata::new(), &["east"]), "east", ts);
            let obj = assigned(Metadata::new(), &["east"]);

            assert!(compute_placement(&keys(), &ns, &obj).is_empty(), "{ts}");
        }
    }

    #[test]
    fn test_new_location_gets_sync_and_pending_deletion_together() {
        let ns = deleting(assigned(Metadata::new(), &["east"]), "east", TS);
        let obj = Metadata::new();

        let patch = compute_placement(&keys(), &ns, &obj);

        assert_eq!(
            patch.labels.unwrap()[&label("east")],
            Some("Sync".to_string())
        );
        assert_eq!(
            patch.annotations.unwrap()[&annotation("east")],
            Some(TS.to_string())
        );
    }

    #[test]
    fn test_deletion_without_assignment_is_ignored() {
        // A timestamp for a location the namespace does not claim.
        let ns = deleting(assigned(Metadata::new(), &["east"]), "west", TS);
        let obj = assigned(Metadata::new(), &["east"]);

        assert!(compute_placement(&keys(), &ns, &obj).is_empty());
    }

    #[test]
    fn test_custom_sync_state() {
        let keys = LocationKeys::new("s/", "d/", "Pending");
        let ns = Metadata::new().with_label("s/east", "Sync");

        let patch = compute_placement(&keys, &ns, &Metadata::new());

        assert_eq!(patch.labels.unwrap()["s/east"], Some("Pending".to_string()));
    }

    fn random_metadata(rng: &mut StdRng, namespace: bool) -> Metadata {
        const LOCATIONS: [&str; 4] = ["a", "b", "c", "d"];
        const VALUES: [&str; 3] = [TS, TS2, "not-a-time"];

        let mut meta = Metadata::new().with_label("unrelated", "x");
        for loc in LOCATIONS {
            let is_assigned = rng.gen_bool(0.5);
            if is_assigned {
                meta = assigned(meta, &[loc]);
            }
            // Objects only carry deletion markers for locations they hold.
            if (namespace || is_assigned) && rng.gen_bool(0.4) {
                meta = deleting(meta, loc, VALUES[rng.gen_range(0..VALUES.len())]);
            }
        }
        meta
    }

    #[test]
    fn test_patch_is_idempotent_and_converges() {
        let keys = keys();
        let mut rng = StdRng::seed_from_u64(0x10c5_11c);

        for _ in 0..500 {
            let ns = random_metadata(&mut rng, true);
            let mut obj = random_metadata(&mut rng, false);

            let patch = compute_placement(&keys, &ns, &obj);
            patch.to_merge_patch().apply(&mut obj);

            assert!(
                compute_placement(&keys, &ns, &obj).is_empty(),
                "not idempotent: ns={ns:?} obj={obj:?}"
            );

            let ns_sets = locations(&keys, &ns, Side::Namespace);
            let obj_sets = locations(&keys, &obj, Side::Resource);
            assert_eq!(obj_sets.assigned, ns_sets.assigned);

            for loc in ns_sets.assigned.intersection(&ns_sets.deleting) {
                let value = obj.annotation(&keys.deletion_annotation(loc));
                assert!(value.is_some_and(valid_rfc3339), "{loc} not pending deletion");
            }
            for loc in &obj_sets.deleting {
                assert!(ns_sets.assigned.contains(loc), "{loc} kept a stale marker");
            }
        }
    }
}
