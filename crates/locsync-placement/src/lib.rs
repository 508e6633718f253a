//! locsync Placement - location sets and placement diffing
//!
//! This crate derives the locations an object is assigned to from its
//! labels and annotations and computes the minimal merge patch that aligns
//! an object with the namespace it lives in.
//!
//! # Example
//! ```
//! use locsync_common::Metadata;
//! use locsync_placement::{LocationKeys, compute_placement};
//!
//! let keys = LocationKeys::default();
//! let namespace = Metadata::new().with_label(keys.state_label(&"east".into()), "Sync");
//! let object = Metadata::new().with_label(keys.state_label(&"west".into()), "Sync");
//!
//! let patch = compute_placement(&keys, &namespace, &object);
//! assert_eq!(patch.labels.map(|l| l.len()), Some(2));
//! ```

pub mod compute;
pub mod locations;
pub mod patch;
pub mod timestamp;

pub use compute::{PlacementPatch, compute_placement};
pub use locations::{LocationKeys, LocationSets, Side, locations};
pub use patch::{MergePatch, MetadataPatch, PatchMap};
pub use timestamp::valid_rfc3339;
