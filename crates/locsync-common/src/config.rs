//! Configuration types for locsync
//!
//! This module defines configuration structures used across components.
//! Every section has defaults, so a partial configuration file is valid.

use crate::error::{Error, Result};
use crate::types::{GroupResource, ResourceType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Label prefix marking a location as assigned
pub const DEFAULT_STATE_LABEL_PREFIX: &str = "state.workload.locsync.io/";

/// Annotation prefix carrying a location's pending-deletion timestamp
pub const DEFAULT_DELETION_ANNOTATION_PREFIX: &str = "deletion.workload.locsync.io/";

/// Assignment state requesting that a resource be synced to a location
pub const DEFAULT_SYNC_STATE: &str = "Sync";

/// Root configuration for locsync
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Placement key layout and exclusions
    pub placement: PlacementConfig,
    /// Worker and retry configuration
    pub controller: ControllerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check the configuration for values the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        self.placement.validate()?;
        self.controller.validate()
    }
}

/// Placement key layout
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Label prefix; the suffix is the location ID
    pub state_label_prefix: String,
    /// Annotation prefix; the suffix is the location ID
    pub deletion_annotation_prefix: String,
    /// Value written to the label of a newly assigned location
    pub sync_state: String,
    /// Resource types that are never reconciled
    pub excluded_resources: Vec<GroupResource>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            state_label_prefix: DEFAULT_STATE_LABEL_PREFIX.to_string(),
            deletion_annotation_prefix: DEFAULT_DELETION_ANNOTATION_PREFIX.to_string(),
            sync_state: DEFAULT_SYNC_STATE.to_string(),
            // Ingresses are placed by their own controller
            excluded_resources: vec![GroupResource::new("networking.k8s.io", "ingresses")],
        }
    }
}

impl PlacementConfig {
    /// Whether objects of this type are skipped
    #[must_use]
    pub fn is_excluded(&self, resource: &ResourceType) -> bool {
        self.excluded_resources
            .iter()
            .any(|gr| gr.group == resource.group && gr.resource == resource.resource)
    }

    fn validate(&self) -> Result<()> {
        if self.state_label_prefix.is_empty() {
            return Err(Error::configuration("placement.state_label_prefix must not be empty"));
        }
        if self.deletion_annotation_prefix.is_empty() {
            return Err(Error::configuration(
                "placement.deletion_annotation_prefix must not be empty",
            ));
        }
        if self.sync_state.is_empty() {
            return Err(Error::configuration("placement.sync_state must not be empty"));
        }
        Ok(())
    }
}

/// Worker pool and retry configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Delay before the first retry of a failed item (milliseconds)
    pub base_retry_delay_ms: u64,
    /// Upper bound on the retry delay (milliseconds)
    pub max_retry_delay_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            base_retry_delay_ms: 5,
            max_retry_delay_ms: 1_000_000, // ~16 minutes
        }
    }
}

impl ControllerConfig {
    #[must_use]
    pub const fn base_retry_delay(&self) -> Duration {
        Duration::from_millis(self.base_retry_delay_ms)
    }

    #[must_use]
    pub const fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::configuration("controller.workers must be at least 1"));
        }
        if self.base_retry_delay_ms > self.max_retry_delay_ms {
            return Err(Error::configuration(
                "controller.base_retry_delay_ms exceeds controller.max_retry_delay_ms",
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
