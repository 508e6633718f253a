//! locsync Common - Shared types and utilities
//!
//! This crate provides the identifiers, object model, error definitions and
//! configuration used across all locsync components.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ControllerConfig, LoggingConfig, PlacementConfig};
pub use error::{Error, Result};
pub use types::*;
