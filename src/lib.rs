//! fleet-verify - convergence verification for fleet-onboarding controllers
//!
//! An onboarding controller provisions instances in the background, joins them
//! to the cluster as nodes, records each one in a tracking registry and writes
//! a per-instance credential secret. This crate observes that work from the
//! outside and proves, through bounded polling, that the visible state has
//! converged to the expected fleet.
//!
//! # Modules
//!
//! - [`fleet`] - Frozen snapshot of the provisioned nodes
//! - [`correlate`] - Instance ID extraction and node lookup
//! - [`poll`] - Bounded polling with fleet-size-scaled deadlines
//! - [`registry`] - Tracking registry convergence and content checks
//! - [`credentials`] - Per-instance credential secret checks
//! - [`checks`] - Node label and taint assertions
//! - [`validation`] - Table-driven admission checks for [`crd::FleetConfig`]
//! - [`flow`] - Stage-by-stage verification flow
//! - [`client`] - Control-plane access seam
//! - [`config`] - Verifier settings
//! - [`telemetry`] - Tracing setup
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod checks;
pub mod client;
pub mod config;
pub mod correlate;
pub mod crd;
pub mod credentials;
pub mod error;
pub mod fleet;
pub mod flow;
pub mod poll;
pub mod registry;
pub mod telemetry;
pub mod validation;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
