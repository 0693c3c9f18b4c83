//! Integration tests for fleet-verify against a kind cluster
//!
//! # Test Organization
//!
//! - `fleet_convergence`: Stories where a simulated onboarding controller
//!   writes the tracking registry and instance secrets in the background while
//!   the verifier waits for them
//!
//! - `validation_rules`: Stories about FleetConfig admission through the real
//!   API server schema validation
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored --nocapture
//! ```

mod fleet_convergence;
mod helpers;
mod validation_rules;
