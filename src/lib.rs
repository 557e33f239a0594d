//! Guardian Angel library
//!
//! SOS alerts and time-boxed live location sharing for trusted contacts.
//! The engine lives in the workspace crates; this crate hosts the headless
//! runners used by the `guardian` binary.

pub mod headless;

// Re-export workspace crates
pub use guardian_app as app;
pub use guardian_core as core;
pub use guardian_services as services;

// Re-export main entry points
pub use headless::runner::{run_share, run_sos};
