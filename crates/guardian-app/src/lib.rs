//! guardian-app - Emergency session engine for Guardian Angel
//!
//! This crate implements the TEA (The Elm Architecture) pattern for the SOS
//! alert and live location sharing sessions, the Engine facade that owns
//! them, and configuration loading.

pub mod actions;
pub mod config;
pub mod engine;
pub mod engine_event;
pub mod handler;
pub mod message;
pub mod process;
pub mod session;
pub mod signals;
pub mod state;

// Re-export primary types
pub use engine::Engine;
pub use engine_event::EngineEvent;
pub use handler::{UpdateAction, UpdateResult};
pub use message::Message;
pub use session::{
    AlertSession, AlertState, DeliveryOutcome, DeliveryReport, Epoch, SharingPhase,
    SharingSession, SharingState,
};
pub use state::AppState;
