//! # guardian-core - Core Domain Types
//!
//! Foundation crate for Guardian Angel. Provides the domain types shared by
//! the emergency session engine, error handling, the user-visible alert
//! texts, and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, regex, tracing, uuid).
//!
//! ## Public API
//!
//! ### Contacts (`contact`)
//! - [`Contact`] - A validated trusted contact (name + phone number)
//! - [`ContactId`] - Opaque contact identifier
//!
//! ### Positions (`position`)
//! - [`Position`] - A timestamped latitude/longitude sample
//!
//! ### Alert Texts (`sos`)
//! - [`compose_sos_message()`] - The bit-exact SOS text sent to contacts
//! - [`compose_sharing_notice()`] - Notice sent when a sharing session starts
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum with `recoverable` vs `fatal` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//! - [`SessionKind`] - Alert or sharing, used to tag session errors

pub mod contact;
pub mod error;
pub mod logging;
pub mod position;
pub mod sos;

/// Prelude for common imports used throughout all Guardian Angel crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use contact::{is_valid_phone_number, Contact, ContactId, MIN_NAME_LEN};
pub use error::{Error, Result, ResultExt, SessionKind};
pub use position::{Position, MAPS_BASE_URL};
pub use sos::{
    compose_sharing_notice, compose_sos_message, describe_duration, SOS_LOCATION_UNAVAILABLE,
};
