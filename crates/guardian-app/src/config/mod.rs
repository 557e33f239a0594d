//! Configuration file parsing for Guardian Angel
//!
//! Supports:
//! - `.guardian/config.toml` - Global settings
//! - `.guardian/contacts.json` - Trusted contacts (path configurable)
//! - `.guardian/logs/` - Rotated log files

pub mod settings;
pub mod types;

pub use settings::{
    config_dir, contacts_path, default_base_dir, init_config_dir, load_settings, log_dir,
};
pub use types::*;
