//! Settings parser for .guardian/config.toml

use super::types::Settings;
use guardian_core::prelude::*;
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "config.toml";
const GUARDIAN_DIR: &str = ".guardian";
const LOGS_DIR: &str = "logs";

/// Default base directory for `.guardian/`: the user's home, or the
/// working directory when there is none
pub fn default_base_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Path of the `.guardian` directory under `base`
pub fn config_dir(base: &Path) -> PathBuf {
    base.join(GUARDIAN_DIR)
}

/// Directory the `guardian` binary writes its rotated logs to
pub fn log_dir(base: &Path) -> PathBuf {
    config_dir(base).join(LOGS_DIR)
}

/// Load settings from `<base>/.guardian/config.toml`.
///
/// Returns default settings if the file is missing or invalid.
pub fn load_settings(base: &Path) -> Settings {
    let config_path = config_dir(base).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Resolve the contact store file configured in `settings`
pub fn contacts_path(base: &Path, settings: &Settings) -> PathBuf {
    config_dir(base).join(&settings.contacts.store_file)
}

/// Create `.guardian/` with a commented default config.toml.
///
/// An existing config file is left untouched.
pub fn init_config_dir(base: &Path) -> Result<()> {
    let guardian_dir = config_dir(base);

    if !guardian_dir.exists() {
        std::fs::create_dir_all(&guardian_dir)
            .map_err(|e| Error::config(format!("Failed to create .guardian dir: {}", e)))?;
    }

    let config_path = guardian_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        let default_content = r#"# Guardian Angel Configuration

[alert]
location_timeout_ms = 5000   # Give up on the SOS location fix after this long
max_delivery_retries = 0     # Extra send attempts per contact

[sharing]
sample_interval_secs = 30    # Position refresh while sharing
tick_interval_ms = 1000      # Countdown refresh
default_duration_minutes = 30
duration_options = [15, 30, 60, 120, 0]   # 0 = until stopped
notify_recipients = true     # Text recipients when sharing starts

[location]
# Fixed coordinates for machines without a location provider.
# Leave unset to report location as unavailable.
# latitude = 40.7128
# longitude = -74.006

[contacts]
store_file = "contacts.json"
"#;
        std::fs::write(&config_path, default_content)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config at {:?}", config_path);
    }

    Ok(())
}
