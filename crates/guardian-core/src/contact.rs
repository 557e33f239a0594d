//! Trusted contact domain types

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum length of a contact's display name (after trimming).
pub const MIN_NAME_LEN: usize = 2;

/// Accepted phone formats: optional `+` country prefix, optional area code
/// (bare or parenthesised), then digits with optional `-` / space separators.
static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+]?[\s0-9]+)?(\d{3}|[(]?[0-9]+[)])?([-]?[\s]?[0-9])+$")
        .expect("Invalid phone number regex")
});

/// Opaque identifier of a trusted contact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    /// Generate a fresh random identifier (UUID v4)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContactId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ContactId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A trusted contact that receives alerts and location shares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub phone_number: String,
}

impl Contact {
    /// Create a validated contact with a freshly generated ID
    pub fn new(name: impl Into<String>, phone_number: impl Into<String>) -> Result<Self> {
        Self::with_id(ContactId::generate(), name, phone_number)
    }

    /// Create a validated contact with a known ID
    pub fn with_id(
        id: ContactId,
        name: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Result<Self> {
        let contact = Self {
            id,
            name: name.into().trim().to_string(),
            phone_number: phone_number.into().trim().to_string(),
        };
        contact.validate()?;
        Ok(contact)
    }

    /// Check name and phone number against the contact rules.
    ///
    /// Contacts read back from storage bypass the constructors, so stores
    /// call this before handing them to the engine.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().chars().count() < MIN_NAME_LEN {
            return Err(Error::invalid_contact(format!(
                "Name must be at least {} characters",
                MIN_NAME_LEN
            )));
        }
        if !is_valid_phone_number(&self.phone_number) {
            return Err(Error::invalid_contact(format!(
                "Invalid phone number format: {}",
                self.phone_number
            )));
        }
        Ok(())
    }
}

/// Check a phone number against the accepted pattern
pub fn is_valid_phone_number(phone: &str) -> bool {
    PHONE_PATTERN.is_match(phone)
}
