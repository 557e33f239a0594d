//! Trusted contact directory
//!
//! The engine only ever reads contacts through [`ContactDirectory::list`] and
//! snapshots the result at session start. [`ContactBook`] is the concrete
//! store used by the CLI: an in-memory list persisted as JSON after every
//! change.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use guardian_core::prelude::*;
use guardian_core::{Contact, ContactId};

/// Read-only view over the user's trusted contacts
pub trait ContactDirectory: Send + Sync {
    /// Current contacts, in the order the user added them
    fn list(&self) -> Vec<Contact>;

    /// Look up a single contact by ID
    fn get(&self, id: &ContactId) -> Option<Contact> {
        self.list().into_iter().find(|c| &c.id == id)
    }
}

/// In-memory contact store with optional JSON persistence
#[derive(Debug, Default)]
pub struct ContactBook {
    contacts: RwLock<Vec<Contact>>,
    path: Option<PathBuf>,
}

impl ContactBook {
    /// Create an empty, memory-only book
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory-only book pre-populated with contacts
    pub fn from_contacts(contacts: Vec<Contact>) -> Self {
        Self {
            contacts: RwLock::new(contacts),
            path: None,
        }
    }

    /// Load a book backed by `path`.
    ///
    /// A missing file yields an empty book. A corrupt file is logged and also
    /// yields an empty book so the user can still raise an alert. Entries that
    /// fail validation are skipped.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let contacts = match read_contacts(&path) {
            Ok(contacts) => contacts,
            Err(_) => {
                warn!("Starting with an empty contact book");
                Vec::new()
            }
        };

        debug!("Loaded {} contacts from {:?}", contacts.len(), path);
        Self {
            contacts: RwLock::new(contacts),
            path: Some(path),
        }
    }

    /// Backing file, if persistent
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Add a new contact, returning it with its generated ID
    pub fn add(&self, name: &str, phone_number: &str) -> Result<Contact> {
        let contact = Contact::new(name, phone_number)?;
        self.write().push(contact.clone());
        self.persist()?;
        info!("Added contact {} ({})", contact.name, contact.id);
        Ok(contact)
    }

    /// Replace an existing contact (matched by ID)
    pub fn update(&self, contact: Contact) -> Result<()> {
        contact.validate()?;
        {
            let mut contacts = self.write();
            let slot = contacts
                .iter_mut()
                .find(|c| c.id == contact.id)
                .ok_or_else(|| Error::ContactNotFound {
                    id: contact.id.clone(),
                })?;
            *slot = contact;
        }
        self.persist()
    }

    /// Remove a contact by ID, returning it
    pub fn remove(&self, id: &ContactId) -> Result<Contact> {
        let removed = {
            let mut contacts = self.write();
            let pos = contacts
                .iter()
                .position(|c| &c.id == id)
                .ok_or_else(|| Error::ContactNotFound { id: id.clone() })?;
            contacts.remove(pos)
        };
        self.persist()?;
        info!("Removed contact {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Write the current contacts to the backing file (no-op when memory-only)
    pub fn save(&self) -> Result<()> {
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json =
            serde_json::to_string_pretty(&*self.read()).context("Failed to encode contacts")?;
        std::fs::write(path, json)
            .map_err(|e| Error::contact_store(path, format!("write failed: {}", e)))
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Contact>> {
        self.contacts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Contact>> {
        self.contacts.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContactDirectory for ContactBook {
    fn list(&self) -> Vec<Contact> {
        self.read().clone()
    }
}

fn read_contacts(path: &Path) -> Result<Vec<Contact>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read contacts from {}", path.display()))?;
    let stored: Vec<Contact> = serde_json::from_str(&content)
        .with_context(|| format!("Corrupt contacts file {}", path.display()))?;

    Ok(stored
        .into_iter()
        .filter(|c| match c.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("Skipping stored contact {}: {}", c.id, e);
                false
            }
        })
        .collect())
}
