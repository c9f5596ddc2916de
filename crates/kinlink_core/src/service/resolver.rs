//! Contact lookup by name and by UID.
//!
//! # Responsibility
//! - Turn wiki-link names and keyed UIDs into contact handles.
//! - Report UIDs claimed by more than one contact.
//!
//! # Invariants
//! - UIDs are compared prefix-stripped; `urn:uuid:x`, `uid:x` and `x` match.
//! - With duplicate UIDs, the first contact in enumeration order wins.
//! - Lookup failures degrade to "not found" and are logged, never raised.

use crate::codec::keyed::normalize_uid;
use crate::model::contact::{Contact, ContactHandle};
use crate::model::metadata::{Metadata, FIELD_UID};
use crate::repo::vault::{Vault, VaultResult};
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// Contact matched by UID, with the metadata it was matched on.
#[derive(Debug, Clone, PartialEq)]
pub struct UidMatch {
    pub handle: ContactHandle,
    pub metadata: Metadata,
}

/// One UID claimed by several contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UidConflict {
    pub uid: String,
    pub files: Vec<ContactHandle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UidConflictReport {
    pub has_conflicts: bool,
    pub conflicts: Vec<UidConflict>,
}

/// Resolves names and UIDs against one vault.
pub struct ContactResolver<'v, V: Vault> {
    vault: &'v V,
}

impl<'v, V: Vault> ContactResolver<'v, V> {
    pub fn new(vault: &'v V) -> Self {
        Self { vault }
    }

    /// Handle of the contact a wiki-link name points at.
    pub async fn find_by_name(&self, name: &str) -> Option<ContactHandle> {
        let target = name.split('|').next().unwrap_or(name).trim();
        if target.is_empty() {
            return None;
        }
        match self.vault.find_contact_by_name(target).await {
            Ok(found) => found,
            Err(err) => {
                warn!("event=resolve_name module=resolver status=error name={target} error={err}");
                None
            }
        }
    }

    /// Loads a contact view for a known handle.
    pub async fn load_contact(&self, handle: &ContactHandle) -> VaultResult<Contact> {
        let metadata = self.vault.read_metadata(handle).await?.unwrap_or_default();
        Ok(Contact::from_metadata(handle.clone(), &metadata))
    }

    /// Resolves a wiki-link name to a contact.
    pub async fn resolve(&self, name: &str) -> Option<Contact> {
        let handle = self.find_by_name(name).await?;
        match self.load_contact(&handle).await {
            Ok(contact) => Some(contact),
            Err(err) => {
                warn!("event=resolve_name module=resolver status=error handle={handle} error={err}");
                None
            }
        }
    }

    /// First contact whose `UID` field matches `uid`.
    pub async fn find_by_uid(&self, uid: &str) -> Option<UidMatch> {
        let wanted = normalize_uid(uid);
        if wanted.is_empty() {
            return None;
        }
        let handles = match self.vault.all_contact_handles().await {
            Ok(handles) => handles,
            Err(err) => {
                warn!("event=resolve_uid module=resolver status=error error={err}");
                return None;
            }
        };
        for handle in handles {
            let Ok(Some(metadata)) = self.vault.read_metadata(&handle).await else {
                continue;
            };
            if claimed_uid(&metadata).as_deref() == Some(wanted.as_str()) {
                return Some(UidMatch { handle, metadata });
            }
        }
        debug!("event=resolve_uid module=resolver status=not_found uid={wanted}");
        None
    }

    /// Contact view for the first contact claiming `uid`.
    pub async fn resolve_uid(&self, uid: &str) -> Option<Contact> {
        self.find_by_uid(uid)
            .await
            .map(|found| Contact::from_metadata(found.handle, &found.metadata))
    }

    /// Groups contacts by claimed UID and keeps groups larger than one.
    pub async fn detect_uid_conflicts(&self) -> VaultResult<UidConflictReport> {
        let mut claims: BTreeMap<String, Vec<ContactHandle>> = BTreeMap::new();
        for handle in self.vault.all_contact_handles().await? {
            let Ok(Some(metadata)) = self.vault.read_metadata(&handle).await else {
                continue;
            };
            if let Some(uid) = claimed_uid(&metadata) {
                claims.entry(uid).or_default().push(handle);
            }
        }

        let conflicts: Vec<UidConflict> = claims
            .into_iter()
            .filter(|(_, files)| files.len() > 1)
            .map(|(uid, files)| UidConflict { uid, files })
            .collect();
        if !conflicts.is_empty() {
            warn!(
                "event=uid_conflicts module=resolver status=found count={}",
                conflicts.len()
            );
        }
        Ok(UidConflictReport {
            has_conflicts: !conflicts.is_empty(),
            conflicts,
        })
    }
}

fn claimed_uid(metadata: &Metadata) -> Option<String> {
    metadata
        .get_text(FIELD_UID)
        .map(|value| normalize_uid(&value))
        .filter(|value| !value.is_empty())
}
