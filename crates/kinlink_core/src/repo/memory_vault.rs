//! In-memory vault.
//!
//! Keeps documents in insertion order and records every successful write,
//! which makes write-count assertions (idempotence) straightforward.

use crate::document::{decode_document_metadata, YamlMetadataCodec};
use crate::model::contact::{fold_contact_name, Contact, ContactHandle};
use crate::model::metadata::Metadata;
use crate::repo::vault::{ContactIndex, DocumentStore, VaultError, VaultResult};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    documents: IndexMap<ContactHandle, String>,
    metadata_cache: HashMap<ContactHandle, Option<Metadata>>,
    read_only: HashSet<ContactHandle>,
    write_log: Vec<ContactHandle>,
}

/// Document map implementing both collaborator contracts.
#[derive(Debug, Default)]
pub struct MemoryVault {
    state: Mutex<MemoryState>,
    codec: YamlMetadataCodec,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds or replaces a document without recording a write.
    pub fn insert(&self, handle: impl Into<ContactHandle>, text: impl Into<String>) {
        let handle = handle.into();
        let mut state = self.lock();
        state.metadata_cache.remove(&handle);
        state.documents.insert(handle, text.into());
    }

    /// Current text of a document.
    pub fn document(&self, handle: impl Into<ContactHandle>) -> Option<String> {
        self.lock().documents.get(&handle.into()).cloned()
    }

    /// Makes subsequent writes to `handle` fail with `WriteRejected`.
    pub fn set_read_only(&self, handle: impl Into<ContactHandle>) {
        self.lock().read_only.insert(handle.into());
    }

    /// Handles written so far, in write order.
    pub fn write_log(&self) -> Vec<ContactHandle> {
        self.lock().write_log.clone()
    }

    pub fn clear_write_log(&self) {
        self.lock().write_log.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cached_metadata(&self, handle: &ContactHandle) -> VaultResult<Option<Metadata>> {
        let mut state = self.lock();
        if let Some(cached) = state.metadata_cache.get(handle) {
            return Ok(cached.clone());
        }
        let text = state
            .documents
            .get(handle)
            .ok_or_else(|| VaultError::NotFound(handle.clone()))?;
        let metadata = decode_document_metadata(text, &self.codec);
        state
            .metadata_cache
            .insert(handle.clone(), metadata.clone());
        Ok(metadata)
    }
}

impl DocumentStore for MemoryVault {
    async fn read_document(&self, handle: &ContactHandle) -> VaultResult<String> {
        self.lock()
            .documents
            .get(handle)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(handle.clone()))
    }

    async fn write_document(&self, handle: &ContactHandle, text: &str) -> VaultResult<()> {
        {
            let mut state = self.lock();
            if state.read_only.contains(handle) {
                return Err(VaultError::WriteRejected(handle.clone()));
            }
            state.documents.insert(handle.clone(), text.to_string());
            state.write_log.push(handle.clone());
        }
        self.invalidate(handle);
        Ok(())
    }

    async fn read_metadata(&self, handle: &ContactHandle) -> VaultResult<Option<Metadata>> {
        self.cached_metadata(handle)
    }

    fn invalidate(&self, handle: &ContactHandle) {
        self.lock().metadata_cache.remove(handle);
    }
}

impl ContactIndex for MemoryVault {
    async fn find_contact_by_name(&self, name: &str) -> VaultResult<Option<ContactHandle>> {
        let wanted = fold_contact_name(name);
        if wanted.is_empty() {
            return Ok(None);
        }

        let handles = self.all_contact_handles().await?;
        if let Some(handle) = handles
            .iter()
            .find(|handle| fold_contact_name(handle.link_name()) == wanted)
        {
            return Ok(Some(handle.clone()));
        }
        for handle in handles {
            let metadata = self.cached_metadata(&handle)?.unwrap_or_default();
            let contact = Contact::from_metadata(handle, &metadata);
            if fold_contact_name(&contact.display_name) == wanted {
                return Ok(Some(contact.handle));
            }
        }
        Ok(None)
    }

    async fn all_contact_handles(&self) -> VaultResult<Vec<ContactHandle>> {
        Ok(self.lock().documents.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryVault;
    use crate::model::contact::ContactHandle;
    use crate::repo::vault::{ContactIndex, DocumentStore, VaultError};

    #[tokio::test]
    async fn metadata_reflects_writes_immediately() {
        let vault = MemoryVault::new();
        let handle = ContactHandle::new("Jane.md");
        vault.insert("Jane.md", "---\nUID: a\n---\n");

        let before = vault.read_metadata(&handle).await.unwrap().unwrap();
        assert_eq!(before.get_str("UID"), Some("a"));

        vault
            .write_document(&handle, "---\nUID: b\n---\n")
            .await
            .unwrap();
        let after = vault.read_metadata(&handle).await.unwrap().unwrap();
        assert_eq!(after.get_str("UID"), Some("b"));
        assert_eq!(vault.write_log(), vec![handle]);
    }

    #[tokio::test]
    async fn malformed_metadata_reads_as_none() {
        let vault = MemoryVault::new();
        vault.insert("Bad.md", "---\nFN: [oops\n---\n");
        let metadata = vault
            .read_metadata(&ContactHandle::new("Bad.md"))
            .await
            .unwrap();
        assert_eq!(metadata, None);
    }

    #[tokio::test]
    async fn finds_by_folded_stem_or_display_name() {
        let vault = MemoryVault::new();
        vault.insert("People/John Doe.md", "# John\n");
        vault.insert("People/jd.md", "---\nFN: Jane Dee\n---\n");

        let by_stem = vault.find_contact_by_name("john-doe").await.unwrap();
        assert_eq!(by_stem, Some(ContactHandle::new("People/John Doe.md")));
        let by_fn = vault.find_contact_by_name("JANE DEE").await.unwrap();
        assert_eq!(by_fn, Some(ContactHandle::new("People/jd.md")));
        assert_eq!(vault.find_contact_by_name("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_only_documents_reject_writes() {
        let vault = MemoryVault::new();
        vault.insert("Locked.md", "text");
        vault.set_read_only("Locked.md");
        let err = vault
            .write_document(&ContactHandle::new("Locked.md"), "new")
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::WriteRejected(_)));
        assert_eq!(vault.document("Locked.md").as_deref(), Some("text"));
    }
}
