//! Markdown-directory vault.
//!
//! # Invariants
//! - Handles are `/`-separated paths relative to the vault root; `..`
//!   components and absolute paths are rejected.
//! - Only `*.md` files under the contacts folder count as contacts.
//! - The metadata cache is read-through and dropped per handle on write.

use crate::document::{decode_document_metadata, YamlMetadataCodec};
use crate::model::contact::{fold_contact_name, Contact, ContactHandle};
use crate::model::metadata::Metadata;
use crate::repo::vault::{ContactIndex, DocumentStore, VaultError, VaultResult};
use log::debug;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::fs;

/// Vault over a directory of markdown contact notes.
#[derive(Debug)]
pub struct FsVault {
    root: PathBuf,
    contacts_folder: Option<String>,
    codec: YamlMetadataCodec,
    metadata_cache: Mutex<HashMap<ContactHandle, Option<Metadata>>>,
}

impl FsVault {
    /// Opens a vault rooted at `root`, scanning `contacts_folder` (relative
    /// to the root) or the whole tree when `None`.
    pub fn new(root: impl Into<PathBuf>, contacts_folder: Option<String>) -> Self {
        Self {
            root: root.into(),
            contacts_folder: contacts_folder
                .map(|folder| folder.trim_matches('/').to_string())
                .filter(|folder| !folder.is_empty()),
            codec: YamlMetadataCodec,
            metadata_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a handle to its absolute path.
    pub fn resolve_path(&self, handle: &ContactHandle) -> VaultResult<PathBuf> {
        let relative = Path::new(handle.as_str());
        if handle.as_str().trim().is_empty() {
            return Err(VaultError::InvalidHandle(handle.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(VaultError::InvalidHandle(handle.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<ContactHandle, Option<Metadata>>> {
        self.metadata_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn handle_for(&self, path: &Path) -> Option<ContactHandle> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(ContactHandle::new(parts.join("/")))
    }

    fn io_error(handle: &ContactHandle, source: std::io::Error) -> VaultError {
        if source.kind() == std::io::ErrorKind::NotFound {
            VaultError::NotFound(handle.clone())
        } else {
            VaultError::Io {
                handle: Some(handle.clone()),
                source,
            }
        }
    }
}

impl DocumentStore for FsVault {
    async fn read_document(&self, handle: &ContactHandle) -> VaultResult<String> {
        let path = self.resolve_path(handle)?;
        fs::read_to_string(&path)
            .await
            .map_err(|err| Self::io_error(handle, err))
    }

    async fn write_document(&self, handle: &ContactHandle, text: &str) -> VaultResult<()> {
        let path = self.resolve_path(handle)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| Self::io_error(handle, err))?;
        }
        let result = fs::write(&path, text)
            .await
            .map_err(|err| Self::io_error(handle, err));
        self.invalidate(handle);
        debug!(
            "event=document_write module=fs_vault status={} bytes={}",
            if result.is_ok() { "ok" } else { "error" },
            text.len()
        );
        result
    }

    async fn read_metadata(&self, handle: &ContactHandle) -> VaultResult<Option<Metadata>> {
        if let Some(cached) = self.cache().get(handle) {
            return Ok(cached.clone());
        }
        let text = self.read_document(handle).await?;
        let metadata = decode_document_metadata(&text, &self.codec);
        self.cache().insert(handle.clone(), metadata.clone());
        Ok(metadata)
    }

    fn invalidate(&self, handle: &ContactHandle) {
        self.cache().remove(handle);
    }
}

impl ContactIndex for FsVault {
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
            let metadata = match self.read_metadata(&handle).await {
                Ok(metadata) => metadata.unwrap_or_default(),
                Err(_) => continue,
            };
            let contact = Contact::from_metadata(handle, &metadata);
            if fold_contact_name(&contact.display_name) == wanted {
                return Ok(Some(contact.handle));
            }
        }
        Ok(None)
    }

    async fn all_contact_handles(&self) -> VaultResult<Vec<ContactHandle>> {
        let start = match &self.contacts_folder {
            Some(folder) => self.root.join(folder),
            None => self.root.clone(),
        };

        let mut pending = vec![start];
        let mut handles = Vec::new();
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|source| VaultError::Io {
                handle: None,
                source,
            })?;
            while let Some(entry) = entries.next_entry().await.map_err(|source| VaultError::Io {
                handle: None,
                source,
            })? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|source| VaultError::Io {
                    handle: None,
                    source,
                })?;
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if hidden {
                    continue;
                }
                if file_type.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == "md") {
                    if let Some(handle) = self.handle_for(&path) {
                        handles.push(handle);
                    }
                }
            }
        }

        handles.sort();
        Ok(handles)
    }
}
