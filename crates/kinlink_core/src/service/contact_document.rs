//! One loaded contact document and its write paths.

use crate::document::{compose_document, split_document, MetadataCodec, BOM};
use crate::model::contact::{Contact, ContactHandle};
use crate::model::metadata::Metadata;
use crate::repo::vault::{DocumentStore, VaultError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Structural failure on the document an operation is working on.
#[derive(Debug)]
pub enum SyncError {
    /// Document could not be read.
    Read {
        handle: ContactHandle,
        source: VaultError,
    },
    /// Document could not be written.
    Write {
        handle: ContactHandle,
        source: VaultError,
    },
    /// Metadata block exists but cannot be decoded, so rewriting it would
    /// destroy content.
    MalformedMetadata(ContactHandle),
    /// Metadata could not be encoded back to text.
    Encode {
        handle: ContactHandle,
        message: String,
    },
    /// Caller passed an unusable argument.
    InvalidArgument(String),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { handle, source } => write!(f, "failed to read {handle}: {source}"),
            Self::Write { handle, source } => write!(f, "failed to write {handle}: {source}"),
            Self::MalformedMetadata(handle) => {
                write!(f, "metadata block of {handle} cannot be parsed")
            }
            Self::Encode { handle, message } => write!(f, "{handle}: {message}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Snapshot of a document taken at the start of an operation.
///
/// Both write paths recompose from this snapshot: writing metadata keeps the
/// body bytes, writing the body keeps the raw metadata block.
#[derive(Debug, Clone)]
pub struct ContactDocument {
    handle: ContactHandle,
    frontmatter: Option<String>,
    body: String,
    metadata: Option<Metadata>,
    bom: bool,
}

impl ContactDocument {
    /// Reads and splits one document.
    pub async fn load<S: DocumentStore>(
        store: &S,
        codec: &impl MetadataCodec,
        handle: &ContactHandle,
    ) -> Result<Self, SyncError> {
        let text = store
            .read_document(handle)
            .await
            .map_err(|source| SyncError::Read {
                handle: handle.clone(),
                source,
            })?;
        Ok(Self::from_text(handle.clone(), &text, codec))
    }

    pub fn from_text(handle: ContactHandle, text: &str, codec: &impl MetadataCodec) -> Self {
        let parts = split_document(text);
        let metadata = match parts.frontmatter {
            Some(raw) => codec.decode(raw),
            None => Some(Metadata::new()),
        };
        Self {
            handle,
            frontmatter: parts.frontmatter.map(str::to_string),
            body: parts.body.to_string(),
            metadata,
            bom: parts.bom,
        }
    }

    pub fn handle(&self) -> &ContactHandle {
        &self.handle
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// `None` when the metadata block is malformed.
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Decoded metadata, or `MalformedMetadata` for a write path.
    pub fn require_metadata(&self) -> Result<&Metadata, SyncError> {
        self.metadata
            .as_ref()
            .ok_or_else(|| SyncError::MalformedMetadata(self.handle.clone()))
    }

    /// Contact view; a malformed block reads as empty metadata.
    pub fn contact(&self) -> Contact {
        let empty = Metadata::new();
        Contact::from_metadata(self.handle.clone(), self.metadata.as_ref().unwrap_or(&empty))
    }

    /// Replaces the metadata block in one whole-document write.
    pub async fn write_metadata<S: DocumentStore>(
        &self,
        store: &S,
        codec: &impl MetadataCodec,
        metadata: &Metadata,
    ) -> Result<(), SyncError> {
        self.require_metadata()?;
        let encoded = codec.encode(metadata).map_err(|message| SyncError::Encode {
            handle: self.handle.clone(),
            message,
        })?;
        let text = if metadata.is_empty() && self.frontmatter.is_none() {
            compose_document(None, &self.body)
        } else {
            compose_document(Some(&encoded), &self.body)
        };
        self.write_text(store, &text).await
    }

    /// Replaces the body, keeping the raw metadata block byte-for-byte.
    pub async fn write_body<S: DocumentStore>(
        &self,
        store: &S,
        body: &str,
    ) -> Result<(), SyncError> {
        let text = compose_document(self.frontmatter.as_deref(), body);
        self.write_text(store, &text).await
    }

    async fn write_text<S: DocumentStore>(&self, store: &S, text: &str) -> Result<(), SyncError> {
        let text = if self.bom {
            format!("{BOM}{text}")
        } else {
            text.to_string()
        };
        store
            .write_document(&self.handle, &text)
            .await
            .map_err(|source| SyncError::Write {
                handle: self.handle.clone(),
                source,
            })?;
        store.invalidate(&self.handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ContactDocument;
    use crate::document::YamlMetadataCodec;
    use crate::model::contact::ContactHandle;
    use crate::repo::memory_vault::MemoryVault;

    #[test]
    fn snapshot_exposes_contact_and_body() {
        let document = ContactDocument::from_text(
            ContactHandle::new("Jane.md"),
            "---\nUID: abc\nGENDER: F\n---\n# Jane\n",
            &YamlMetadataCodec,
        );
        assert_eq!(document.body(), "# Jane\n");
        let contact = document.contact();
        assert_eq!(contact.uid.as_deref(), Some("abc"));
        assert_eq!(contact.display_name, "Jane");
    }

    #[tokio::test]
    async fn rewrites_keep_a_leading_bom() {
        let vault = MemoryVault::new();
        vault.insert("Jane.md", "\u{feff}---\nFN: Jane\n---\n# Jane\n");
        let handle = ContactHandle::new("Jane.md");
        let codec = YamlMetadataCodec;

        let document = ContactDocument::load(&vault, &codec, &handle)
            .await
            .expect("document exists");
        document
            .write_body(&vault, "# Jane Doe\n")
            .await
            .expect("body written");
        assert_eq!(
            vault.document("Jane.md").as_deref(),
            Some("\u{feff}---\nFN: Jane\n---\n# Jane Doe\n")
        );

        let document = ContactDocument::load(&vault, &codec, &handle)
            .await
            .expect("document exists");
        let mut metadata = document.require_metadata().expect("decodes").clone();
        metadata.insert_str("UID", "abc");
        document
            .write_metadata(&vault, &codec, &metadata)
            .await
            .expect("metadata written");
        let text = vault.document("Jane.md").expect("document");
        assert!(text.starts_with("\u{feff}---\nFN: Jane\nUID: abc\n---\n"), "{text:?}");
    }

    #[test]
    fn malformed_block_is_flagged() {
        let document = ContactDocument::from_text(
            ContactHandle::new("Bad.md"),
            "---\nFN: [x\n---\nbody",
            &YamlMetadataCodec,
        );
        assert!(document.metadata().is_none());
        assert!(document.require_metadata().is_err());
        assert_eq!(document.contact().display_name, "Bad");
    }
}
