//! Vault contracts consumed by the engine.

use crate::model::contact::ContactHandle;
use crate::model::metadata::Metadata;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type VaultResult<T> = Result<T, VaultError>;

/// Storage/index failure reported by a collaborator.
#[derive(Debug)]
pub enum VaultError {
    /// No document exists for the handle.
    NotFound(ContactHandle),
    /// Handle cannot be mapped to a storage location.
    InvalidHandle(String),
    /// Underlying I/O failure.
    Io {
        handle: Option<ContactHandle>,
        source: std::io::Error,
    },
    /// The collaborator refused the write (e.g. read-only document).
    WriteRejected(ContactHandle),
}

impl Display for VaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(handle) => write!(f, "document not found: {handle}"),
            Self::InvalidHandle(value) => write!(f, "invalid document handle: `{value}`"),
            Self::Io {
                handle: Some(handle),
                source,
            } => write!(f, "i/o failure on {handle}: {source}"),
            Self::Io {
                handle: None,
                source,
            } => write!(f, "i/o failure: {source}"),
            Self::WriteRejected(handle) => write!(f, "write rejected for {handle}"),
        }
    }
}

impl Error for VaultError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Whole-document storage with a read-your-writes metadata cache.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// Reads the full document text.
    async fn read_document(&self, handle: &ContactHandle) -> VaultResult<String>;

    /// Replaces the full document text. Must invalidate the metadata cache
    /// entry of `handle`.
    async fn write_document(&self, handle: &ContactHandle, text: &str) -> VaultResult<()>;

    /// Parsed metadata block. `Ok(None)` when the block is malformed; never
    /// an error for malformed input.
    async fn read_metadata(&self, handle: &ContactHandle) -> VaultResult<Option<Metadata>>;

    /// Drops any cached metadata for `handle`.
    fn invalidate(&self, handle: &ContactHandle);
}

/// Vault-wide contact index.
#[allow(async_fn_in_trait)]
pub trait ContactIndex {
    /// Finds the contact whose name matches `name` under
    /// [`fold_contact_name`](crate::model::contact::fold_contact_name).
    async fn find_contact_by_name(&self, name: &str) -> VaultResult<Option<ContactHandle>>;

    /// Every contact document, in a stable order.
    async fn all_contact_handles(&self) -> VaultResult<Vec<ContactHandle>>;
}

/// Full collaborator surface the services depend on.
pub trait Vault: DocumentStore + ContactIndex {}

impl<T: DocumentStore + ContactIndex> Vault for T {}
