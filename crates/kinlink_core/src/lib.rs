//! Contact relationship graph engine.
//!
//! Keeps the keyed `RELATED[...]` metadata fields and the `Related` body-list
//! of each contact note in agreement, resolves names to UIDs, and maintains
//! reciprocal entries on the other party's note.

pub mod codec;
pub mod config;
pub mod document;
pub mod logging;
pub mod model;
pub mod parser;
pub mod repo;
pub mod service;
pub mod taxonomy;

pub use config::{ConfigError, EngineConfig, CONFIG_FILE_NAME};
pub use document::{MetadataCodec, YamlMetadataCodec};
pub use logging::{
    active_log_settings, default_log_level, init_logging, init_logging_from_config, LogSettings,
    LoggingError,
};
pub use model::contact::{fold_contact_name, Contact, ContactHandle, Gender};
pub use model::metadata::Metadata;
pub use model::relationship::{FrontmatterRelationship, ReferenceTag, Relationship};
pub use parser::{parse_body_relationships, parse_frontmatter_relationships, FrontmatterParse};
pub use repo::fs_vault::FsVault;
pub use repo::memory_vault::MemoryVault;
pub use repo::vault::{ContactIndex, DocumentStore, Vault, VaultError, VaultResult};
pub use service::contact_document::SyncError;
pub use service::reciprocal_service::{
    DocumentReciprocalReport, ReciprocalOutcome, ReciprocalService,
};
pub use service::resolver::{ContactResolver, UidConflict, UidConflictReport, UidMatch};
pub use service::sync_service::{
    ConsistencyIssue, ConsistencyReport, DocumentSyncReport, SyncOutcome, SyncService,
};
pub use service::uid_service::{
    DocumentRewriteReport, EnsureUidOutcome, RewriteReport, UidMapping, UidService, UpgradeReport,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
