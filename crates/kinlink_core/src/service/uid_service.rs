//! UID maintenance over keyed relationship fields.
//!
//! # Responsibility
//! - Upgrade `name:` references to UID references once targets resolve.
//! - Rewrite UID references after a contact's identity changes.
//! - Assign UIDs to contacts that lack one.
//!
//! # Invariants
//! - A UID reference is never downgraded to a name reference.
//! - Only keyed relationship fields (and `UID` for `ensure_uid`) are touched.
//! - One metadata write per document, skipped when nothing changed.

use crate::codec::keyed::{format_keyed_key, format_value, normalize_uid};
use crate::document::{MetadataCodec, YamlMetadataCodec};
use crate::model::contact::{fold_contact_name, ContactHandle};
use crate::model::metadata::{Metadata, FIELD_UID};
use crate::model::relationship::{FrontmatterRelationship, ReferenceTag};
use crate::parser::{normalize_related_keys, parse_body_relationships, parse_frontmatter_relationships};
use crate::repo::vault::{Vault, VaultError, VaultResult};
use crate::service::contact_document::{ContactDocument, SyncError};
use crate::service::resolver::{ContactResolver, UidConflictReport};
use crate::service::sync_service::deduplicate_relationships;
use crate::taxonomy::to_genderless;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Replacement table for bulk rewrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidMapping {
    /// `(old uid, new uid)` pairs.
    Uids(Vec<(String, String)>),
    /// `(display name, uid)` pairs; matched against `name:<display name>`.
    Names(Vec<(String, String)>),
}

impl UidMapping {
    /// Lookup table keyed by raw value and by prefix-stripped value.
    fn lookup(&self) -> HashMap<String, String> {
        let mut table = HashMap::new();
        match self {
            Self::Uids(pairs) => {
                for (old, new) in pairs {
                    table.insert(old.trim().to_string(), new.clone());
                    table.entry(normalize_uid(old)).or_insert_with(|| new.clone());
                }
            }
            Self::Names(pairs) => {
                for (name, uid) in pairs {
                    table.insert(format_value("", name), uid.clone());
                }
            }
        }
        table
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    /// `name:` values rewritten in place.
    pub upgraded: usize,
    /// Keyed entries created for body-list-only relationships.
    pub created: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRewriteReport {
    pub handle: ContactHandle,
    #[serde(flatten)]
    pub report: RewriteReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnsureUidOutcome {
    pub uid: String,
    /// `false` when the contact already had a UID.
    pub assigned: bool,
}

pub struct UidService<'v, V: Vault, C: MetadataCodec = YamlMetadataCodec> {
    vault: &'v V,
    codec: C,
}

impl<'v, V: Vault> UidService<'v, V> {
    pub fn new(vault: &'v V) -> Self {
        Self::with_codec(vault, YamlMetadataCodec)
    }
}

impl<'v, V: Vault, C: MetadataCodec> UidService<'v, V, C> {
    pub fn with_codec(vault: &'v V, codec: C) -> Self {
        Self { vault, codec }
    }

    fn resolver(&self) -> ContactResolver<'v, V> {
        ContactResolver::new(self.vault)
    }

    /// Resolves `name:` references and fills in keyed entries for body-list
    /// relationships that have none.
    pub async fn upgrade_name_references_to_uid(
        &self,
        handle: &ContactHandle,
    ) -> Result<UpgradeReport, SyncError> {
        let document = ContactDocument::load(self.vault, &self.codec, handle).await?;
        let current = document.require_metadata()?;
        let resolver = self.resolver();
        let mut report = UpgradeReport::default();

        let mut next = current.clone();
        let renamed = normalize_related_keys(&mut next);
        let parsed = parse_frontmatter_relationships(&next);
        report.errors.extend(parsed.diagnostics);

        for entry in &parsed.relationships {
            let Some(ReferenceTag::Name(name)) = &entry.reference else {
                continue;
            };
            match resolver.resolve(name).await {
                Some(contact) => match contact.uid.as_deref() {
                    Some(uid) => {
                        next.insert_str(entry.key.as_str(), format_value(uid, name));
                        report.upgraded += 1;
                    }
                    None => report
                        .errors
                        .push(format!("{}: [[{name}]] has no UID yet", entry.key)),
                },
                None => report
                    .errors
                    .push(format!("{}: no contact found for [[{name}]]", entry.key)),
            }
        }

        let listed = deduplicate_relationships(parse_body_relationships(document.body()));
        for relationship in &listed.relationships {
            let kind = to_genderless(&relationship.kind);
            let Some(contact) = resolver.resolve(&relationship.target_name).await else {
                continue;
            };
            let folded = fold_contact_name(&relationship.target_name);
            let covered = parsed.relationships.iter().any(|entry| {
                entry.kind == kind
                    && match &entry.reference {
                        Some(ReferenceTag::Name(name)) => fold_contact_name(name) == folded,
                        Some(reference) => contact.uid.as_deref() == reference.uid(),
                        None => false,
                    }
            });
            if covered {
                continue;
            }
            let Some(uid) = contact.uid.as_deref() else {
                report.errors.push(format!(
                    "[[{}]] has no UID yet; keyed entry not created",
                    relationship.target_name
                ));
                continue;
            };
            let key = first_free_key(&next, &kind);
            next.insert_str(key, format_value(uid, &relationship.target_name));
            report.created += 1;
        }

        if report.upgraded + report.created > 0 || !renamed.is_empty() {
            document.write_metadata(self.vault, &self.codec, &next).await?;
        }
        info!(
            "event=upgrade_names module=uid status=ok handle={handle} upgraded={} created={}",
            report.upgraded, report.created
        );
        Ok(report)
    }

    /// Replaces references to `old_uid` on one document. Returns the number
    /// of rewritten fields.
    pub async fn rewrite_uid(
        &self,
        handle: &ContactHandle,
        old_uid: &str,
        new_uid: &str,
    ) -> Result<usize, SyncError> {
        let new_uid = normalize_uid(new_uid);
        if new_uid.is_empty() {
            return Err(SyncError::InvalidArgument("new UID is empty".to_string()));
        }
        let old_raw = old_uid.trim();
        let old_normalized = normalize_uid(old_uid);

        let document = ContactDocument::load(self.vault, &self.codec, handle).await?;
        let mut next = document.require_metadata()?.clone();
        let renamed = normalize_related_keys(&mut next);
        let parsed = parse_frontmatter_relationships(&next);

        let replacement = format_value(&new_uid, "");
        let mut rewritten = 0;
        for entry in &parsed.relationships {
            let matches = entry.raw_value == old_raw
                || entry
                    .reference
                    .as_ref()
                    .and_then(ReferenceTag::uid)
                    .is_some_and(|uid| uid == old_normalized);
            if matches && entry.raw_value != replacement {
                next.insert_str(entry.key.as_str(), replacement.as_str());
                rewritten += 1;
            }
        }

        if rewritten > 0 || !renamed.is_empty() {
            document.write_metadata(self.vault, &self.codec, &next).await?;
        }
        debug!("event=rewrite_uid module=uid status=ok handle={handle} rewritten={rewritten}");
        Ok(rewritten)
    }

    /// Applies a replacement table to one document.
    ///
    /// Each field is looked up by raw value first, then by its reference's
    /// inner value. An unusable replacement counts as failed and processing
    /// continues with the next field.
    pub async fn bulk_rewrite_uid(
        &self,
        handle: &ContactHandle,
        mapping: &UidMapping,
    ) -> Result<RewriteReport, SyncError> {
        let table = mapping.lookup();
        let document = ContactDocument::load(self.vault, &self.codec, handle).await?;
        let mut next = document.require_metadata()?.clone();
        let renamed = normalize_related_keys(&mut next);
        let parsed = parse_frontmatter_relationships(&next);
        let mut report = RewriteReport::default();

        for entry in &parsed.relationships {
            let Some(new_uid) = lookup_entry(&table, entry) else {
                continue;
            };
            let new_uid = normalize_uid(new_uid);
            if new_uid.is_empty() {
                report.failed += 1;
                report
                    .errors
                    .push(format!("{}: replacement UID is empty", entry.key));
                continue;
            }
            let replacement = format_value(&new_uid, "");
            if replacement != entry.raw_value {
                next.insert_str(entry.key.as_str(), replacement);
                report.updated += 1;
            }
        }

        if report.updated > 0 || !renamed.is_empty() {
            document.write_metadata(self.vault, &self.codec, &next).await?;
        }
        Ok(report)
    }

    /// `bulk_rewrite_uid` over every contact; per-document failures are
    /// reported, not raised.
    pub async fn bulk_rewrite_uid_in_vault(
        &self,
        mapping: &UidMapping,
    ) -> Result<Vec<DocumentRewriteReport>, VaultError> {
        let mut reports = Vec::new();
        for handle in self.vault.all_contact_handles().await? {
            let report = match self.bulk_rewrite_uid(&handle, mapping).await {
                Ok(report) => report,
                Err(err) => RewriteReport {
                    updated: 0,
                    failed: 1,
                    errors: vec![err.to_string()],
                },
            };
            reports.push(DocumentRewriteReport { handle, report });
        }
        let updated: usize = reports.iter().map(|entry| entry.report.updated).sum();
        info!(
            "event=bulk_rewrite module=uid status=ok documents={} updated={updated}",
            reports.len()
        );
        Ok(reports)
    }

    /// Assigns a fresh `urn:uuid:` UID unless the contact already has one.
    pub async fn ensure_uid(&self, handle: &ContactHandle) -> Result<EnsureUidOutcome, SyncError> {
        let document = ContactDocument::load(self.vault, &self.codec, handle).await?;
        if let Some(uid) = document.contact().uid {
            return Ok(EnsureUidOutcome {
                uid,
                assigned: false,
            });
        }
        let uid = Uuid::new_v4().to_string();
        let mut next = document.require_metadata()?.clone();
        next.insert_str(FIELD_UID, format_value(&uid, ""));
        document.write_metadata(self.vault, &self.codec, &next).await?;
        info!("event=ensure_uid module=uid status=assigned handle={handle}");
        Ok(EnsureUidOutcome {
            uid,
            assigned: true,
        })
    }

    pub async fn detect_uid_conflicts(&self) -> VaultResult<UidConflictReport> {
        self.resolver().detect_uid_conflicts().await
    }
}

fn lookup_entry<'t>(table: &'t HashMap<String, String>, entry: &FrontmatterRelationship) -> Option<&'t str> {
    table
        .get(&entry.raw_value)
        .or_else(|| {
            entry
                .reference
                .as_ref()
                .and_then(|reference| table.get(reference.inner()))
        })
        .map(String::as_str)
}

fn first_free_key(metadata: &Metadata, genderless_type: &str) -> String {
    let mut index = 0;
    loop {
        let key = format_keyed_key(genderless_type, index);
        if !metadata.contains_key(&key) {
            return key;
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{first_free_key, UidMapping};
    use crate::model::metadata::Metadata;

    #[test]
    fn free_key_skips_taken_indices() {
        let mut metadata = Metadata::new();
        assert_eq!(first_free_key(&metadata, "friend"), "RELATED[friend]");
        metadata.insert_str("RELATED[friend]", "name:A");
        metadata.insert_str("RELATED[1:friend]", "name:B");
        assert_eq!(first_free_key(&metadata, "friend"), "RELATED[2:friend]");
    }

    #[test]
    fn name_mapping_keys_use_name_scheme() {
        let table = UidMapping::Names(vec![("Bob Doe".to_string(), "u-1".to_string())]).lookup();
        assert_eq!(table.get("name:Bob Doe").map(String::as_str), Some("u-1"));

        let table = UidMapping::Uids(vec![("urn:uuid:old".to_string(), "new".to_string())]).lookup();
        assert_eq!(table.get("urn:uuid:old").map(String::as_str), Some("new"));
        assert_eq!(table.get("old").map(String::as_str), Some("new"));
    }
}
