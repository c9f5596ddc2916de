//! Two-way sync between the body-list and the keyed metadata fields.
//!
//! # Responsibility
//! - Body-list -> keyed: the body-list is authoritative and replaces every
//!   keyed relationship field.
//! - Keyed -> body-list: entries the body lacks are added and the section is
//!   rewritten in canonical `- type [[Name]]` form.
//! - Report consistency problems without modifying anything.
//!
//! # Invariants
//! - A document without a `Related` section keeps its keyed fields.
//! - A full sync leaves both encodings settled: a second run writes nothing.
//! - A keyed UID no contact claims is listed under its raw identifier and
//!   keeps its keyed value; it is never turned into a `name:` reference.
//! - Keys within one document are unique; indices start at 0 per type.

use crate::codec::body_list::{parse_related_section, render_related_section};
use crate::codec::keyed::{format_keyed_key, format_value, parse_value, ValueWarning};
use crate::config::EngineConfig;
use crate::document::{MetadataCodec, YamlMetadataCodec};
use crate::model::contact::{fold_contact_name, ContactHandle, Gender};
use crate::model::metadata::{Metadata, FIELD_GENDER};
use crate::model::relationship::{FrontmatterRelationship, ReferenceTag, Relationship};
use crate::parser::{parse_body_relationships, parse_frontmatter_relationships};
use crate::repo::vault::{Vault, VaultError};
use crate::service::contact_document::{ContactDocument, SyncError};
use crate::service::resolver::ContactResolver;
use crate::taxonomy::{infer_gender, is_gendered_term, to_genderless, to_gendered, types_equivalent};
use log::{info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Result of one sync direction (or both, for a full sync).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    /// Structural failures and per-entry diagnostics.
    pub errors: Vec<String>,
    /// Entries appended to the body-list.
    pub updated_relationships: Vec<Relationship>,
}

impl SyncOutcome {
    fn failed(err: SyncError) -> Self {
        Self {
            success: false,
            errors: vec![err.to_string()],
            updated_relationships: Vec::new(),
        }
    }
}

/// Per-document line of a vault-wide sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSyncReport {
    pub handle: ContactHandle,
    pub outcome: SyncOutcome,
}

/// Body-list after de-duplication, with the genders its terms imply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupedRelationships {
    pub relationships: Vec<Relationship>,
    /// `(target name, gender)` for every kept gendered term.
    pub gender_hints: Vec<(String, Gender)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    /// Keyed and body-list entry counts differ.
    CountMismatch { keyed: usize, body: usize },
    /// Body-list link whose target has no contact document.
    UnresolvedBodyReference { name: String },
    /// Keyed UID that no contact claims.
    OrphanedKeyedUid { key: String, uid: String },
    /// Metadata block cannot be decoded.
    MalformedMetadata,
}

impl ConsistencyIssue {
    fn recommendation(&self) -> String {
        match self {
            Self::CountMismatch { .. } => {
                "run a full sync to bring both encodings in line".to_string()
            }
            Self::UnresolvedBodyReference { name } => {
                format!("create a contact named `{name}` or correct the link")
            }
            Self::OrphanedKeyedUid { key, uid } => {
                format!("remove `{key}` or rewrite UID `{uid}` to an existing contact")
            }
            Self::MalformedMetadata => "fix the metadata block by hand".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub is_consistent: bool,
    pub issues: Vec<ConsistencyIssue>,
    /// One entry per issue, same order.
    pub recommendations: Vec<String>,
}

/// Display target for a keyed entry appended to the body-list.
struct BodyTarget {
    name: String,
    gender: Gender,
    handle: Option<ContactHandle>,
}

/// Keyed values whose target is only known by identifier, by
/// `(genderless type, folded identifier)`.
type UnclaimedReferences = HashMap<(String, String), String>;

struct BodyRewrite {
    appended: Vec<Relationship>,
    written: bool,
}

pub struct SyncService<'v, V: Vault, C: MetadataCodec = YamlMetadataCodec> {
    vault: &'v V,
    codec: C,
    config: EngineConfig,
}

impl<'v, V: Vault> SyncService<'v, V> {
    pub fn new(vault: &'v V, config: EngineConfig) -> Self {
        Self::with_codec(vault, YamlMetadataCodec, config)
    }
}

impl<'v, V: Vault, C: MetadataCodec> SyncService<'v, V, C> {
    pub fn with_codec(vault: &'v V, codec: C, config: EngineConfig) -> Self {
        Self {
            vault,
            codec,
            config,
        }
    }

    fn resolver(&self) -> ContactResolver<'v, V> {
        ContactResolver::new(self.vault)
    }

    /// Rebuilds every keyed relationship field from the body-list.
    pub async fn sync_body_list_to_frontmatter(&self, handle: &ContactHandle) -> SyncOutcome {
        let mut diagnostics = Vec::new();
        match self.body_to_keyed(handle, &mut diagnostics).await {
            Ok(written) => {
                info!(
                    "event=sync_body_to_keyed module=sync status=ok handle={handle} written={written} diagnostics={}",
                    diagnostics.len()
                );
                SyncOutcome {
                    success: true,
                    errors: diagnostics,
                    updated_relationships: Vec::new(),
                }
            }
            Err(err) => {
                warn!("event=sync_body_to_keyed module=sync status=error handle={handle} error={err}");
                let mut outcome = SyncOutcome::failed(err);
                outcome.errors.extend(diagnostics);
                outcome
            }
        }
    }

    /// Adds keyed relationships missing from the body-list and writes the
    /// section back in canonical form.
    pub async fn sync_frontmatter_to_body_list(&self, handle: &ContactHandle) -> SyncOutcome {
        self.frontmatter_to_body_list(handle).await.0
    }

    /// Body-list -> keyed, then keyed -> body-list.
    ///
    /// When the second step rewrote the body-list, keys are rebuilt once more
    /// from the result, so the next run finds nothing to change. Stops after
    /// the first direction when it fails structurally.
    pub async fn perform_full_sync(&self, handle: &ContactHandle) -> SyncOutcome {
        let mut outcome = self.sync_body_list_to_frontmatter(handle).await;
        if !outcome.success {
            return outcome;
        }
        let (second, body_written) = self.frontmatter_to_body_list(handle).await;
        outcome.success = second.success;
        merge_diagnostics(&mut outcome.errors, second.errors);
        outcome.updated_relationships = second.updated_relationships;

        if outcome.success && body_written {
            let settle = self.sync_body_list_to_frontmatter(handle).await;
            outcome.success = settle.success;
            merge_diagnostics(&mut outcome.errors, settle.errors);
        }
        outcome
    }

    async fn frontmatter_to_body_list(&self, handle: &ContactHandle) -> (SyncOutcome, bool) {
        let mut diagnostics = Vec::new();
        match self.keyed_to_body(handle, &mut diagnostics).await {
            Ok(rewrite) => {
                info!(
                    "event=sync_keyed_to_body module=sync status=ok handle={handle} appended={} written={} diagnostics={}",
                    rewrite.appended.len(),
                    rewrite.written,
                    diagnostics.len()
                );
                let outcome = SyncOutcome {
                    success: true,
                    errors: diagnostics,
                    updated_relationships: rewrite.appended,
                };
                (outcome, rewrite.written)
            }
            Err(err) => {
                warn!("event=sync_keyed_to_body module=sync status=error handle={handle} error={err}");
                let mut outcome = SyncOutcome::failed(err);
                outcome.errors.extend(diagnostics);
                (outcome, false)
            }
        }
    }

    /// Full sync over every contact in enumeration order.
    pub async fn sync_all(&self) -> Result<Vec<DocumentSyncReport>, VaultError> {
        let handles = self.vault.all_contact_handles().await?;
        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            let outcome = self.perform_full_sync(&handle).await;
            reports.push(DocumentSyncReport { handle, outcome });
        }
        let failed = reports.iter().filter(|report| !report.outcome.success).count();
        info!(
            "event=sync_all module=sync status=ok documents={} failed={failed}",
            reports.len()
        );
        Ok(reports)
    }

    /// Read-only comparison of the two encodings.
    pub async fn validate_relationship_consistency(
        &self,
        handle: &ContactHandle,
    ) -> Result<ConsistencyReport, SyncError> {
        let document = ContactDocument::load(self.vault, &self.codec, handle).await?;
        let resolver = self.resolver();
        let mut issues = Vec::new();

        let keyed = match document.metadata() {
            Some(metadata) => parse_frontmatter_relationships(metadata).relationships,
            None => {
                issues.push(ConsistencyIssue::MalformedMetadata);
                Vec::new()
            }
        };
        let body = deduplicate_relationships(parse_body_relationships(document.body())).relationships;

        if keyed.len() != body.len() {
            issues.push(ConsistencyIssue::CountMismatch {
                keyed: keyed.len(),
                body: body.len(),
            });
        }
        for relationship in &body {
            if resolver.find_by_name(&relationship.target_name).await.is_none() {
                issues.push(ConsistencyIssue::UnresolvedBodyReference {
                    name: relationship.target_name.clone(),
                });
            }
        }
        for entry in &keyed {
            let Some(uid) = entry.reference.as_ref().and_then(ReferenceTag::uid) else {
                continue;
            };
            if resolver.find_by_uid(uid).await.is_none() {
                issues.push(ConsistencyIssue::OrphanedKeyedUid {
                    key: entry.key.clone(),
                    uid: uid.to_string(),
                });
            }
        }

        let recommendations = issues.iter().map(ConsistencyIssue::recommendation).collect();
        Ok(ConsistencyReport {
            is_consistent: issues.is_empty(),
            issues,
            recommendations,
        })
    }

    /// Returns whether the document was written.
    async fn body_to_keyed(
        &self,
        handle: &ContactHandle,
        diagnostics: &mut Vec<String>,
    ) -> Result<bool, SyncError> {
        let document = ContactDocument::load(self.vault, &self.codec, handle).await?;
        let Some(listed) = parse_related_section(document.body()) else {
            return Ok(false);
        };
        let current = document.require_metadata()?;

        let deduped = deduplicate_relationships(listed);
        let mut ordered = deduped.relationships.clone();
        ordered.sort_by_cached_key(|relationship| {
            (
                to_genderless(&relationship.kind),
                fold_contact_name(&relationship.target_name),
            )
        });

        let unclaimed = unclaimed_references(current);
        let entries = self.build_keyed_entries(&ordered, &unclaimed, diagnostics).await;
        let mut next = current.clone();
        for key in next.related_keys() {
            next.remove(&key);
        }
        for (key, value) in &entries {
            next.insert_str(key.as_str(), value.as_str());
        }

        let written = if same_related_fields(current, &next) {
            false
        } else {
            document.write_metadata(self.vault, &self.codec, &next).await?;
            true
        };

        if self.config.infer_gender {
            self.record_gender_hints(&deduped.gender_hints, diagnostics).await;
        }
        Ok(written)
    }

    async fn build_keyed_entries(
        &self,
        ordered: &[Relationship],
        unclaimed: &UnclaimedReferences,
        diagnostics: &mut Vec<String>,
    ) -> Vec<(String, String)> {
        let resolver = self.resolver();
        let mut entries = Vec::with_capacity(ordered.len());
        let mut allocated: HashSet<String> = HashSet::new();
        let mut next_index: HashMap<String, u32> = HashMap::new();
        let mut written: HashSet<(String, String)> = HashSet::new();

        for relationship in ordered {
            let kind = to_genderless(&relationship.kind);
            if kind.contains(['[', ']', ':']) {
                diagnostics.push(format!(
                    "relationship type `{}` cannot be stored as a field key",
                    relationship.kind
                ));
                continue;
            }
            let value = match resolver.resolve(&relationship.target_name).await {
                Some(contact) => format_value(contact.uid_or_empty(), &relationship.target_name),
                None => {
                    let identity = (kind.clone(), fold_contact_name(&relationship.target_name));
                    match unclaimed.get(&identity) {
                        Some(raw) => {
                            diagnostics.push(format!(
                                "no contact found for [[{}]]; kept `{raw}`",
                                relationship.target_name
                            ));
                            raw.clone()
                        }
                        None => {
                            diagnostics.push(format!(
                                "no contact found for [[{}]]; stored as a name reference",
                                relationship.target_name
                            ));
                            format_value("", &relationship.target_name)
                        }
                    }
                }
            };
            if !written.insert((kind.clone(), value.clone())) {
                continue;
            }

            let counter = next_index.entry(kind.clone()).or_insert(0);
            let key = loop {
                let candidate = format_keyed_key(&kind, *counter);
                *counter += 1;
                if allocated.insert(candidate.clone()) {
                    break candidate;
                }
            };
            entries.push((key, value));
        }
        entries
    }

    /// Writes inferred genders onto targets that do not record one yet.
    async fn record_gender_hints(&self, hints: &[(String, Gender)], diagnostics: &mut Vec<String>) {
        let resolver = self.resolver();
        for (name, gender) in hints {
            let Some(target) = resolver.resolve(name).await else {
                continue;
            };
            if target.gender != Gender::Unknown {
                continue;
            }
            let Some(field) = gender.as_field() else {
                continue;
            };
            if let Err(err) = self.write_gender(&target.handle, field).await {
                diagnostics.push(format!("could not record gender for [[{name}]]: {err}"));
            }
        }
    }

    async fn write_gender(&self, handle: &ContactHandle, field: &str) -> Result<(), SyncError> {
        let document = ContactDocument::load(self.vault, &self.codec, handle).await?;
        let mut metadata = document.require_metadata()?.clone();
        metadata.insert_str(FIELD_GENDER, field);
        document.write_metadata(self.vault, &self.codec, &metadata).await
    }

    async fn keyed_to_body(
        &self,
        handle: &ContactHandle,
        diagnostics: &mut Vec<String>,
    ) -> Result<BodyRewrite, SyncError> {
        let document = ContactDocument::load(self.vault, &self.codec, handle).await?;
        let metadata = match document.metadata() {
            Some(metadata) => metadata.clone(),
            None => {
                diagnostics.push("metadata block cannot be parsed; treated as empty".to_string());
                Metadata::new()
            }
        };
        let parsed = parse_frontmatter_relationships(&metadata);
        diagnostics.extend(parsed.diagnostics);

        let resolver = self.resolver();
        let listed = parse_related_section(document.body());
        let has_section = listed.is_some();
        let mut merged = listed.unwrap_or_default();
        let mut merged_handles = Vec::with_capacity(merged.len());
        for existing in &merged {
            merged_handles.push(resolver.find_by_name(&existing.target_name).await);
        }

        let mut appended = Vec::new();
        for entry in &parsed.relationships {
            if entry.reference.is_none()
                && matches!(parse_value(&entry.raw_value), Err(ValueWarning::Empty))
            {
                continue;
            }
            let target = self.body_target(entry, diagnostics).await;
            let kind = to_gendered(&entry.kind, target.gender);
            let folded = fold_contact_name(&target.name);
            // A link may name the target by FN while the keyed UID resolves
            // to the file stem; both point at the same handle.
            let present = merged.iter().zip(&merged_handles).any(|(existing, handle)| {
                types_equivalent(&existing.kind, &kind)
                    && (fold_contact_name(&existing.target_name) == folded
                        || (target.handle.is_some() && *handle == target.handle))
            });
            if present {
                continue;
            }
            let relationship = Relationship::new(kind, target.name);
            merged.push(relationship.clone());
            merged_handles.push(target.handle);
            appended.push(relationship);
        }

        if appended.is_empty() && !has_section {
            return Ok(BodyRewrite {
                appended,
                written: false,
            });
        }
        let body = render_related_section(
            document.body(),
            &merged,
            self.config.related_heading_level,
        );
        let written = body != document.body();
        if written {
            document.write_body(self.vault, &body).await?;
        }
        Ok(BodyRewrite { appended, written })
    }

    async fn body_target(
        &self,
        entry: &FrontmatterRelationship,
        diagnostics: &mut Vec<String>,
    ) -> BodyTarget {
        let resolver = self.resolver();
        let uid = match &entry.reference {
            Some(ReferenceTag::Name(name)) => {
                let contact = resolver.resolve(name).await;
                return BodyTarget {
                    name: name.clone(),
                    gender: contact.as_ref().map_or(Gender::Unknown, |found| found.gender),
                    handle: contact.map(|found| found.handle),
                };
            }
            Some(ReferenceTag::Uuid(uid)) | Some(ReferenceTag::Uid(uid)) => uid.as_str(),
            None => entry.raw_value.as_str(),
        };
        match resolver.resolve_uid(uid).await {
            Some(contact) => BodyTarget {
                name: contact.link_name().to_string(),
                gender: contact.gender,
                handle: Some(contact.handle),
            },
            None => {
                diagnostics.push(format!(
                    "{}: no contact claims `{uid}`; listed by its identifier",
                    entry.key
                ));
                BodyTarget {
                    name: uid.to_string(),
                    gender: Gender::Unknown,
                    handle: None,
                }
            }
        }
    }
}

/// Collapses entries naming the same target with equivalent types.
///
/// The first occurrence keeps its position; a later gendered term replaces
/// an earlier genderless one (`parent` then `father` keeps `father`).
pub fn deduplicate_relationships(listed: Vec<Relationship>) -> DedupedRelationships {
    let mut kept: Vec<Relationship> = Vec::with_capacity(listed.len());
    let mut positions: HashMap<(String, String), usize> = HashMap::new();

    for relationship in listed {
        let identity = (
            to_genderless(&relationship.kind),
            fold_contact_name(&relationship.target_name),
        );
        match positions.get(&identity) {
            Some(&position) => {
                if is_gendered_term(&relationship.kind) && !is_gendered_term(&kept[position].kind) {
                    kept[position] = relationship;
                }
            }
            None => {
                positions.insert(identity, kept.len());
                kept.push(relationship);
            }
        }
    }

    let gender_hints = kept
        .iter()
        .filter_map(|relationship| {
            let gender = infer_gender(&relationship.kind);
            gender
                .is_binary()
                .then(|| (relationship.target_name.clone(), gender))
        })
        .collect();
    DedupedRelationships {
        relationships: kept,
        gender_hints,
    }
}

/// Keyed values that carry a UID or a legacy raw value, by the identifier a
/// body-list entry would show for them.
fn unclaimed_references(metadata: &Metadata) -> UnclaimedReferences {
    parse_frontmatter_relationships(metadata)
        .relationships
        .into_iter()
        .filter_map(|entry| {
            let identifier = match &entry.reference {
                Some(ReferenceTag::Name(_)) => return None,
                Some(tag) => tag.inner().to_string(),
                None => entry.raw_value.clone(),
            };
            Some(((entry.kind, fold_contact_name(&identifier)), entry.raw_value))
        })
        .collect()
}

fn merge_diagnostics(into: &mut Vec<String>, more: Vec<String>) {
    for diagnostic in more {
        if !into.contains(&diagnostic) {
            into.push(diagnostic);
        }
    }
}

fn same_related_fields(left: &Metadata, right: &Metadata) -> bool {
    let left = left.related_fields();
    let right = right.related_fields();
    left.len() == right.len() && left.iter().all(|field| right.contains(field))
}

#[cfg(test)]
mod tests {
    use super::{deduplicate_relationships, same_related_fields};
    use crate::model::contact::Gender;
    use crate::model::metadata::Metadata;
    use crate::model::relationship::Relationship;

    #[test]
    fn dedupe_prefers_gendered_term_in_first_position() {
        let deduped = deduplicate_relationships(vec![
            Relationship::new("parent", "Bob"),
            Relationship::new("friend", "Ann"),
            Relationship::new("father", "bob"),
        ]);
        assert_eq!(
            deduped.relationships,
            vec![Relationship::new("father", "bob"), Relationship::new("friend", "Ann")]
        );
        assert_eq!(deduped.gender_hints, vec![("bob".to_string(), Gender::Male)]);
    }

    #[test]
    fn dedupe_keeps_first_of_two_genderless_duplicates() {
        let deduped = deduplicate_relationships(vec![
            Relationship::new("friend", "Ann Lee"),
            Relationship::new("Friend", "ann-lee"),
        ]);
        assert_eq!(deduped.relationships, vec![Relationship::new("friend", "Ann Lee")]);
        assert!(deduped.gender_hints.is_empty());
    }

    #[test]
    fn related_field_comparison_ignores_order_and_other_fields() {
        let mut left = Metadata::new();
        left.insert_str("FN", "Jane");
        left.insert_str("RELATED[parent]", "uid:a");
        left.insert_str("RELATED[friend]", "name:Ann");
        let mut right = Metadata::new();
        right.insert_str("RELATED[friend]", "name:Ann");
        right.insert_str("RELATED[parent]", "uid:a");
        assert!(same_related_fields(&left, &right));

        right.insert_str("RELATED[1:friend]", "name:Bo");
        assert!(!same_related_fields(&left, &right));
    }
}
