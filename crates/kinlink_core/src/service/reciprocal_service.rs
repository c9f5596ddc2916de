//! Reciprocal relationship maintenance.
//!
//! # Responsibility
//! - For every outbound relationship of a source contact, add the implied
//!   inverse entry to the target's body-list when it is missing.
//!
//! # Invariants
//! - Strictly additive: existing lines on the target are never rewritten.
//! - Each target document is written at most once per call.
//! - Re-running after a successful run adds nothing.

use crate::codec::body_list::append_to_related_section;
use crate::config::EngineConfig;
use crate::document::{MetadataCodec, YamlMetadataCodec};
use crate::model::contact::{fold_contact_name, Contact, ContactHandle};
use crate::model::relationship::{ReferenceTag, Relationship};
use crate::parser::{parse_body_relationships, parse_frontmatter_relationships};
use crate::repo::vault::{Vault, VaultError};
use crate::service::contact_document::{ContactDocument, SyncError};
use crate::service::resolver::ContactResolver;
use crate::taxonomy::{reciprocal_type, to_genderless, types_equivalent};
use indexmap::IndexMap;
use log::{info, warn};
use serde::Serialize;

pub const REASON_TARGET_NOT_FOUND: &str = "target contact not found";
pub const REASON_SELF_REFERENCE: &str = "relationship targets the source contact itself";
pub const REASON_NO_RECIPROCAL: &str = "no reciprocal relationship type available";
pub const REASON_ALREADY_EXISTS: &str = "relationship already exists";

/// What happened to one outbound relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReciprocalOutcome {
    /// Target as referenced by the source (name or UID).
    pub target_contact: String,
    pub reverse_type: Option<String>,
    pub added: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReciprocalOutcome {
    fn skipped(target_contact: String, reverse_type: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            target_contact,
            reverse_type,
            added: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReciprocalReport {
    pub handle: ContactHandle,
    pub success: bool,
    pub errors: Vec<String>,
    pub outcomes: Vec<ReciprocalOutcome>,
}

/// One relationship leaving the source, with its resolved target.
#[derive(Debug, Clone)]
struct OutboundEdge {
    kind: String,
    label: String,
    target: Option<ContactHandle>,
}

/// Target document with the entries queued for it in this run.
struct PendingTarget {
    document: ContactDocument,
    existing: Vec<Relationship>,
    additions: Vec<Relationship>,
    outcome_indices: Vec<usize>,
}

pub struct ReciprocalService<'v, V: Vault, C: MetadataCodec = YamlMetadataCodec> {
    vault: &'v V,
    codec: C,
    config: EngineConfig,
}

impl<'v, V: Vault> ReciprocalService<'v, V> {
    pub fn new(vault: &'v V, config: EngineConfig) -> Self {
        Self::with_codec(vault, YamlMetadataCodec, config)
    }
}

impl<'v, V: Vault, C: MetadataCodec> ReciprocalService<'v, V, C> {
    pub fn with_codec(vault: &'v V, codec: C, config: EngineConfig) -> Self {
        Self {
            vault,
            codec,
            config,
        }
    }

    /// Adds missing inverse entries for every outbound relationship of
    /// `handle`. Fails only when the source itself cannot be read.
    pub async fn process_reciprocal_relationships(
        &self,
        handle: &ContactHandle,
    ) -> Result<Vec<ReciprocalOutcome>, SyncError> {
        let source_document = ContactDocument::load(self.vault, &self.codec, handle).await?;
        let source = source_document.contact();
        let edges = self.outbound_edges(&source_document).await;

        let mut outcomes = Vec::with_capacity(edges.len());
        let mut pending: IndexMap<ContactHandle, PendingTarget> = IndexMap::new();

        for edge in edges {
            let Some(target) = edge.target else {
                outcomes.push(ReciprocalOutcome::skipped(edge.label, None, REASON_TARGET_NOT_FOUND));
                continue;
            };
            if target == source.handle {
                outcomes.push(ReciprocalOutcome::skipped(edge.label, None, REASON_SELF_REFERENCE));
                continue;
            }
            let Some(reverse) = reciprocal_type(&edge.kind, source.gender) else {
                outcomes.push(ReciprocalOutcome::skipped(edge.label, None, REASON_NO_RECIPROCAL));
                continue;
            };

            if !pending.contains_key(&target) {
                match ContactDocument::load(self.vault, &self.codec, &target).await {
                    Ok(document) => {
                        let existing = parse_body_relationships(document.body());
                        pending.insert(
                            target.clone(),
                            PendingTarget {
                                document,
                                existing,
                                additions: Vec::new(),
                                outcome_indices: Vec::new(),
                            },
                        );
                    }
                    Err(err) => {
                        outcomes.push(ReciprocalOutcome::skipped(
                            edge.label,
                            Some(reverse),
                            err.to_string(),
                        ));
                        continue;
                    }
                }
            }
            let Some(slot) = pending.get_mut(&target) else {
                continue;
            };

            let already = slot
                .existing
                .iter()
                .chain(slot.additions.iter())
                .any(|entry| names_source(entry, &source) && types_equivalent(&entry.kind, &reverse));
            if already {
                outcomes.push(ReciprocalOutcome::skipped(
                    edge.label,
                    Some(reverse),
                    REASON_ALREADY_EXISTS,
                ));
                continue;
            }

            slot.additions
                .push(Relationship::new(reverse.clone(), source.link_name()));
            slot.outcome_indices.push(outcomes.len());
            outcomes.push(ReciprocalOutcome {
                target_contact: edge.label,
                reverse_type: Some(reverse),
                added: true,
                reason: None,
            });
        }

        for (target, slot) in pending {
            if slot.additions.is_empty() {
                continue;
            }
            let body = append_to_related_section(
                slot.document.body(),
                &slot.additions,
                self.config.related_heading_level,
            );
            if let Err(err) = slot.document.write_body(self.vault, &body).await {
                warn!("event=reciprocal_write module=reciprocal status=error target={target} error={err}");
                for index in slot.outcome_indices {
                    outcomes[index].added = false;
                    outcomes[index].reason = Some(err.to_string());
                }
            }
        }

        info!(
            "event=reciprocal module=reciprocal status=ok handle={handle} edges={} added={}",
            outcomes.len(),
            outcomes.iter().filter(|outcome| outcome.added).count()
        );
        Ok(outcomes)
    }

    /// Runs reciprocal processing for every contact in enumeration order.
    pub async fn process_all_reciprocal_relationships(
        &self,
    ) -> Result<Vec<DocumentReciprocalReport>, VaultError> {
        let handles = self.vault.all_contact_handles().await?;
        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            let report = match self.process_reciprocal_relationships(&handle).await {
                Ok(outcomes) => DocumentReciprocalReport {
                    handle,
                    success: true,
                    errors: Vec::new(),
                    outcomes,
                },
                Err(err) => DocumentReciprocalReport {
                    handle,
                    success: false,
                    errors: vec![err.to_string()],
                    outcomes: Vec::new(),
                },
            };
            reports.push(report);
        }
        Ok(reports)
    }

    /// Keyed entries first, then body-list entries; one edge per
    /// (genderless type, target).
    async fn outbound_edges(&self, document: &ContactDocument) -> Vec<OutboundEdge> {
        let resolver = ContactResolver::new(self.vault);
        let mut edges: Vec<OutboundEdge> = Vec::new();

        if let Some(metadata) = document.metadata() {
            for entry in parse_frontmatter_relationships(metadata).relationships {
                let (label, target) = match &entry.reference {
                    Some(ReferenceTag::Name(name)) => {
                        (name.clone(), resolver.find_by_name(name).await)
                    }
                    Some(reference) => (
                        reference.inner().to_string(),
                        resolver.find_by_uid(reference.inner()).await.map(|found| found.handle),
                    ),
                    None => (
                        entry.raw_value.clone(),
                        resolver.find_by_uid(&entry.raw_value).await.map(|found| found.handle),
                    ),
                };
                push_edge(&mut edges, entry.kind, label, target);
            }
        }
        for relationship in parse_body_relationships(document.body()) {
            let target = resolver.find_by_name(&relationship.target_name).await;
            push_edge(&mut edges, relationship.kind, relationship.target_name, target);
        }
        edges
    }
}

fn push_edge(edges: &mut Vec<OutboundEdge>, kind: String, label: String, target: Option<ContactHandle>) {
    let genderless = to_genderless(&kind);
    let folded = fold_contact_name(&label);
    let duplicate = edges.iter().any(|edge| {
        to_genderless(&edge.kind) == genderless
            && match (&edge.target, &target) {
                (Some(left), Some(right)) => left == right,
                _ => fold_contact_name(&edge.label) == folded,
            }
    });
    if !duplicate {
        edges.push(OutboundEdge { kind, label, target });
    }
}

fn names_source(entry: &Relationship, source: &Contact) -> bool {
    let folded = fold_contact_name(&entry.target_name);
    folded == fold_contact_name(source.link_name()) || folded == fold_contact_name(&source.display_name)
}
