//! Relationship parser over a document's two encodings.
//!
//! # Responsibility
//! - Produce the keyed-encoding list from a metadata block.
//! - Produce the body-list from the `Related` section of a body.
//!
//! # Invariants
//! - Malformed input is skipped or normalized with a diagnostic, never an
//!   error: dotted (`RELATED.spouse`) and nested (`RELATED: {spouse: ..}`)
//!   shapes are rewritten to bracketed keys before parsing.

use crate::codec::body_list::parse_related_section;
use crate::codec::keyed::{format_keyed_key, has_non_canonical_index, parse_keyed_key, parse_value};
use crate::model::metadata::{is_related_key, Metadata, RELATED_PREFIX};
use crate::model::relationship::{FrontmatterRelationship, Relationship};
use log::debug;
use serde_yaml::Value;
use std::collections::HashSet;

/// Keyed relationships plus the diagnostics produced while reading them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontmatterParse {
    pub relationships: Vec<FrontmatterRelationship>,
    pub diagnostics: Vec<String>,
}

/// Parses every keyed relationship field of `metadata`.
pub fn parse_frontmatter_relationships(metadata: &Metadata) -> FrontmatterParse {
    let mut normalized = metadata.clone();
    let mut diagnostics = normalize_related_keys(&mut normalized);
    let mut relationships = Vec::new();

    for (key, value) in normalized.iter() {
        if !is_related_key(key) {
            continue;
        }
        let Some(parsed_key) = parse_keyed_key(key) else {
            diagnostics.push(format!("skipped malformed relationship key `{key}`"));
            continue;
        };
        if has_non_canonical_index(key) {
            diagnostics.push(format!(
                "`{key}` reads as `{}`; the next resync renumbers it",
                parsed_key.format()
            ));
        }
        let Some(raw_value) = value.as_str() else {
            diagnostics.push(format!("skipped non-string value of `{key}`"));
            continue;
        };
        let reference = match parse_value(raw_value) {
            Ok(tag) => Some(tag),
            Err(warning) => {
                diagnostics.push(format!("{key}: {warning}"));
                None
            }
        };
        relationships.push(FrontmatterRelationship {
            key: key.to_string(),
            kind: parsed_key.kind,
            index: parsed_key.index,
            raw_value: raw_value.trim().to_string(),
            reference,
        });
    }

    debug!(
        "event=parse_keyed module=parser status=ok relationships={} diagnostics={}",
        relationships.len(),
        diagnostics.len()
    );
    FrontmatterParse {
        relationships,
        diagnostics,
    }
}

/// Parses the body-list; empty when the body has no `Related` section.
pub fn parse_body_relationships(body: &str) -> Vec<Relationship> {
    parse_related_section(body).unwrap_or_default()
}

/// Rewrites dotted and nested relationship fields into bracketed keys, in
/// place. Returns one diagnostic per rewritten or dropped field.
///
/// A rewritten key that collides with an existing one takes the next free
/// index of its type instead of overwriting it.
pub fn normalize_related_keys(metadata: &mut Metadata) -> Vec<String> {
    let mut diagnostics = Vec::new();
    let mut rewrites: Vec<(String, String, Value)> = Vec::new();
    let dotted_prefix = format!("{RELATED_PREFIX}.");

    for (key, value) in metadata.iter() {
        if let Some(path) = key.strip_prefix(&dotted_prefix) {
            rewrites.push((key.to_string(), dotted_inner(path), value.clone()));
        } else if key == RELATED_PREFIX {
            if let Value::Mapping(entries) = value {
                for (inner_key, inner_value) in entries {
                    match inner_key.as_str() {
                        Some(inner) => rewrites.push((
                            key.to_string(),
                            inner.trim().to_string(),
                            inner_value.clone(),
                        )),
                        None => diagnostics.push(format!(
                            "dropped nested `{RELATED_PREFIX}` entry with non-string key"
                        )),
                    }
                }
            }
        }
    }

    if rewrites.is_empty() {
        return diagnostics;
    }

    let mut removed = HashSet::new();
    for (source_key, _, _) in &rewrites {
        if removed.insert(source_key.clone()) {
            metadata.remove(source_key);
        }
    }

    for (source_key, inner, value) in rewrites {
        let candidate = format!("{RELATED_PREFIX}[{inner}]");
        let Some(parsed) = parse_keyed_key(&candidate) else {
            diagnostics.push(format!("dropped unparseable relationship field `{source_key}`"));
            continue;
        };
        let mut index = parsed.index;
        let mut target = format_keyed_key(&parsed.kind, index);
        while metadata.contains_key(&target) {
            index += 1;
            target = format_keyed_key(&parsed.kind, index);
        }
        diagnostics.push(format!("normalized `{source_key}` to `{target}`"));
        metadata.insert(target, value);
    }

    diagnostics
}

/// `1.friend` -> `1:friend`, `spouse` -> `spouse`.
fn dotted_inner(path: &str) -> String {
    match path.split_once('.') {
        Some((index, kind)) if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) => {
            format!("{index}:{kind}")
        }
        _ => path.to_string(),
    }
}
