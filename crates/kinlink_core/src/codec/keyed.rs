//! Keyed-encoding grammar.
//!
//! Keys: `RELATED`, `RELATED[<type>]`, `RELATED[<n>:<type>]`.
//! Values: `urn:uuid:<id>`, `uid:<id>`, `name:<display name>`.

use crate::model::metadata::RELATED_PREFIX;
use crate::model::relationship::ReferenceTag;
use crate::taxonomy::to_genderless;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static KEYED_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^RELATED(?:\[\s*(?:(\d+)\s*:\s*)?([^\[\]:]+?)\s*\])?$").expect("valid key regex")
});
static UUID_SHAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid uuid regex")
});

const URN_UUID_SCHEME: &str = "urn:uuid:";
const UID_SCHEME: &str = "uid:";
const NAME_SCHEME: &str = "name:";

/// Implicit type of a bare `RELATED` key.
pub const IMPLICIT_RELATED_TYPE: &str = "related";

/// Parsed keyed-encoding field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyedKey {
    /// Genderless relationship type.
    pub kind: String,
    /// 0 for the bare form.
    pub index: u32,
}

impl KeyedKey {
    pub fn new(kind: impl Into<String>, index: u32) -> Self {
        Self {
            kind: kind.into(),
            index,
        }
    }

    /// Canonical field name for this key.
    pub fn format(&self) -> String {
        format_keyed_key(&self.kind, self.index)
    }
}

/// Parses a keyed-encoding field name.
///
/// Returns `None` for names outside the grammar. Gendered types written into
/// a key (`RELATED[father]`) are normalized to their genderless form.
pub fn parse_keyed_key(key: &str) -> Option<KeyedKey> {
    let caps = KEYED_KEY_RE.captures(key.trim())?;
    let Some(kind) = caps.get(2) else {
        return Some(KeyedKey::new(IMPLICIT_RELATED_TYPE, 0));
    };
    let index = match caps.get(1) {
        Some(digits) => digits.as_str().parse::<u32>().ok()?,
        None => 0,
    };
    let kind = to_genderless(kind.as_str());
    if kind.is_empty() {
        return None;
    }
    Some(KeyedKey::new(kind, index))
}

/// True for an explicit index written `0:` or with leading zeros
/// (`RELATED[0:friend]`, `RELATED[01:friend]`). Such keys parse, but share
/// their identity with the canonical spelling.
pub fn has_non_canonical_index(key: &str) -> bool {
    KEYED_KEY_RE
        .captures(key.trim())
        .and_then(|caps| caps.get(1))
        .is_some_and(|digits| digits.as_str().starts_with('0'))
}

/// Formats a field name: bare for index 0, `[n:type]` otherwise.
pub fn format_keyed_key(genderless_type: &str, index: u32) -> String {
    if index == 0 {
        format!("{RELATED_PREFIX}[{genderless_type}]")
    } else {
        format!("{RELATED_PREFIX}[{index}:{genderless_type}]")
    }
}

/// Non-fatal problem with a keyed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueWarning {
    /// Blank value, or a scheme with nothing after it.
    Empty,
    /// Value matches no known scheme; kept as a legacy raw value.
    Unrecognized(String),
}

impl Display for ValueWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "relationship value is empty"),
            Self::Unrecognized(value) => {
                write!(f, "relationship value `{value}` has no urn:uuid:/uid:/name: prefix")
            }
        }
    }
}

impl Error for ValueWarning {}

/// Parses a keyed value into its reference tag.
pub fn parse_value(value: &str) -> Result<ReferenceTag, ValueWarning> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValueWarning::Empty);
    }

    let tagged = if let Some(rest) = strip_scheme(trimmed, URN_UUID_SCHEME) {
        ReferenceTag::Uuid(rest.trim().to_string())
    } else if let Some(rest) = strip_scheme(trimmed, UID_SCHEME) {
        ReferenceTag::Uid(rest.trim().to_string())
    } else if let Some(rest) = strip_scheme(trimmed, NAME_SCHEME) {
        ReferenceTag::Name(rest.trim().to_string())
    } else {
        return Err(ValueWarning::Unrecognized(trimmed.to_string()));
    };

    if tagged.inner().is_empty() {
        return Err(ValueWarning::Empty);
    }
    Ok(tagged)
}

/// Formats a keyed value; the only place these strings are built.
///
/// UUID-shaped UIDs become `urn:uuid:`, other UIDs `uid:`, and an empty UID
/// yields a `name:` forward reference.
pub fn format_value(uid: &str, name: &str) -> String {
    let uid = normalize_uid(uid);
    if is_uuid_shape(&uid) {
        format!("{URN_UUID_SCHEME}{uid}")
    } else if !uid.is_empty() {
        format!("{UID_SCHEME}{uid}")
    } else {
        format!("{NAME_SCHEME}{}", name.trim())
    }
}

/// 8-4-4-4-12 hex, case-insensitive.
pub fn is_uuid_shape(value: &str) -> bool {
    UUID_SHAPE_RE.is_match(value)
}

/// Strips a `urn:uuid:` or `uid:` prefix and surrounding whitespace.
pub fn normalize_uid(raw: &str) -> String {
    let trimmed = raw.trim();
    strip_scheme(trimmed, URN_UUID_SCHEME)
        .or_else(|| strip_scheme(trimmed, UID_SCHEME))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let head = value.get(..scheme.len())?;
    if head.eq_ignore_ascii_case(scheme) {
        Some(&value[scheme.len()..])
    } else {
        None
    }
}
