//! Relationship representations.
//!
//! A relationship is written twice on a contact: as a bulleted body-list
//! entry (`Relationship`) and as a keyed metadata field
//! (`FrontmatterRelationship`). Neither carries identity beyond its position.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Body-list entry, e.g. `- father [[Bob Doe]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    /// Term as written by the user; may be gendered (`father`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Wiki-link target naming the other contact.
    pub target_name: String,
}

impl Relationship {
    pub fn new(kind: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target_name: target_name.into(),
        }
    }
}

impl Display for Relationship {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [[{}]]", self.kind, self.target_name)
    }
}

/// Parsed reference value of a keyed field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReferenceTag {
    /// `urn:uuid:<id>`
    Uuid(String),
    /// `uid:<id>`
    Uid(String),
    /// `name:<display name>`; a forward reference.
    Name(String),
}

impl ReferenceTag {
    /// Value without its scheme prefix.
    pub fn inner(&self) -> &str {
        match self {
            Self::Uuid(value) | Self::Uid(value) | Self::Name(value) => value,
        }
    }

    /// UID carried by a resolved reference.
    pub fn uid(&self) -> Option<&str> {
        match self {
            Self::Uuid(value) | Self::Uid(value) => Some(value),
            Self::Name(_) => None,
        }
    }

    /// `true` for `Uuid`/`Uid`: the target contact is known.
    pub fn is_resolved(&self) -> bool {
        self.uid().is_some()
    }
}

/// Keyed-encoding field, e.g. `RELATED[1:parent]: urn:uuid:...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontmatterRelationship {
    /// Canonical field name.
    pub key: String,
    /// Genderless type extracted from the key.
    #[serde(rename = "type")]
    pub kind: String,
    /// Disambiguation index; 0 for the bare `RELATED[type]` form.
    pub index: u32,
    pub raw_value: String,
    /// `None` when `raw_value` matches no known scheme (legacy value).
    pub reference: Option<ReferenceTag>,
}
