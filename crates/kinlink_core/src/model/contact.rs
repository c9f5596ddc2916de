//! Contact identity and gender model.
//!
//! # Responsibility
//! - Name a contact document (`ContactHandle`) independent of storage.
//! - Describe a contact as a short-lived resolution value (`Contact`).
//!
//! # Invariants
//! - A contact is identified by its handle; `uid` is only a claim.
//! - Stored UIDs are compared without their `urn:uuid:`/`uid:` prefix.

use crate::codec::keyed::normalize_uid;
use crate::model::metadata::{Metadata, FIELD_DISPLAY_NAME, FIELD_GENDER, FIELD_UID};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Storage-relative document path of one contact, e.g. `Contacts/Jane Doe.md`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ContactHandle(String);

impl ContactHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into().replace('\\', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name without directory and `.md` extension.
    ///
    /// This is the wiki-link target used when writing body-list entries.
    pub fn link_name(&self) -> &str {
        let file_name = self.0.rsplit('/').next().unwrap_or(self.0.as_str());
        file_name
            .strip_suffix(".md")
            .or_else(|| file_name.strip_suffix(".MD"))
            .unwrap_or(file_name)
    }
}

impl Display for ContactHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContactHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Contact gender as recorded in the `GENDER` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    /// Explicitly recorded as unspecified.
    Unspecified,
    /// Field absent or unreadable.
    Unknown,
}

impl Gender {
    /// Parses a stored gender value. Unrecognized values map to `Unknown`.
    pub fn from_field(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Self::Male,
            "f" | "female" => Self::Female,
            "nb" | "o" | "nonbinary" | "non-binary" => Self::NonBinary,
            "u" | "n" | "unspecified" => Self::Unspecified,
            _ => Self::Unknown,
        }
    }

    /// Canonical stored value; `None` for `Unknown`.
    pub fn as_field(self) -> Option<&'static str> {
        match self {
            Self::Male => Some("M"),
            Self::Female => Some("F"),
            Self::NonBinary => Some("NB"),
            Self::Unspecified => Some("U"),
            Self::Unknown => None,
        }
    }

    /// Whether the gender selects a gendered display term.
    pub fn is_binary(self) -> bool {
        matches!(self, Self::Male | Self::Female)
    }
}

/// Resolution result for one contact document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub handle: ContactHandle,
    /// `FN` field, or the file stem when absent.
    pub display_name: String,
    /// Claimed UID, prefix-stripped. `None` when unset or blank.
    pub uid: Option<String>,
    pub gender: Gender,
}

impl Contact {
    /// Builds a contact view from its handle and metadata block.
    pub fn from_metadata(handle: ContactHandle, metadata: &Metadata) -> Self {
        let display_name = metadata
            .get_text(FIELD_DISPLAY_NAME)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| handle.link_name().to_string());
        let uid = metadata
            .get_text(FIELD_UID)
            .map(|value| normalize_uid(&value))
            .filter(|value| !value.is_empty());
        let gender = metadata
            .get_text(FIELD_GENDER)
            .map(|value| Gender::from_field(&value))
            .unwrap_or(Gender::Unknown);

        Self {
            handle,
            display_name,
            uid,
            gender,
        }
    }

    /// Wiki-link target for this contact.
    pub fn link_name(&self) -> &str {
        self.handle.link_name()
    }

    pub fn uid_or_empty(&self) -> &str {
        self.uid.as_deref().unwrap_or("")
    }
}

/// Folds a contact name for comparison.
///
/// Case-insensitive; runs of whitespace, `-` and `_` collapse to one space,
/// so `John Doe`, `john-doe` and ` JOHN   doe ` compare equal.
pub fn fold_contact_name(name: &str) -> String {
    let target = name.split('|').next().unwrap_or(name);
    target
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::{fold_contact_name, Contact, ContactHandle, Gender};
    use crate::model::metadata::Metadata;

    #[test]
    fn link_name_strips_folder_and_extension() {
        let handle = ContactHandle::new("Contacts/Family/Jane Doe.md");
        assert_eq!(handle.link_name(), "Jane Doe");
        assert_eq!(ContactHandle::new("Bob").link_name(), "Bob");
    }

    #[test]
    fn fold_treats_dash_and_whitespace_alike() {
        assert_eq!(fold_contact_name("John Doe"), fold_contact_name("john-doe"));
        assert_eq!(fold_contact_name("  JOHN   doe "), "john doe");
        assert_eq!(fold_contact_name("Jane|Janie"), "jane");
    }

    #[test]
    fn gender_parses_short_and_long_forms() {
        assert_eq!(Gender::from_field("M"), Gender::Male);
        assert_eq!(Gender::from_field("female"), Gender::Female);
        assert_eq!(Gender::from_field("NB"), Gender::NonBinary);
        assert_eq!(Gender::from_field("U"), Gender::Unspecified);
        assert_eq!(Gender::from_field("robot"), Gender::Unknown);
        assert_eq!(Gender::Unknown.as_field(), None);
    }

    #[test]
    fn contact_prefers_fn_and_strips_uid_prefix() {
        let mut metadata = Metadata::new();
        metadata.insert_str("FN", "Jane Q. Doe");
        metadata.insert_str("UID", "urn:uuid:0b5c7d6e-1111-4222-8333-444455556666");
        metadata.insert_str("GENDER", "F");

        let contact = Contact::from_metadata(ContactHandle::new("Jane Doe.md"), &metadata);
        assert_eq!(contact.display_name, "Jane Q. Doe");
        assert_eq!(contact.link_name(), "Jane Doe");
        assert_eq!(
            contact.uid.as_deref(),
            Some("0b5c7d6e-1111-4222-8333-444455556666")
        );
        assert_eq!(contact.gender, Gender::Female);
    }

    #[test]
    fn contact_without_fields_falls_back_to_file_stem() {
        let contact = Contact::from_metadata(ContactHandle::new("Bob.md"), &Metadata::new());
        assert_eq!(contact.display_name, "Bob");
        assert_eq!(contact.uid, None);
        assert_eq!(contact.gender, Gender::Unknown);
    }
}
