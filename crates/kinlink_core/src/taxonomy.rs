//! Relationship type taxonomy.
//!
//! # Responsibility
//! - Map gendered display terms to canonical genderless types and back.
//! - Infer a contact's gender from the term used to describe them.
//! - Provide the reciprocal table used for inverse edges.
//!
//! # Invariants
//! - Every function is total: unknown terms pass through (lower-cased) or
//!   yield `None`/`Gender::Unknown`, never an error.
//! - Types without an entry in the reciprocal table have no reciprocal;
//!   new asymmetric types must be added there explicitly.

use crate::model::contact::Gender;

/// Canonical genderless types that carry gendered display forms, as
/// `(genderless, male term, female term, neutral term)`.
const GENDERED_FORMS: &[(&str, &str, &str, &str)] = &[
    ("parent", "father", "mother", "parent"),
    ("child", "son", "daughter", "child"),
    ("sibling", "brother", "sister", "sibling"),
    ("spouse", "husband", "wife", "spouse"),
    ("partner", "boyfriend", "girlfriend", "partner"),
    ("auncle", "uncle", "aunt", "aunt/uncle"),
    ("nibling", "nephew", "niece", "niece/nephew"),
    ("grandparent", "grandfather", "grandmother", "grandparent"),
    ("grandchild", "grandson", "granddaughter", "grandchild"),
];

/// Extra spellings of the neutral terms.
const NEUTRAL_ALIASES: &[(&str, &str)] = &[("uncle/aunt", "auncle"), ("nephew/niece", "nibling")];

/// Genderless type -> reciprocal genderless type.
const RECIPROCALS: &[(&str, &str)] = &[
    ("parent", "child"),
    ("child", "parent"),
    ("grandparent", "grandchild"),
    ("grandchild", "grandparent"),
    ("auncle", "nibling"),
    ("nibling", "auncle"),
    ("sibling", "sibling"),
    ("spouse", "spouse"),
    ("partner", "partner"),
    ("cousin", "cousin"),
    ("friend", "friend"),
    ("colleague", "colleague"),
    ("relative", "relative"),
];

fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

fn canonical_for(normalized: &str) -> Option<&'static str> {
    for (genderless, male, female, neutral) in GENDERED_FORMS {
        if normalized == *genderless
            || normalized == *male
            || normalized == *female
            || normalized == *neutral
        {
            return Some(*genderless);
        }
    }
    NEUTRAL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, genderless)| *genderless)
}

/// Maps any term to its genderless type (`mother` -> `parent`).
///
/// Unrecognized terms are returned trimmed and lower-cased.
pub fn to_genderless(term: &str) -> String {
    let normalized = normalize_term(term);
    match canonical_for(&normalized) {
        Some(genderless) => genderless.to_string(),
        None => normalized,
    }
}

/// Display term for `genderless_type` describing a party of `gender`.
///
/// Falls back to the neutral term when the gender is not male/female or the
/// type has no gendered forms.
pub fn to_gendered(genderless_type: &str, gender: Gender) -> String {
    let genderless = to_genderless(genderless_type);
    let Some((_, male, female, neutral)) = GENDERED_FORMS
        .iter()
        .find(|(candidate, ..)| *candidate == genderless)
    else {
        return genderless;
    };
    match gender {
        Gender::Male => (*male).to_string(),
        Gender::Female => (*female).to_string(),
        _ => (*neutral).to_string(),
    }
}

/// Infers the described party's gender from a term (`aunt` -> female).
pub fn infer_gender(term: &str) -> Gender {
    let normalized = normalize_term(term);
    for (_, male, female, _) in GENDERED_FORMS {
        if normalized == *male {
            return Gender::Male;
        }
        if normalized == *female {
            return Gender::Female;
        }
    }
    Gender::Unknown
}

/// Whether the term encodes a gender (`father` yes, `parent` no).
pub fn is_gendered_term(term: &str) -> bool {
    infer_gender(term).is_binary()
}

/// Two terms describe the same relationship once gender is dropped.
pub fn types_equivalent(a: &str, b: &str) -> bool {
    to_genderless(a) == to_genderless(b)
}

/// Genderless reciprocal of a term (`father` -> `child`).
pub fn reciprocal_genderless(term: &str) -> Option<&'static str> {
    let genderless = to_genderless(term);
    RECIPROCALS
        .iter()
        .find(|(from, _)| *from == genderless)
        .map(|(_, to)| *to)
}

/// Display term for the inverse edge.
///
/// `other_party_gender` is the gender of the contact the inverse edge points
/// at, i.e. the source of the original relationship: if S lists T as
/// `parent` and S is male, T gets `son`.
pub fn reciprocal_type(term: &str, other_party_gender: Gender) -> Option<String> {
    reciprocal_genderless(term).map(|reciprocal| to_gendered(reciprocal, other_party_gender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genderless_maps_gendered_terms() {
        assert_eq!(to_genderless("mother"), "parent");
        assert_eq!(to_genderless("Uncle"), "auncle");
        assert_eq!(to_genderless("aunt"), "auncle");
        assert_eq!(to_genderless("wife"), "spouse");
        assert_eq!(to_genderless("granddaughter"), "grandchild");
        assert_eq!(to_genderless("aunt/uncle"), "auncle");
    }

    #[test]
    fn genderless_passes_unknown_terms_through() {
        assert_eq!(to_genderless("mentor"), "mentor");
        assert_eq!(to_genderless(" Friend "), "friend");
    }

    #[test]
    fn gendered_uses_neutral_fallback() {
        assert_eq!(to_gendered("parent", Gender::Male), "father");
        assert_eq!(to_gendered("parent", Gender::Female), "mother");
        assert_eq!(to_gendered("parent", Gender::Unknown), "parent");
        assert_eq!(to_gendered("auncle", Gender::Unspecified), "aunt/uncle");
        assert_eq!(to_gendered("auncle", Gender::NonBinary), "aunt/uncle");
        assert_eq!(to_gendered("friend", Gender::Female), "friend");
    }

    #[test]
    fn infers_gender_only_from_gendered_terms() {
        assert_eq!(infer_gender("Father"), Gender::Male);
        assert_eq!(infer_gender("niece"), Gender::Female);
        assert_eq!(infer_gender("parent"), Gender::Unknown);
        assert_eq!(infer_gender("colleague"), Gender::Unknown);
    }

    #[test]
    fn equivalence_ignores_gender() {
        assert!(types_equivalent("father", "parent"));
        assert!(types_equivalent("mother", "father"));
        assert!(!types_equivalent("father", "son"));
    }

    #[test]
    fn reciprocal_uses_source_gender() {
        assert_eq!(reciprocal_type("parent", Gender::Male).as_deref(), Some("son"));
        assert_eq!(
            reciprocal_type("father", Gender::Female).as_deref(),
            Some("daughter")
        );
        assert_eq!(reciprocal_type("aunt", Gender::Male).as_deref(), Some("nephew"));
        assert_eq!(reciprocal_type("wife", Gender::Male).as_deref(), Some("husband"));
        assert_eq!(reciprocal_type("friend", Gender::Male).as_deref(), Some("friend"));
        assert_eq!(reciprocal_type("child", Gender::Unknown).as_deref(), Some("parent"));
    }

    #[test]
    fn reciprocal_is_none_for_unlisted_types() {
        assert_eq!(reciprocal_type("mentor", Gender::Male), None);
        assert_eq!(reciprocal_type("related", Gender::Female), None);
    }
}
