//! Document layout: frontmatter block plus markdown body.
//!
//! # Responsibility
//! - Split a contact document into its raw metadata block and body.
//! - Reassemble a document after one side changed, leaving the other side's
//!   bytes exactly as they were.
//! - Define the injected metadata encode/decode pair (`MetadataCodec`) and
//!   its YAML implementation.
//!
//! # Invariants
//! - `decode` never fails hard: malformed input yields `None`.
//! - Writing the metadata never rewrites the body and vice versa.

use crate::model::metadata::Metadata;
use serde_yaml::{Mapping, Value};

const FENCE: &str = "---";
/// Byte-order mark kept in front of the opening fence on rewrite.
pub const BOM: char = '\u{feff}';

/// Borrowed view of a split document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentParts<'a> {
    /// Raw text between the `---` fences, without the fences.
    pub frontmatter: Option<&'a str>,
    /// Everything after the closing fence (or the whole text).
    pub body: &'a str,
    /// A byte-order mark preceded the opening fence.
    pub bom: bool,
}

/// Splits `text` into frontmatter and body.
///
/// A block only counts as frontmatter when the first line is `---` and a
/// closing `---` (or `...`) line follows; otherwise the whole text is body.
pub fn split_document(text: &str) -> DocumentParts<'_> {
    let without_bom = text.strip_prefix(BOM).unwrap_or(text);
    let rest = without_bom
        .strip_prefix("---\n")
        .or_else(|| without_bom.strip_prefix("---\r\n"));
    let Some(rest) = rest else {
        return DocumentParts::body_only(text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let marker = line.trim_end_matches(['\n', '\r']).trim_end();
        if marker == FENCE || marker == "..." {
            return DocumentParts {
                frontmatter: Some(&rest[..offset]),
                body: &rest[offset + line.len()..],
                bom: without_bom.len() != text.len(),
            };
        }
        offset += line.len();
    }

    DocumentParts::body_only(text)
}

impl<'a> DocumentParts<'a> {
    fn body_only(text: &'a str) -> Self {
        Self {
            frontmatter: None,
            body: text,
            bom: false,
        }
    }
}

/// Joins an encoded metadata block and a body.
///
/// `None` writes the body alone (no fences).
pub fn compose_document(frontmatter: Option<&str>, body: &str) -> String {
    match frontmatter {
        Some(raw) => {
            let raw = raw.trim_end_matches(['\n', '\r']);
            if raw.is_empty() {
                format!("{FENCE}\n{FENCE}\n{body}")
            } else {
                format!("{FENCE}\n{raw}\n{FENCE}\n{body}")
            }
        }
        None => body.to_string(),
    }
}

/// Injected metadata-block syntax.
pub trait MetadataCodec {
    /// Decodes a raw block. Returns `None` when it cannot be parsed.
    fn decode(&self, raw: &str) -> Option<Metadata>;
    /// Encodes metadata into block text (without fences).
    fn encode(&self, metadata: &Metadata) -> Result<String, String>;
}

/// YAML frontmatter codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlMetadataCodec;

impl MetadataCodec for YamlMetadataCodec {
    fn decode(&self, raw: &str) -> Option<Metadata> {
        let value: Value = serde_yaml::from_str(raw).ok()?;
        match value {
            Value::Null => Some(Metadata::new()),
            // Any non-scalar key makes the whole block malformed.
            Value::Mapping(mapping) => mapping
                .into_iter()
                .map(|(key, value)| scalar_key(&key).map(|key| (key, value)))
                .collect(),
            _ => None,
        }
    }

    fn encode(&self, metadata: &Metadata) -> Result<String, String> {
        if metadata.is_empty() {
            return Ok(String::new());
        }
        let mut mapping = Mapping::new();
        for (key, value) in metadata.iter() {
            mapping.insert(Value::String(key.to_string()), value.clone());
        }
        serde_yaml::to_string(&Value::Mapping(mapping))
            .map_err(|err| format!("failed to encode metadata block: {err}"))
    }
}

fn scalar_key(key: &Value) -> Option<String> {
    match key {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Decodes the metadata of a whole document.
///
/// Absent frontmatter decodes to an empty map; `None` means a block exists
/// but is malformed.
pub fn decode_document_metadata(text: &str, codec: &impl MetadataCodec) -> Option<Metadata> {
    match split_document(text).frontmatter {
        Some(raw) => codec.decode(raw),
        None => Some(Metadata::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_frontmatter_and_body() {
        let text = "---\nFN: Jane\nUID: abc\n---\n# Jane\nbody\n";
        let parts = split_document(text);
        assert_eq!(parts.frontmatter, Some("FN: Jane\nUID: abc\n"));
        assert_eq!(parts.body, "# Jane\nbody\n");
    }

    #[test]
    fn bom_is_reported_only_before_a_frontmatter_block() {
        let parts = split_document("\u{feff}---\nFN: Jane\n---\nbody\n");
        assert!(parts.bom);
        assert_eq!(parts.frontmatter, Some("FN: Jane\n"));
        assert_eq!(parts.body, "body\n");

        let plain = split_document("\u{feff}# Jane\n");
        assert!(!plain.bom);
        assert_eq!(plain.body, "\u{feff}# Jane\n");
    }

    #[test]
    fn unterminated_block_is_body() {
        let text = "---\nFN: Jane\n# no closing fence\n";
        let parts = split_document(text);
        assert_eq!(parts.frontmatter, None);
        assert_eq!(parts.body, text);
    }

    #[test]
    fn empty_block_round_trips() {
        let parts = split_document("---\n---\nbody");
        assert_eq!(parts.frontmatter, Some(""));
        assert_eq!(compose_document(parts.frontmatter, parts.body), "---\n---\nbody");
    }

    #[test]
    fn yaml_codec_preserves_order_and_bracket_keys() {
        let codec = YamlMetadataCodec;
        let metadata = codec
            .decode("FN: Jane\nRELATED[1:friend]: name:Ann\nUID: abc\n")
            .expect("valid yaml");
        let keys: Vec<&str> = metadata.keys().collect();
        assert_eq!(keys, vec!["FN", "RELATED[1:friend]", "UID"]);

        let encoded = codec.encode(&metadata).expect("encodes");
        let decoded = codec.decode(&encoded).expect("re-decodes");
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn yaml_codec_rejects_malformed_and_non_mapping() {
        let codec = YamlMetadataCodec;
        assert_eq!(codec.decode("FN: [unclosed"), None);
        assert_eq!(codec.decode("- a\n- b\n"), None);
        assert_eq!(codec.decode(""), Some(Metadata::new()));
    }

    #[test]
    fn yaml_codec_rejects_blocks_with_non_scalar_keys() {
        let codec = YamlMetadataCodec;
        assert_eq!(codec.decode("FN: Jane\n? [a, b]\n: pair\n"), None);
        assert_eq!(codec.decode("? {x: 1}\n: nested\n"), None);
        let numeric = codec.decode("2024: year\n").expect("scalar keys decode");
        assert_eq!(numeric.keys().collect::<Vec<_>>(), vec!["2024"]);
    }

    #[test]
    fn document_without_frontmatter_has_empty_metadata() {
        let metadata = decode_document_metadata("# Bob\n", &YamlMetadataCodec);
        assert_eq!(metadata, Some(Metadata::new()));
        assert_eq!(
            decode_document_metadata("---\nFN: [x\n---\n", &YamlMetadataCodec),
            None
        );
    }
}
