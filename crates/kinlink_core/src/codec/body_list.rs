//! Body-list grammar and `Related` section handling.
//!
//! Accepted line shapes, first match wins:
//! 1. `type [[Name]]` (canonical)
//! 2. `type: [[Name]]`
//! 3. `[[Name]] (type)`
//! 4. `type: Name` (plain text; rejected when the value starts with `[[`)
//!
//! Output is always `- type [[Name]]`.

use crate::model::relationship::Relationship;
use once_cell::sync::Lazy;
use regex::Regex;

static CANONICAL_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^:\[\]]+?)\s+\[\[([^\[\]]+)\]\]$").expect("valid canonical line regex")
});
static COLON_LINK_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^:\[\]]+?)\s*:\s*\[\[([^\[\]]+)\]\]$").expect("valid colon link regex")
});
static LINK_FIRST_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[\[([^\[\]]+)\]\]\s*\(([^()]+)\)$").expect("valid link-first regex")
});
static PLAIN_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:\[\]]+?)\s*:\s*(.+)$").expect("valid plain line regex"));
static RELATED_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(#{2,6})\s+related\s*#*\s*$").expect("valid heading regex"));
static ANY_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{1,6}(?:\s|$)").expect("valid any-heading regex"));

/// Heading text written when a section is (re)rendered.
pub const RELATED_HEADING_TEXT: &str = "Related";

/// Byte ranges of a located `Related` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelatedSection {
    /// Heading depth (2..=6).
    pub level: usize,
    /// Start of the heading line.
    pub heading_start: usize,
    /// Start of the first line after the heading.
    pub content_start: usize,
    /// Start of the next heading, or the end of the text.
    pub content_end: usize,
}

/// Parses one body-list line. Returns `None` for lines matching no shape.
pub fn parse_line(line: &str) -> Option<Relationship> {
    let entry = strip_bullet(line.trim());
    if entry.is_empty() {
        return None;
    }

    if let Some(caps) = CANONICAL_LINE_RE.captures(entry) {
        return build(&caps[1], &caps[2]);
    }
    if let Some(caps) = COLON_LINK_LINE_RE.captures(entry) {
        return build(&caps[1], &caps[2]);
    }
    if let Some(caps) = LINK_FIRST_LINE_RE.captures(entry) {
        return build(&caps[2], &caps[1]);
    }
    if let Some(caps) = PLAIN_LINE_RE.captures(entry) {
        let value = caps[2].trim();
        if value.starts_with("[[") {
            return None;
        }
        return build(&caps[1], value);
    }
    None
}

/// Canonical line for one relationship.
pub fn format_line(relationship: &Relationship) -> String {
    format!(
        "- {} [[{}]]",
        relationship.kind.trim(),
        relationship.target_name.trim()
    )
}

/// Locates the first `Related` heading (`##`..`######`, any case).
///
/// Headings inside fenced code blocks are ignored.
pub fn find_related_section(body: &str) -> Option<RelatedSection> {
    let mut in_fence = false;
    let mut offset = 0;
    let mut found: Option<(usize, usize, usize)> = None;

    for line in body.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let text = line.trim_end_matches(['\n', '\r']);

        if text.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        match found {
            None => {
                if let Some(caps) = RELATED_HEADING_RE.captures(text) {
                    found = Some((caps[1].len(), line_start, offset));
                }
            }
            Some((level, heading_start, content_start)) => {
                if ANY_HEADING_RE.is_match(text) {
                    return Some(RelatedSection {
                        level,
                        heading_start,
                        content_start,
                        content_end: line_start,
                    });
                }
            }
        }
    }

    found.map(|(level, heading_start, content_start)| RelatedSection {
        level,
        heading_start,
        content_start,
        content_end: body.len(),
    })
}

/// Parses every recognizable line of the `Related` section.
///
/// Returns `None` when the body has no `Related` heading.
pub fn parse_related_section(body: &str) -> Option<Vec<Relationship>> {
    let section = find_related_section(body)?;
    Some(
        body[section.content_start..section.content_end]
            .lines()
            .filter_map(parse_line)
            .collect(),
    )
}

/// Rewrites the `Related` section with `relationships`, leaving all other
/// text untouched. Appends a new section at `default_level` when absent.
pub fn render_related_section(
    body: &str,
    relationships: &[Relationship],
    default_level: usize,
) -> String {
    let mut block = String::new();
    for relationship in relationships {
        block.push_str(&format_line(relationship));
        block.push('\n');
    }

    match find_related_section(body) {
        Some(section) => {
            let mut out = String::with_capacity(body.len() + block.len());
            out.push_str(&body[..section.heading_start]);
            out.push_str(&heading(section.level));
            out.push_str(&block);
            if section.content_end < body.len() {
                out.push('\n');
                out.push_str(&body[section.content_end..]);
            }
            out
        }
        None => with_new_section(body, &block, default_level),
    }
}

/// Adds `additions` after the last entry of the `Related` section, leaving
/// existing lines byte-for-byte. Creates the section when absent.
pub fn append_to_related_section(
    body: &str,
    additions: &[Relationship],
    default_level: usize,
) -> String {
    let mut block = String::new();
    for relationship in additions {
        block.push_str(&format_line(relationship));
        block.push('\n');
    }
    let Some(section) = find_related_section(body) else {
        return with_new_section(body, &block, default_level);
    };

    let content = &body[section.content_start..section.content_end];
    let kept = content.trim_end();
    let insert_at = section.content_start + kept.len();

    let mut out = String::with_capacity(body.len() + block.len() + 1);
    out.push_str(&body[..insert_at]);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&block);
    let mut rest = &body[insert_at..];
    if !kept.is_empty() {
        rest = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);
    }
    out.push_str(rest);
    out
}

fn with_new_section(body: &str, block: &str, default_level: usize) -> String {
    let level = default_level.clamp(2, 6);
    let existing = body.trim_end_matches(['\n', '\r']);
    let mut out = String::with_capacity(existing.len() + block.len() + 16);
    if !existing.is_empty() {
        out.push_str(existing);
        out.push_str("\n\n");
    }
    out.push_str(&heading(level));
    out.push_str(block);
    out
}

fn heading(level: usize) -> String {
    format!("{} {RELATED_HEADING_TEXT}\n", "#".repeat(level))
}

fn strip_bullet(entry: &str) -> &str {
    for bullet in ['-', '*', '+'] {
        if let Some(rest) = entry.strip_prefix(bullet) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    entry
}

fn build(kind: &str, target: &str) -> Option<Relationship> {
    let kind = kind.trim();
    let target = target.split('|').next().unwrap_or(target).trim();
    if kind.is_empty() || target.is_empty() {
        return None;
    }
    Some(Relationship::new(kind, target))
}
