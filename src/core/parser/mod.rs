//! # Parser Module
//!
//! Turns a filename into [`BookMetadata`] using a [`RuleSet`].
//!
//! Parsing never fails. Rules are tried highest priority first and the
//! first match wins; when nothing matches, the filename stem becomes the
//! title.

use crate::core::catalog::{BookMetadata, MAX_RATING, MAX_VOLUME};
use crate::core::rules::{Attribute, ParsingRule, RuleSet};
use regex::Captures;
use std::path::Path;
use tracing::trace;

/// Parse a filename (not a full path) into metadata.
pub fn parse(filename: &str, rules: &RuleSet) -> BookMetadata {
    let stem = strip_extension(filename);

    for rule in rules.rules() {
        let Some(caps) = rule.pattern.captures(stem) else {
            continue;
        };

        let metadata = extract(rule, &caps);
        if metadata.is_empty() {
            trace!(rule = %rule.name, filename, "rule matched but extracted nothing");
            break;
        }

        trace!(rule = %rule.name, filename, "rule matched");
        return metadata;
    }

    fallback(stem)
}

/// Parse the file name component of `path`
pub fn parse_path(path: &Path, rules: &RuleSet) -> BookMetadata {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_else(|| path.to_string_lossy());
    parse(&name, rules)
}

/// Drop the last extension, keeping dotfiles and extension-less names intact.
///
/// `"Dune.epub"` → `"Dune"`, `"a.b.pdf"` → `"a.b"`, `".hidden"` → `".hidden"`.
pub fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    }
}

fn fallback(stem: &str) -> BookMetadata {
    let title = stem.trim();
    if title.is_empty() {
        BookMetadata::default()
    } else {
        BookMetadata::titled(title)
    }
}

fn extract(rule: &ParsingRule, caps: &Captures<'_>) -> BookMetadata {
    let mut metadata = BookMetadata::default();

    for field in &rule.fields {
        let Some(text) = caps
            .name(&field.capture)
            .map(|m| m.as_str().trim())
            .filter(|t| !t.is_empty())
        else {
            continue;
        };

        match field.attribute {
            Attribute::Title => metadata.title = Some(text.to_string()),
            Attribute::Subtitle => metadata.subtitle = Some(text.to_string()),
            Attribute::Author => metadata.author = Some(text.to_string()),
            Attribute::OriginalAuthor => metadata.original_author = Some(text.to_string()),
            Attribute::Series => metadata.series = Some(text.to_string()),
            Attribute::Category => metadata.category = Some(text.to_string()),
            Attribute::Volume => {
                metadata.volume =
                    coerce_integer(text).map(|v| v.min(u64::from(MAX_VOLUME)) as u32)
            }
            Attribute::Rating => {
                metadata.rating = coerce_integer(text).map(|v| v.min(u64::from(MAX_RATING)) as u8)
            }
            Attribute::IsCollectionVolume => metadata.is_collection_volume = true,
        }
    }

    metadata
}

/// Parse an integer from user-controlled text.
///
/// Accepts ASCII and full-width digits with an optional sign. Negative
/// values become zero and oversized values saturate. Anything else is
/// `None`.
fn coerce_integer(text: &str) -> Option<u64> {
    let (negative, digits) = match text.chars().next()? {
        '-' | '－' => (true, &text[text.chars().next()?.len_utf8()..]),
        '+' | '＋' => (false, &text[text.chars().next()?.len_utf8()..]),
        _ => (false, text),
    };

    let mut value: u64 = 0;
    let mut seen = false;
    for c in digits.chars() {
        let digit = match c {
            '0'..='9' => c as u32 - '0' as u32,
            '０'..='９' => c as u32 - '０' as u32,
            _ => return None,
        };
        value = value.saturating_mul(10).saturating_add(u64::from(digit));
        seen = true;
    }

    if !seen {
        return None;
    }
    Some(if negative { 0 } else { value })
}

/// A rule set bundled with the parse entry points
#[derive(Debug, Clone, Default)]
pub struct FilenameParser {
    rules: RuleSet,
}

impl FilenameParser {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn parse(&self, filename: &str) -> BookMetadata {
        parse(filename, &self.rules)
    }

    pub fn parse_path(&self, path: &Path) -> BookMetadata {
        parse_path(path, &self.rules)
    }
}
