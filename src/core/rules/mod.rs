//! # Rules Module
//!
//! User-editable rules that turn filenames into book metadata.
//!
//! ## Rule anatomy
//! - **pattern** - either a regular expression with named groups, or a
//!   `{placeholder}` template such as `"{series} - Vol.{volume} - {author}"`
//! - **priority** - higher numbers are tried first; ties keep file order
//! - **fields** - named capture → book attribute. When omitted, captures
//!   named after an attribute map to it directly.
//!
//! ## Example rule file
//! ```json
//! [
//!   {"name": "volumes", "template": "{series} - Vol.{volume} - {author}", "priority": 20},
//!   {"name": "bracketed author", "regex": "^\\[(?P<who>.+?)\\]\\s*(?P<title>.+)",
//!    "priority": 10, "fields": {"who": "author", "title": "title"}}
//! ]
//! ```

mod loader;
mod template;

use crate::error::ConfigurationError;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A book attribute a rule can fill in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Title,
    Subtitle,
    Volume,
    Author,
    OriginalAuthor,
    Series,
    Category,
    Rating,
    IsCollectionVolume,
}

impl Attribute {
    /// Every attribute, in display order
    pub const ALL: [Attribute; 9] = [
        Attribute::Title,
        Attribute::Subtitle,
        Attribute::Volume,
        Attribute::Author,
        Attribute::OriginalAuthor,
        Attribute::Series,
        Attribute::Category,
        Attribute::Rating,
        Attribute::IsCollectionVolume,
    ];

    /// Resolve an attribute name as written in rule files.
    ///
    /// Accepts snake_case and camelCase spellings plus the legacy
    /// `magazine_flag` / `collection` aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "title" => Some(Attribute::Title),
            "subtitle" => Some(Attribute::Subtitle),
            "volume" => Some(Attribute::Volume),
            "author" => Some(Attribute::Author),
            "original_author" | "originalAuthor" => Some(Attribute::OriginalAuthor),
            "series" => Some(Attribute::Series),
            "category" => Some(Attribute::Category),
            "rating" => Some(Attribute::Rating),
            "is_collection_volume" | "isCollectionVolume" | "collection" | "magazine_flag"
            | "is_magazine_collection" => Some(Attribute::IsCollectionVolume),
            _ => None,
        }
    }

    /// Canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Title => "title",
            Attribute::Subtitle => "subtitle",
            Attribute::Volume => "volume",
            Attribute::Author => "author",
            Attribute::OriginalAuthor => "original_author",
            Attribute::Series => "series",
            Attribute::Category => "category",
            Attribute::Rating => "rating",
            Attribute::IsCollectionVolume => "is_collection_volume",
        }
    }

    /// Attributes coerced to integers
    pub fn is_numeric(&self) -> bool {
        matches!(self, Attribute::Volume | Attribute::Rating)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a rule recognises a filename
#[derive(Debug, Clone)]
pub enum RulePattern {
    /// Regular expression searched anywhere in the filename stem
    Regex(Regex),
    /// Placeholder template matched against the whole stem
    Template { source: String, compiled: Regex },
}

impl RulePattern {
    /// The pattern as the user wrote it
    pub fn source(&self) -> &str {
        match self {
            RulePattern::Regex(regex) => regex.as_str(),
            RulePattern::Template { source, .. } => source,
        }
    }

    /// Apply the pattern to a filename stem
    pub fn captures<'h>(&self, stem: &'h str) -> Option<Captures<'h>> {
        self.regex().captures(stem)
    }

    fn regex(&self) -> &Regex {
        match self {
            RulePattern::Regex(regex) => regex,
            RulePattern::Template { compiled, .. } => compiled,
        }
    }

    fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.regex().capture_names().flatten()
    }
}

/// One named capture feeding one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub capture: String,
    pub attribute: Attribute,
}

/// A validated filename-parsing rule
#[derive(Debug, Clone)]
pub struct ParsingRule {
    pub name: String,
    pub priority: i64,
    pub pattern: RulePattern,
    pub fields: Vec<FieldMapping>,
}

impl ParsingRule {
    /// Build a rule from a regular expression.
    ///
    /// `fields` maps capture names to attribute names; `None` maps every
    /// capture named after an attribute to that attribute.
    pub fn regex(
        name: impl Into<String>,
        priority: i64,
        pattern: &str,
        fields: Option<BTreeMap<String, String>>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if pattern.trim().is_empty() {
            return Err(ConfigurationError::EmptyPattern { rule: name });
        }

        let regex = Regex::new(pattern).map_err(|e| ConfigurationError::InvalidPattern {
            rule: name.clone(),
            reason: e.to_string(),
        })?;

        Self::build(name, priority, RulePattern::Regex(regex), fields)
    }

    /// Build a rule from a `{placeholder}` template
    pub fn template(
        name: impl Into<String>,
        priority: i64,
        template: &str,
        fields: Option<BTreeMap<String, String>>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if template.trim().is_empty() {
            return Err(ConfigurationError::EmptyPattern { rule: name });
        }

        let compiled = template::compile(&name, template)?;
        let pattern = RulePattern::Template {
            source: template.to_string(),
            compiled,
        };

        Self::build(name, priority, pattern, fields)
    }

    fn build(
        name: String,
        priority: i64,
        pattern: RulePattern,
        fields: Option<BTreeMap<String, String>>,
    ) -> Result<Self, ConfigurationError> {
        let captures: Vec<&str> = pattern.capture_names().collect();

        let fields = match fields {
            Some(explicit) => {
                let mut mapped = Vec::with_capacity(explicit.len());
                for (capture, attribute_name) in explicit {
                    let attribute = Attribute::from_name(&attribute_name).ok_or_else(|| {
                        ConfigurationError::UnknownAttribute {
                            rule: name.clone(),
                            attribute: attribute_name.clone(),
                        }
                    })?;
                    if !captures.contains(&capture.as_str()) {
                        return Err(ConfigurationError::MissingCapture {
                            rule: name.clone(),
                            capture,
                        });
                    }
                    mapped.push(FieldMapping { capture, attribute });
                }
                mapped
            }
            None => captures
                .iter()
                .filter_map(|capture| {
                    Attribute::from_name(capture).map(|attribute| FieldMapping {
                        capture: capture.to_string(),
                        attribute,
                    })
                })
                .collect(),
        };

        if fields.is_empty() {
            return Err(ConfigurationError::NoRecognisedAttribute { rule: name });
        }

        Ok(Self {
            name,
            priority,
            pattern,
            fields,
        })
    }
}

/// An ordered collection of parsing rules, highest priority first
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ParsingRule>,
}

impl RuleSet {
    /// Order rules by descending priority. Equal priorities keep the order
    /// they were given in.
    pub fn new(mut rules: Vec<ParsingRule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules }
    }

    /// Rules that only ever produce the fallback record
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules shipped with the application, used when no rule file exists
    pub fn builtin() -> Self {
        let rules = [
            (
                "[Author] Title 第N巻 (雑誌寄せ集め)",
                200,
                r"^\[(?P<author>.+?)\]\s*(?P<title>.+?)\s*第?(?P<volume>\d+)巻(?P<magazine_flag>\s*\(雑誌寄せ集め\))?",
            ),
            (
                "Title 第N巻 (Author) (雑誌寄せ集め)",
                100,
                r"^(?P<title>.+?)\s*第?(?P<volume>\d+)巻\s*\((?P<author>.+?)\)(?P<magazine_flag>\s*\(雑誌寄せ集め\))?",
            ),
        ];

        let mut built: Vec<ParsingRule> = rules
            .iter()
            .filter_map(|(name, priority, pattern)| {
                ParsingRule::regex(*name, *priority, pattern, None).ok()
            })
            .collect();

        built.extend(
            ParsingRule::template("Series - Vol.N - Author", 50, "{series} - Vol.{volume} - {author}", None).ok(),
        );

        Self::new(built)
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[ParsingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn attribute_names_accept_aliases() {
        assert_eq!(Attribute::from_name("originalAuthor"), Some(Attribute::OriginalAuthor));
        assert_eq!(Attribute::from_name("original_author"), Some(Attribute::OriginalAuthor));
        assert_eq!(Attribute::from_name("magazine_flag"), Some(Attribute::IsCollectionVolume));
        assert_eq!(Attribute::from_name("publisher"), None);
    }

    #[test]
    fn every_attribute_round_trips_its_name() {
        for attribute in Attribute::ALL {
            assert_eq!(Attribute::from_name(attribute.as_str()), Some(attribute));
        }
    }

    #[test]
    fn identity_mapping_picks_attribute_named_groups() {
        let rule = ParsingRule::regex("r", 1, r"(?P<title>.+) (?P<junk>x)", None).unwrap();

        assert_eq!(rule.fields.len(), 1);
        assert_eq!(rule.fields[0].attribute, Attribute::Title);
    }

    #[test]
    fn empty_pattern_is_rejected() {
        let result = ParsingRule::regex("blank", 1, "   ", None);
        assert!(matches!(result, Err(ConfigurationError::EmptyPattern { .. })));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let result = ParsingRule::regex("broken", 1, "(?P<title>", None);
        assert!(matches!(result, Err(ConfigurationError::InvalidPattern { .. })));
    }

    #[test]
    fn pattern_without_attributes_is_rejected() {
        let result = ParsingRule::regex("anonymous", 1, r"(\d+)", None);
        assert!(matches!(
            result,
            Err(ConfigurationError::NoRecognisedAttribute { .. })
        ));
    }

    #[test]
    fn explicit_unknown_attribute_is_rejected() {
        let result = ParsingRule::regex("r", 1, r"(?P<p>.+)", map(&[("p", "publisher")]));
        assert!(matches!(
            result,
            Err(ConfigurationError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn explicit_missing_capture_is_rejected() {
        let result = ParsingRule::regex("r", 1, r"(?P<t>.+)", map(&[("name", "title")]));
        assert!(matches!(
            result,
            Err(ConfigurationError::MissingCapture { .. })
        ));
    }

    #[test]
    fn rule_set_orders_by_descending_priority() {
        let low = ParsingRule::regex("low", 1, r"(?P<title>.+)", None).unwrap();
        let high = ParsingRule::regex("high", 10, r"(?P<title>.+)", None).unwrap();

        let set = RuleSet::new(vec![low, high]);

        let names: Vec<_> = set.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["high", "low"]);
    }

    #[test]
    fn equal_priorities_keep_declaration_order() {
        let first = ParsingRule::regex("first", 5, r"(?P<title>.+)", None).unwrap();
        let second = ParsingRule::regex("second", 5, r"(?P<series>.+)", None).unwrap();

        let set = RuleSet::new(vec![first, second]);

        assert_eq!(set.rules()[0].name, "first");
        assert_eq!(set.rules()[1].name, "second");
    }

    #[test]
    fn builtin_rules_all_compile() {
        let set = RuleSet::builtin();
        assert_eq!(set.len(), 3);
        assert!(set.rules()[0].priority > set.rules()[1].priority);
    }
}
