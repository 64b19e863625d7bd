//! Loads rule files (JSON) into a validated, ordered [`RuleSet`].

use super::{ParsingRule, RuleSet};
use crate::error::ConfigurationError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// A rule exactly as written in the rule file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    regex: Option<String>,
    #[serde(default)]
    template: Option<String>,
    priority: i64,
    #[serde(default)]
    fields: Option<BTreeMap<String, String>>,
}

impl RawRule {
    fn into_rule(self, index: usize) -> Result<ParsingRule, ConfigurationError> {
        let name = self.name.unwrap_or_else(|| format!("rule #{}", index + 1));

        match (self.regex, self.template) {
            (Some(regex), None) => ParsingRule::regex(name, self.priority, &regex, self.fields),
            (None, Some(template)) => {
                ParsingRule::template(name, self.priority, &template, self.fields)
            }
            _ => Err(ConfigurationError::AmbiguousPattern { rule: name }),
        }
    }
}

impl RuleSet {
    /// Parse and validate a JSON array of rules.
    ///
    /// `origin` names the source in error messages.
    pub fn from_json_str(origin: &str, json: &str) -> Result<Self, ConfigurationError> {
        let raw: Vec<RawRule> =
            serde_json::from_str(json).map_err(|e| ConfigurationError::Malformed {
                origin: origin.to_string(),
                reason: e.to_string(),
            })?;

        let rules = raw
            .into_iter()
            .enumerate()
            .map(|(index, rule)| rule.into_rule(index))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(origin, count = rules.len(), "parsed rule definitions");
        Ok(Self::new(rules))
    }

    /// Load rules from a JSON file. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigurationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let rules = Self::from_json_str(&path.display().to_string(), &json)?;
        info!(path = %path.display(), count = rules.len(), "loaded parsing rules");
        Ok(rules)
    }

    /// Load rules from `path`, or the built-in rules if no file exists there.
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_builtin(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.exists() {
            info!(path = %path.display(), "no rule file found, using built-in rules");
            return Ok(Self::builtin());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rules::{Attribute, RulePattern};
    use tempfile::TempDir;

    #[test]
    fn parses_regex_and_template_rules() {
        let json = r#"[
            {"name": "plain", "regex": "(?P<title>.+)", "priority": 1},
            {"name": "volumes", "template": "{series} v{volume}", "priority": 5}
        ]"#;

        let set = RuleSet::from_json_str("inline", json).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.rules()[0].name, "volumes");
        assert!(matches!(set.rules()[0].pattern, RulePattern::Template { .. }));
        assert!(matches!(set.rules()[1].pattern, RulePattern::Regex(_)));
    }

    #[test]
    fn explicit_fields_are_used() {
        let json = r#"[{"regex": "(?P<who>.+)", "priority": 1, "fields": {"who": "author"}}]"#;

        let set = RuleSet::from_json_str("inline", json).unwrap();

        assert_eq!(set.rules()[0].fields[0].attribute, Attribute::Author);
        assert_eq!(set.rules()[0].name, "rule #1");
    }

    #[test]
    fn missing_priority_is_malformed() {
        let json = r#"[{"regex": "(?P<title>.+)"}]"#;
        let result = RuleSet::from_json_str("inline", json);
        assert!(matches!(result, Err(ConfigurationError::Malformed { .. })));
    }

    #[test]
    fn unknown_keys_are_malformed() {
        let json = r#"[{"regex": "(?P<title>.+)", "priority": 1, "prio": 2}]"#;
        let result = RuleSet::from_json_str("inline", json);
        assert!(matches!(result, Err(ConfigurationError::Malformed { .. })));
    }

    #[test]
    fn both_pattern_kinds_is_ambiguous() {
        let json = r#"[{"regex": "(?P<title>.+)", "template": "{title}", "priority": 1}]"#;
        let result = RuleSet::from_json_str("inline", json);
        assert!(matches!(
            result,
            Err(ConfigurationError::AmbiguousPattern { .. })
        ));
    }

    #[test]
    fn neither_pattern_kind_is_ambiguous() {
        let json = r#"[{"name": "nothing", "priority": 1}]"#;
        let result = RuleSet::from_json_str("inline", json);
        assert!(matches!(
            result,
            Err(ConfigurationError::AmbiguousPattern { .. })
        ));
    }

    #[test]
    fn empty_array_gives_fallback_only_rule_set() {
        let set = RuleSet::from_json_str("inline", "[]").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn missing_file_is_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let result = RuleSet::load(&temp_dir.path().join("rules.json"));
        assert!(matches!(result, Err(ConfigurationError::Unreadable { .. })));
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let set = RuleSet::load_or_builtin(&temp_dir.path().join("rules.json")).unwrap();
        assert_eq!(set.len(), RuleSet::builtin().len());
    }

    #[test]
    fn present_but_broken_file_is_still_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rules.json");
        fs::write(&path, "{not json").unwrap();

        assert!(RuleSet::load_or_builtin(&path).is_err());
    }
}
