//! Compiles `{placeholder}` templates into anchored regular expressions.
//!
//! `"{series} - Vol.{volume} - {author}"` becomes
//! `^(?P<series>.+?)\s+-\s+Vol\.(?P<volume>\d+)\s+-\s+(?P<author>.+?)$`.

use super::Attribute;
use crate::error::ConfigurationError;
use regex::Regex;

pub(super) fn compile(rule: &str, template: &str) -> Result<Regex, ConfigurationError> {
    let invalid = |reason: &str| ConfigurationError::InvalidPattern {
        rule: rule.to_string(),
        reason: reason.to_string(),
    };

    let mut pattern = String::from("^");
    let mut chars = template.trim().chars();
    let mut in_whitespace = false;

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(invalid("unclosed '{' placeholder"));
                }

                let attribute = Attribute::from_name(&name).ok_or_else(|| {
                    ConfigurationError::UnknownAttribute {
                        rule: rule.to_string(),
                        attribute: name.clone(),
                    }
                })?;
                pattern.push_str(&placeholder(attribute));
                in_whitespace = false;
            }
            '}' => return Err(invalid("'}' without matching '{'")),
            c if c.is_whitespace() => {
                if !in_whitespace {
                    pattern.push_str(r"\s+");
                    in_whitespace = true;
                }
            }
            c => {
                let mut buf = [0u8; 4];
                pattern.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                in_whitespace = false;
            }
        }
    }

    pattern.push('$');

    Regex::new(&pattern).map_err(|e| ConfigurationError::InvalidPattern {
        rule: rule.to_string(),
        reason: e.to_string(),
    })
}

fn placeholder(attribute: Attribute) -> String {
    let body = if attribute.is_numeric() { r"\d+" } else { ".+?" };
    format!("(?P<{}>{})", attribute.as_str(), body)
}
