//! Rule tag parsing
//!
//! A tag such as `required,min=3,string,exists=users;mobile` is split on `,`
//! into segments that must all pass, and each segment on `|` into
//! alternatives of which one must pass.

use std::collections::HashMap;

use crate::errors::RuleError;

/// Keyword that stops a field's evaluation when its value is empty
pub const OMIT_EMPTY: &str = "omitempty";

/// A single rule invocation, `name` or `name=param`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCall {
    pub name: String,
    pub param: Option<String>,
}

/// A comma-separated piece of a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Tag reported when the segment fails
    pub tag: String,
    /// Param reported when the segment fails
    pub param: Option<String>,
    /// Alternatives, at least one of which must pass
    pub alternatives: Vec<RuleCall>,
}

impl Segment {
    /// Whether this segment is the `omitempty` keyword
    pub fn is_omit_empty(&self) -> bool {
        self.alternatives.len() == 1 && self.alternatives[0].name == OMIT_EMPTY
    }
}

fn parse_call(raw: &str) -> Result<RuleCall, RuleError> {
    let raw = raw.trim();
    let (name, param) = match raw.split_once('=') {
        Some((name, param)) => (name.trim(), Some(param.to_string())),
        None => (raw, None),
    };

    if name.is_empty() {
        return Err(RuleError::Misuse(format!("empty rule name in '{raw}'")));
    }

    Ok(RuleCall {
        name: name.to_string(),
        param,
    })
}

/// Parse a tag, expanding any aliases it names
pub fn parse_tag(tag: &str, aliases: &HashMap<String, String>) -> Result<Vec<Segment>, RuleError> {
    parse_with_depth(tag, aliases, 0)
}

fn parse_with_depth(
    tag: &str,
    aliases: &HashMap<String, String>,
    depth: usize,
) -> Result<Vec<Segment>, RuleError> {
    if depth > 8 {
        return Err(RuleError::Misuse(format!("alias expansion too deep in '{tag}'")));
    }

    let mut segments = Vec::new();

    for raw in tag.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RuleError::Misuse(format!("empty segment in tag '{tag}'")));
        }

        // A whole segment naming an alias expands in place, possibly into
        // several segments, all reported under the alias name
        if let Some(expansion) = aliases.get(raw) {
            for mut expanded in parse_with_depth(expansion, aliases, depth + 1)? {
                expanded.tag = raw.to_string();
                expanded.param = None;
                segments.push(expanded);
            }
            continue;
        }

        let mut alternatives = Vec::new();
        for part in raw.split('|') {
            let call = parse_call(part)?;
            match aliases.get(&call.name) {
                Some(expansion) if call.param.is_none() => {
                    let mut expanded = parse_with_depth(expansion, aliases, depth + 1)?;
                    if expanded.len() != 1 {
                        return Err(RuleError::Misuse(format!(
                            "alias '{}' cannot be used as an alternative",
                            call.name
                        )));
                    }
                    alternatives.append(&mut expanded[0].alternatives);
                }
                _ => alternatives.push(call),
            }
        }

        let (tag, param) = if alternatives.len() == 1 {
            (alternatives[0].name.clone(), alternatives[0].param.clone())
        } else {
            (raw.to_string(), None)
        };

        segments.push(Segment {
            tag,
            param,
            alternatives,
        });
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_aliases() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_parse_simple_tag() {
        let segments = parse_tag("required,min=3,exists=users;mobile", &no_aliases()).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].tag, "min");
        assert_eq!(segments[1].param.as_deref(), Some("3"));
        assert_eq!(
            segments[2].alternatives[0].param.as_deref(),
            Some("users;mobile")
        );
    }

    #[test]
    fn test_parse_alternatives() {
        let segments = parse_tag("email|mobile", &no_aliases()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].tag, "email|mobile");
        assert_eq!(segments[0].alternatives.len(), 2);
    }

    #[test]
    fn test_alias_expansion_reports_alias_name() {
        let mut aliases = HashMap::new();
        aliases.insert(
            "string".to_string(),
            "alphanumunicode|alphaunicode|ascii".to_string(),
        );

        let segments = parse_tag("required,string", &aliases).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].tag, "string");
        assert_eq!(segments[1].alternatives.len(), 3);
    }

    #[test]
    fn test_multi_segment_alias() {
        let mut aliases = HashMap::new();
        aliases.insert("username".to_string(), "min=3,max=20".to_string());

        let segments = parse_tag("username", &aliases).unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.tag == "username"));

        assert!(parse_tag("email|username", &aliases).is_err());
    }

    #[test]
    fn test_malformed_tags() {
        assert!(parse_tag("required,,min=1", &no_aliases()).is_err());
        assert!(parse_tag("=5", &no_aliases()).is_err());
        assert!(parse_tag("", &no_aliases()).is_err());
    }

    #[test]
    fn test_self_referencing_alias_is_rejected() {
        let mut aliases = HashMap::new();
        aliases.insert("loop".to_string(), "loop".to_string());
        assert!(parse_tag("loop", &aliases).is_err());
    }

    #[test]
    fn test_omit_empty_segment() {
        let segments = parse_tag("omitempty,email", &no_aliases()).unwrap();
        assert!(segments[0].is_omit_empty());
        assert!(!segments[1].is_omit_empty());
    }
}
