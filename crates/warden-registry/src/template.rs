//! Resource template patterns.
//!
//! A pattern such as `weather://{city}/{date}/past_weather` is compiled into
//! an anchored regular expression in which every placeholder matches one or
//! more characters other than `/`. Placeholder names must be identifiers and
//! may appear only once per pattern.

use std::collections::BTreeMap;

use regex::Regex;

use warden_contracts::error::{GateError, GateResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A compiled resource template pattern.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    pattern: String,
    segments: Vec<Segment>,
    placeholders: Vec<String>,
    matcher: Regex,
}

impl UriTemplate {
    /// Compile `pattern`.
    ///
    /// Returns `GateError::InvalidTemplate` for unbalanced braces, an empty
    /// or non-identifier placeholder name, a repeated name, or a pattern with
    /// no placeholders at all (that is a plain resource).
    pub fn parse(pattern: &str) -> GateResult<Self> {
        let invalid = |reason: String| GateError::InvalidTemplate {
            pattern: pattern.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut placeholders: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        match n {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(invalid("nested '{' in placeholder".to_string())),
                            other => name.push(other),
                        }
                    }
                    if !closed {
                        return Err(invalid("unclosed '{'".to_string()));
                    }
                    if !is_identifier(&name) {
                        return Err(invalid(format!("'{name}' is not a valid placeholder name")));
                    }
                    if placeholders.contains(&name) {
                        return Err(invalid(format!("placeholder '{name}' appears more than once")));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    placeholders.push(name.clone());
                    segments.push(Segment::Placeholder(name));
                }
                '}' => return Err(invalid("unmatched '}'".to_string())),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        if placeholders.is_empty() {
            return Err(invalid("template has no placeholders".to_string()));
        }

        let mut expr = String::from("^");
        for segment in &segments {
            match segment {
                Segment::Literal(text) => expr.push_str(&regex::escape(text)),
                Segment::Placeholder(name) => {
                    expr.push_str("(?P<");
                    expr.push_str(name);
                    expr.push_str(">[^/]+)");
                }
            }
        }
        expr.push('$');

        let matcher = Regex::new(&expr).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            placeholders,
            matcher,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Placeholder names in the order they appear.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Match a concrete URI, returning placeholder → matched text.
    pub fn match_uri(&self, uri: &str) -> Option<BTreeMap<String, String>> {
        let captures = self.matcher.captures(uri)?;
        let bindings = self
            .placeholders
            .iter()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.clone(), m.as_str().to_string()))
            })
            .collect();
        Some(bindings)
    }

    /// Substitute `bindings` into the pattern. `None` if any placeholder is
    /// unbound.
    pub fn expand(&self, bindings: &BTreeMap<String, String>) -> Option<String> {
        let mut uri = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => uri.push_str(text),
                Segment::Placeholder(name) => uri.push_str(bindings.get(name)?),
            }
        }
        Some(uri)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use warden_contracts::error::GateError;

    use super::UriTemplate;

    #[test]
    fn extracts_single_binding() {
        let t = UriTemplate::parse("weather://{city}/current").unwrap();
        let bindings = t.match_uri("weather://london/current").unwrap();
        assert_eq!(bindings.get("city").map(String::as_str), Some("london"));
    }

    #[test]
    fn placeholder_does_not_cross_slash() {
        let t = UriTemplate::parse("weather://{city}/current").unwrap();
        assert!(t.match_uri("weather://new/york/current").is_none());
        assert!(t.match_uri("weather:///current").is_none());
    }

    #[test]
    fn match_is_anchored() {
        let t = UriTemplate::parse("a/{x}/current").unwrap();
        assert!(t.match_uri("a/london/current/extra").is_none());
        assert!(t.match_uri("prefix/a/london/current").is_none());
    }

    #[test]
    fn literal_regex_characters_are_escaped() {
        let t = UriTemplate::parse("files://{name}.txt").unwrap();
        assert!(t.match_uri("files://notes.txt").is_some());
        assert!(t.match_uri("files://notesXtxt").is_none());
    }

    /// Bindings substituted back into the pattern reproduce the input URI.
    #[test]
    fn expand_reproduces_matched_uri() {
        let cases = [
            ("weather://{city}/current", "weather://london/current"),
            ("weather://{city}/{date}/past_weather", "weather://oslo/2024-01-02/past_weather"),
            ("{scheme}://{host}", "https://example.org"),
            ("repo://{owner}-{name}", "repo://rust-lang-regex"),
        ];
        for (pattern, uri) in cases {
            let t = UriTemplate::parse(pattern).unwrap();
            let bindings = t.match_uri(uri).unwrap_or_else(|| panic!("{pattern} should match {uri}"));
            assert_eq!(t.expand(&bindings).as_deref(), Some(uri), "pattern {pattern}");
        }
    }

    #[test]
    fn expand_with_missing_binding_is_none() {
        let t = UriTemplate::parse("weather://{city}/current").unwrap();
        assert_eq!(t.expand(&BTreeMap::new()), None);
    }

    #[test]
    fn rejects_malformed_patterns() {
        for pattern in [
            "weather://{city/current",
            "weather://city}/current",
            "weather://{}/current",
            "weather://{1city}/current",
            "weather://{a{b}}/current",
            "weather://{city}/{city}",
            "weather://london/current",
        ] {
            match UriTemplate::parse(pattern) {
                Err(GateError::InvalidTemplate { pattern: p, .. }) => assert_eq!(p, pattern),
                other => panic!("expected InvalidTemplate for {pattern}, got {:?}", other),
            }
        }
    }

    #[test]
    fn placeholders_keep_pattern_order() {
        let t = UriTemplate::parse("weather://{city}/{date}/past_weather").unwrap();
        assert_eq!(t.placeholders(), ["city".to_string(), "date".to_string()]);
    }
}
