use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Error;

/// Wildcard bindings captured by matching a concrete topic against a
/// pattern, keyed by placeholder name.
pub type Bindings = HashMap<String, String>;

lazy_static! {
    /// The topic rule grammar. Only consulted for rules that contain
    /// placeholders; a static rule is any non-empty string.
    static ref RULE_GRAMMAR: Regex =
        Regex::new(r"^(?:/?(?:(?:(?:\{[^{}/]+\})|(?:[^{}/]+))+/?)+)/?$").expect("grammar regex");
    /// A `{wN}` or `{WN}` placeholder token.
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([wW][0-9]+)\}").expect("placeholder regex");
}

const SINGLE_LEVEL_PATTERN: &str = r"[^/]+";
const MULTI_LEVEL_PATTERN: &str = r"(.+)+?";

/// Whether `rule` satisfies the topic rule grammar. `TopicPattern::new`
/// applies this only to rules with placeholders; the config layer holds
/// every declared source and sink to it.
pub(crate) fn satisfies_grammar(rule: &str) -> bool {
    RULE_GRAMMAR.is_match(rule)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// `{wN}`: matches exactly one path segment.
    SingleLevel,
    /// `{WN}`: matches one or more segments, separators included.
    MultiLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub kind: PlaceholderKind,
}

/// One named capture group in the compiled regex. Repeated placeholder
/// names compile to distinct suffixed groups sharing a base name; after a
/// match, all groups with the same base must have captured equal text.
#[derive(Debug, Clone)]
struct CaptureGroup {
    regex_name: String,
    base: String,
}

#[derive(Debug, Clone)]
struct Matcher {
    regex: Regex,
    groups: Vec<CaptureGroup>,
    placeholders: Vec<Placeholder>,
}

/// A topic rule: either a static topic name or a pattern with `{wN}` /
/// `{WN}` placeholders. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct TopicPattern {
    rule: String,
    matcher: Option<Matcher>,
}

impl TopicPattern {
    /// Parses a rule string. Rules containing `{` must satisfy the topic
    /// rule grammar; anything else is taken as a static topic name.
    pub fn new(rule: &str) -> Result<Self, Error> {
        if rule.is_empty() {
            return Err(Error::InvalidTopic(rule.to_string()));
        }

        if !rule.contains('{') {
            return Ok(Self {
                rule: rule.to_string(),
                matcher: None,
            });
        }

        if !RULE_GRAMMAR.is_match(rule) {
            return Err(Error::InvalidTopic(rule.to_string()));
        }

        let matcher = compile_rule(rule).ok_or_else(|| Error::InvalidTopic(rule.to_string()))?;
        Ok(Self {
            rule: rule.to_string(),
            matcher: Some(matcher),
        })
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// True when the rule contains no placeholders; all queries degrade
    /// to string equality.
    pub fn is_static(&self) -> bool {
        self.matcher.is_none()
    }

    /// The placeholders of this rule in order of first occurrence.
    pub fn placeholders(&self) -> &[Placeholder] {
        self.matcher
            .as_ref()
            .map(|m| m.placeholders.as_slice())
            .unwrap_or(&[])
    }

    /// Renders the rule in MQTT subscription syntax: `{wN}` becomes `+`
    /// and `{WN}` becomes `#`. Static rules are returned verbatim.
    ///
    /// A `{WN}` that is not the final segment renders as a non-trailing
    /// `#`, which brokers may reject; placement is the caller's concern.
    pub fn subscription_filter(&self) -> String {
        let mut filter = self.rule.clone();
        for placeholder in self.placeholders() {
            let token = format!("{{{}}}", placeholder.name);
            let wildcard = match placeholder.kind {
                PlaceholderKind::SingleLevel => "+",
                PlaceholderKind::MultiLevel => "#",
            };
            filter = filter.replace(&token, wildcard);
        }
        filter
    }

    /// Matches a concrete topic against this pattern, returning the
    /// captured bindings, or `None` when the topic does not match. Static
    /// patterns match only their exact rule and capture nothing.
    pub fn matches(&self, concrete: &TopicPattern) -> Option<Bindings> {
        let matcher = match &self.matcher {
            None => {
                return (self.rule == concrete.rule).then(Bindings::new);
            }
            Some(matcher) => matcher,
        };

        let captures = matcher.regex.captures(concrete.rule())?;

        let mut bindings = Bindings::new();
        for group in &matcher.groups {
            let text = captures.name(&group.regex_name)?.as_str();
            match bindings.get(&group.base) {
                // A repeated name must capture the same text everywhere.
                Some(first) if first != text => return None,
                Some(_) => {}
                None => {
                    bindings.insert(group.base.clone(), text.to_string());
                }
            }
        }
        Some(bindings)
    }

    /// Builds a concrete sink topic: extracts bindings by matching
    /// `extract_from` against this pattern, then substitutes them into
    /// `embed_into`. For static patterns `embed_into` is returned
    /// unchanged.
    pub fn compose(
        &self,
        extract_from: &TopicPattern,
        embed_into: &TopicPattern,
    ) -> Result<TopicPattern, Error> {
        if self.is_static() {
            return Ok(embed_into.clone());
        }

        let bindings = self
            .matches(extract_from)
            .ok_or_else(|| Error::CompositionMismatch {
                pattern: self.rule.clone(),
                topic: extract_from.rule().to_string(),
            })?;

        let mut sink = embed_into.rule().to_string();
        for (name, value) in &bindings {
            sink = sink.replace(&format!("{{{name}}}"), value);
        }

        if let Some(unbound) = PLACEHOLDER.captures(&sink) {
            return Err(Error::UnboundSinkPlaceholder {
                template: embed_into.rule().to_string(),
                placeholder: unbound[1].to_string(),
            });
        }

        TopicPattern::new(&sink)
    }
}

/// Compiles a placeholder rule into an anchored regex with one named
/// group per placeholder occurrence. Literal text is regex-escaped and
/// levels are joined with `\/`.
fn compile_rule(rule: &str) -> Option<Matcher> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut groups = Vec::new();
    let mut placeholders = Vec::new();
    let mut levels = Vec::new();

    for level in rule.split('/') {
        let mut pattern = String::new();
        let mut rest = 0;
        for token in PLACEHOLDER.captures_iter(level) {
            let whole = token.get(0)?;
            let name = &token[1];
            pattern.push_str(&regex::escape(&level[rest..whole.start()]));
            rest = whole.end();

            let kind = if name.starts_with('W') {
                PlaceholderKind::MultiLevel
            } else {
                PlaceholderKind::SingleLevel
            };
            let sub_pattern = match kind {
                PlaceholderKind::SingleLevel => SINGLE_LEVEL_PATTERN,
                PlaceholderKind::MultiLevel => MULTI_LEVEL_PATTERN,
            };

            let occurrence = seen.entry(name.to_string()).or_insert(0);
            *occurrence += 1;
            let regex_name = if *occurrence == 1 {
                placeholders.push(Placeholder {
                    name: name.to_string(),
                    kind,
                });
                name.to_string()
            } else {
                format!("{name}_{occurrence}")
            };

            pattern.push_str(&format!("(?P<{regex_name}>{sub_pattern})"));
            groups.push(CaptureGroup {
                regex_name,
                base: name.to_string(),
            });
        }
        pattern.push_str(&regex::escape(&level[rest..]));
        levels.push(pattern);
    }

    let regex = Regex::new(&format!("^{}$", levels.join(r"\/"))).ok()?;
    Some(Matcher {
        regex,
        groups,
        placeholders,
    })
}

impl PartialEq for TopicPattern {
    fn eq(&self, other: &Self) -> bool {
        self.rule == other.rule && self.is_static() == other.is_static()
    }
}

impl Eq for TopicPattern {}

impl Hash for TopicPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rule.hash(state);
        self.is_static().hash(state);
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rule)
    }
}

impl FromStr for TopicPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TopicPattern::new(s)
    }
}

impl<'de> serde::Deserialize<'de> for TopicPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::Deserialize;
        let rule = String::deserialize(deserializer)?;
        rule.parse().map_err(serde::de::Error::custom)
    }
}
