// Tag-driven role narrowing for the interactive selector
//
// Input is a whitespace separated list of `Key:Value` tokens. Every token
// but the last is confirmed and narrows the candidate roles; the last one is
// still being typed unless the input ends in whitespace.
pub mod prompt;

use crate::arn::{make_role_arn, parse_role_arn};
use crate::catalog::{Predicate, RoleCatalog, RoleTags, TagIndex};
use crate::error::{Result, SsoError};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// Bare token that abandons the selection
pub const CANCEL_TOKEN: &str = "exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// ARN of the chosen role
    Role(String),
    Cancelled,
}

/// The token under the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
enum Partial {
    None,
    Key(String),
    Value { key: String, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Parsed {
    predicate: Predicate,
    /// Role named directly by ARN
    pinned: Option<String>,
    partial: Partial,
}

/// A tag key that would split the current candidates
struct KeyChoice<'a> {
    key: &'a str,
    values: usize,
    roles: usize,
}

pub struct NarrowingEngine {
    roles: RoleTags,
    index: TagIndex,
    labels: BTreeMap<String, String>,
}

impl NarrowingEngine {
    /// `labels` maps role ARNs to the text shown when a single role remains
    pub fn new(roles: RoleTags, labels: BTreeMap<String, String>) -> Self {
        let index = roles.tag_index(&Predicate::new());
        Self {
            roles,
            index,
            labels,
        }
    }

    pub fn from_catalog(catalog: &RoleCatalog) -> Self {
        let labels = catalog
            .all_roles()
            .map(|role| (role.arn(), catalog.profile_name(role)))
            .collect();
        Self::new(catalog.select_role_tags(), labels)
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    fn parse(&self, input: &str, confirm_all: bool) -> Parsed {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        let typing = !confirm_all && !input.is_empty() && !input.ends_with(char::is_whitespace);

        let (confirmed, current) = match tokens.split_last() {
            Some((last, rest)) if typing => (rest, Some(*last)),
            _ => (tokens.as_slice(), None),
        };

        let mut predicate = Predicate::new();
        let mut pinned = None;
        for token in confirmed {
            self.confirm(token, &mut predicate, &mut pinned);
        }

        let partial = match current {
            None => Partial::None,
            Some(token) => match token.split_once(':') {
                Some((key, text)) => Partial::Value {
                    key: key.to_string(),
                    text: text.to_string(),
                },
                None => Partial::Key(token.to_string()),
            },
        };

        Parsed {
            predicate,
            pinned,
            partial,
        }
    }

    fn confirm(&self, token: &str, predicate: &mut Predicate, pinned: &mut Option<String>) {
        if let Some((key, value)) = token.split_once(':') {
            if self.index.contains_key(key) {
                predicate.insert(key.to_string(), value.to_string());
                return;
            }
        }

        if let Ok((account_id, role_name)) = parse_role_arn(token) {
            let arn = make_role_arn(account_id, &role_name);
            if self.roles.contains(&arn) {
                *pinned = Some(arn);
                return;
            }
        }

        match token.split_once(':') {
            // unknown keys still constrain, so they yield no match
            Some((key, value)) => {
                predicate.insert(key.to_string(), value.to_string());
            }
            None => tracing::debug!("Ignoring incomplete selector token '{}'", token),
        }
    }

    fn matching(&self, predicate: &Predicate, pinned: Option<&str>) -> Vec<String> {
        let mut roles = self.roles.matching_roles(predicate);
        if let Some(pinned) = pinned {
            roles.retain(|arn| arn == pinned);
        }
        roles
    }

    fn count_with(&self, parsed: &Parsed, key: &str, value: &str) -> Vec<String> {
        let mut predicate = parsed.predicate.clone();
        predicate.insert(key.to_string(), value.to_string());
        self.matching(&predicate, parsed.pinned.as_deref())
    }

    /// Keys not yet constrained that would reduce `current` candidates
    fn useful_keys(&self, parsed: &Parsed, current: usize) -> Vec<KeyChoice<'_>> {
        let mut choices: Vec<KeyChoice<'_>> = self
            .index
            .iter()
            .filter(|(key, _)| !parsed.predicate.contains_key(*key))
            .filter_map(|(key, values)| {
                let counts: Vec<usize> = values
                    .iter()
                    .map(|value| self.count_with(parsed, key, value).len())
                    .filter(|n| *n > 0)
                    .collect();
                if !counts.iter().any(|n| *n < current) {
                    return None;
                }
                let roles = self
                    .roles
                    .possible_unique_roles(&parsed.predicate, key, values)
                    .into_iter()
                    .filter(|arn| parsed.pinned.as_deref().map_or(true, |p| p == arn))
                    .count();
                Some(KeyChoice {
                    key,
                    values: counts.len(),
                    roles,
                })
            })
            .collect();

        choices.sort_by_key(|c| (Reverse(c.values), c.key));
        choices
    }

    fn label(&self, arn: &str) -> String {
        self.labels
            .get(arn)
            .cloned()
            .unwrap_or_else(|| arn.to_string())
    }

    fn suggest_values(&self, parsed: &Parsed, key: &str, text: &str) -> Vec<Suggestion> {
        let needle = text.to_lowercase();
        self.index
            .get(key)
            .iter()
            .filter(|value| value.to_lowercase().contains(&needle))
            .filter_map(|value| {
                let roles = self.count_with(parsed, key, value);
                let description = match roles.as_slice() {
                    [] => return None,
                    [only] => self.label(only),
                    many => format!("{} roles", many.len()),
                };
                Some(Suggestion {
                    text: format!("{}:{}", key, value),
                    description,
                })
            })
            .collect()
    }

    /// Completions for `input`, best first. Empty once the input already
    /// identifies exactly one role or nothing can match.
    pub fn suggest(&self, input: &str) -> Vec<Suggestion> {
        let parsed = self.parse(input, false);
        let current = self.matching(&parsed.predicate, parsed.pinned.as_deref());
        if current.len() <= 1 {
            return Vec::new();
        }

        match &parsed.partial {
            Partial::None => {
                let keys = self.useful_keys(&parsed, current.len());
                if keys.is_empty() {
                    // no tag splits the rest, so offer the roles themselves
                    return current
                        .into_iter()
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .map(|arn| Suggestion {
                            description: self.label(&arn),
                            text: arn,
                        })
                        .collect();
                }
                keys.into_iter()
                    .map(|c| Suggestion {
                        text: format!("{}:", c.key),
                        description: format!("{} roles/{} choices", c.roles, c.values),
                    })
                    .collect()
            }
            Partial::Key(text) => {
                if self.index.contains_key(text) && !parsed.predicate.contains_key(text) {
                    return self.suggest_values(&parsed, text, "");
                }
                let needle = text.to_lowercase();
                self.useful_keys(&parsed, current.len())
                    .into_iter()
                    .filter(|c| c.key.to_lowercase().contains(&needle))
                    .map(|c| Suggestion {
                        text: format!("{}:", c.key),
                        description: format!("{} choices", c.values),
                    })
                    .collect()
            }
            Partial::Value { key, text } => {
                if parsed.predicate.contains_key(key) {
                    return Vec::new();
                }
                self.suggest_values(&parsed, key, text)
            }
        }
    }

    /// Resolve a complete input to one role, treating every token as
    /// confirmed
    pub fn resolve(&self, input: &str) -> Result<Selection> {
        if input.split_whitespace().any(|t| t == CANCEL_TOKEN) {
            return Ok(Selection::Cancelled);
        }

        let parsed = self.parse(input, true);
        let matches = self.matching(&parsed.predicate, parsed.pinned.as_deref());
        match matches.len() {
            0 => Err(SsoError::NoMatch),
            1 => Ok(Selection::Role(matches.into_iter().next().unwrap_or_default())),
            count => Err(SsoError::AmbiguousSelection { count }),
        }
    }
}

/// Replace the token being typed with `suggestion`. Keys stay open for a
/// value; complete tokens get a trailing separator.
pub fn apply_suggestion(input: &str, suggestion: &Suggestion) -> String {
    let base = input.trim_end_matches(|c: char| !c.is_whitespace());

    let mut out = format!("{}{}", base, suggestion.text);
    if !suggestion.text.ends_with(':') {
        out.push(' ');
    }
    out
}
