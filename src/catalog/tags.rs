// Tag index and exact tag matching
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Every value observed for each tag key, kept sorted and deduplicated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagIndex(BTreeMap<String, Vec<String>>);

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key` unless it is already present
    pub fn add(&mut self, key: &str, value: &str) {
        let values = self.0.entry(key.to_string()).or_default();
        if let Err(pos) = values.binary_search_by(|v| v.as_str().cmp(value)) {
            values.insert(pos, value.to_string());
        }
    }

    pub fn add_tags(&mut self, tags: &BTreeMap<String, String>) {
        for (key, value) in tags {
            self.add(key, value);
        }
    }

    pub fn merge(&mut self, other: &TagIndex) {
        for (key, values) in &other.0 {
            for value in values {
                self.add(key, value);
            }
        }
    }

    /// Values for `key`, empty if the key was never seen
    pub fn get(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// A partial tag key/value mapping used to filter roles
pub type Predicate = BTreeMap<String, String>;

/// Tag sets keyed by role ARN; the matcher runs over this view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleTags(BTreeMap<String, BTreeMap<String, String>>);

impl RoleTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, arn: String, tags: BTreeMap<String, String>) {
        self.0.insert(arn, tags);
    }

    pub fn get(&self, arn: &str) -> Option<&BTreeMap<String, String>> {
        self.0.get(arn)
    }

    pub fn contains(&self, arn: &str) -> bool {
        self.0.contains_key(arn)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// ARNs of every role whose tags are a superset of `predicate`.
    /// An empty predicate matches every role.
    pub fn matching_roles(&self, predicate: &Predicate) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, tags)| Self::matches(tags, predicate))
            .map(|(arn, _)| arn.clone())
            .collect()
    }

    pub fn match_count(&self, predicate: &Predicate) -> usize {
        self.0
            .values()
            .filter(|tags| Self::matches(tags, predicate))
            .count()
    }

    /// Union of roles reachable by adding `key` with any of `values` to
    /// `predicate`. Empty when `key` is already constrained.
    pub fn possible_unique_roles(
        &self,
        predicate: &Predicate,
        key: &str,
        values: &[String],
    ) -> BTreeSet<String> {
        let mut roles = BTreeSet::new();
        if predicate.contains_key(key) {
            return roles;
        }

        let mut candidate = predicate.clone();
        for value in values {
            candidate.insert(key.to_string(), value.clone());
            roles.extend(self.matching_roles(&candidate));
        }
        roles
    }

    /// Index of all tags carried by the roles matching `predicate`
    pub fn tag_index(&self, predicate: &Predicate) -> TagIndex {
        let mut index = TagIndex::new();
        for tags in self.0.values() {
            if Self::matches(tags, predicate) {
                index.add_tags(tags);
            }
        }
        index
    }

    fn matches(tags: &BTreeMap<String, String>, predicate: &Predicate) -> bool {
        predicate
            .iter()
            .all(|(key, value)| tags.get(key) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample() -> RoleTags {
        let mut roles = RoleTags::new();
        roles.insert("arn:a".into(), tags(&[("Env", "prod"), ("Team", "a")]));
        roles.insert("arn:b".into(), tags(&[("Env", "prod"), ("Team", "b")]));
        roles.insert("arn:c".into(), tags(&[("Env", "dev")]));
        roles
    }

    #[test]
    fn test_add_keeps_values_sorted_and_unique() {
        let mut index = TagIndex::new();
        for value in ["m", "c", "x", "a", "c", "m"] {
            index.add("Key", value);
        }
        assert_eq!(index.get("Key"), &["a", "c", "m", "x"]);

        let before = index.clone();
        index.add("Key", "x");
        assert_eq!(index, before);
    }

    #[test]
    fn test_add_is_case_sensitive() {
        let mut index = TagIndex::new();
        index.add("Env", "prod");
        index.add("Env", "Prod");
        assert_eq!(index.get("Env"), &["Prod", "prod"]);
        assert!(index.get("env").is_empty());
    }

    #[test]
    fn test_merge_is_union() {
        let mut left = TagIndex::new();
        left.add("Env", "prod");
        left.add("Team", "a");

        let mut right = TagIndex::new();
        right.add("Env", "dev");
        right.add("Env", "prod");
        right.add("Owner", "ops");

        left.merge(&right);
        assert_eq!(left.get("Env"), &["dev", "prod"]);
        assert_eq!(left.get("Team"), &["a"]);
        assert_eq!(left.get("Owner"), &["ops"]);
    }

    #[test]
    fn test_matching_is_exact_superset() {
        let roles = sample();

        assert_eq!(roles.match_count(&Predicate::new()), 3);
        assert_eq!(
            roles.matching_roles(&tags(&[("Env", "prod")])),
            vec!["arn:a", "arn:b"]
        );
        assert_eq!(
            roles.matching_roles(&tags(&[("Env", "prod"), ("Team", "b")])),
            vec!["arn:b"]
        );
        // arn:c lacks Team entirely, so it must never match a Team predicate
        assert!(roles
            .matching_roles(&tags(&[("Env", "dev"), ("Team", "a")]))
            .is_empty());
        assert_eq!(roles.match_count(&tags(&[("Env", "Prod")])), 0);
    }

    #[test]
    fn test_possible_unique_roles() {
        let roles = sample();
        let values = vec!["a".to_string(), "b".to_string()];

        let possible = roles.possible_unique_roles(&Predicate::new(), "Team", &values);
        assert_eq!(possible.len(), 2);

        let constrained = tags(&[("Team", "a")]);
        assert!(roles
            .possible_unique_roles(&constrained, "Team", &values)
            .is_empty());
    }

    #[test]
    fn test_tag_index_for_predicate() {
        let roles = sample();
        let index = roles.tag_index(&tags(&[("Env", "prod")]));
        assert_eq!(index.get("Env"), &["prod"]);
        assert_eq!(index.get("Team"), &["a", "b"]);
    }
}
