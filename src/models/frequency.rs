use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// First-class frequency counter over string keys.
///
/// `most_common` is deterministic: ties break on the key so repeated runs
/// over the same input produce the same ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyMap {
    counts: HashMap<String, u32>,
}

impl FrequencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the count for a key.
    pub fn bump(&mut self, key: impl Into<String>) {
        *self.counts.entry(key.into()).or_insert(0) += 1;
    }

    /// Increments the count for every key in the iterator.
    pub fn extend<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            self.bump(key);
        }
    }

    /// Adds another map's counts into this one.
    pub fn merge(&mut self, other: &FrequencyMap) {
        for (key, count) in &other.counts {
            *self.counts.entry(key.clone()).or_insert(0) += count;
        }
    }

    pub fn get(&self, key: &str) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().map(|&c| c as u64).sum()
    }

    /// The `n` highest-count entries, count descending then key ascending.
    pub fn most_common(&self, n: usize) -> Vec<(String, u32)> {
        let mut entries: Vec<(String, u32)> = self
            .counts
            .iter()
            .map(|(k, &v)| (k.clone(), v))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }

    /// Keys of the `n` highest-count entries
    pub fn top_keys(&self, n: usize) -> Vec<String> {
        self.most_common(n).into_iter().map(|(k, _)| k).collect()
    }
}

impl<S: Into<String>> FromIterator<S> for FrequencyMap {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut map = FrequencyMap::new();
        map.extend(iter);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_and_get() {
        let mut map = FrequencyMap::new();
        map.bump("shoegaze");
        map.bump("shoegaze");
        map.bump("dream pop");
        assert_eq!(map.get("shoegaze"), 2);
        assert_eq!(map.get("dream pop"), 1);
        assert_eq!(map.get("zydeco"), 0);
        assert_eq!(map.len(), 2);
        assert_eq!(map.total(), 3);
    }

    #[test]
    fn test_most_common_orders_by_count_then_key() {
        let map: FrequencyMap = ["b", "a", "a", "c", "b"].into_iter().collect();
        assert_eq!(
            map.most_common(3),
            vec![
                ("a".to_string(), 2),
                ("b".to_string(), 2),
                ("c".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_most_common_truncates() {
        let map: FrequencyMap = ["a", "b", "c"].into_iter().collect();
        assert_eq!(map.most_common(2).len(), 2);
    }

    #[test]
    fn test_merge() {
        let mut left: FrequencyMap = ["post-rock", "ambient"].into_iter().collect();
        let right: FrequencyMap = ["post-rock", "idm"].into_iter().collect();
        left.merge(&right);
        assert_eq!(left.get("post-rock"), 2);
        assert_eq!(left.get("ambient"), 1);
        assert_eq!(left.get("idm"), 1);
    }
}
