//! Hive-style partition path codec
//!
//! Paths such as `marketplace=US/year=2024/week=05/file.csv` carry column
//! values in directory names. Parsing is purely syntactic: segments without
//! `=` are skipped and values are never typed here.

use std::fmt;

/// Ordered `key=value` pairs extracted from a partition path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionPath {
    pairs: Vec<(String, String)>,
}

impl PartitionPath {
    /// Parse a relative path into its partition pairs, in path order
    pub fn parse(path: &str) -> Self {
        Self {
            pairs: parse_pairs(path),
        }
    }

    /// Partition keys in path order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    /// Key/value pairs in path order
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Look up the first value recorded for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Render back to `k=v/k=v`
    pub fn encode(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for PartitionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/').split('/')
}

/// Keys of every `key=value` segment, in path order
pub fn parse_keys(path: &str) -> Vec<String> {
    segments(path)
        .filter_map(|segment| segment.split_once('='))
        .map(|(key, _)| key.to_string())
        .collect()
}

/// Key/value pairs of every `key=value` segment, in path order
pub fn parse_pairs(path: &str) -> Vec<(String, String)> {
    segments(path)
        .filter_map(|segment| segment.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
