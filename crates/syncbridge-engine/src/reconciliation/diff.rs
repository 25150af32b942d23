//! Two-pointer diff of per-key count collections.
//!
//! Both inputs must be sorted ascending by key; the output is then ascending
//! by key as well, so mismatch lists are stable between runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use syncbridge_connector::{ComparisonKey, CountRecord};

/// Classification of a mismatched key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Key only has a source record.
    SourceOnly,
    /// Key only has a target record.
    TargetOnly,
    /// Both systems have the key with different counts.
    DifferentCount,
}

impl std::fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceOnly => write!(f, "source_only"),
            Self::TargetOnly => write!(f, "target_only"),
            Self::DifferentCount => write!(f, "different_count"),
        }
    }
}

/// A key whose source and target records disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mismatch<K = ComparisonKey> {
    pub key: K,
    pub kind: MismatchKind,
    pub source_count: Option<u64>,
    pub target_count: Option<u64>,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl<K> Mismatch<K> {
    fn source_only(record: &CountRecord<K>) -> Self
    where
        K: Clone,
    {
        Self {
            key: record.key.clone(),
            kind: MismatchKind::SourceOnly,
            source_count: Some(record.count),
            target_count: None,
            context: BTreeMap::new(),
        }
    }

    fn target_only(record: &CountRecord<K>) -> Self
    where
        K: Clone,
    {
        Self {
            key: record.key.clone(),
            kind: MismatchKind::TargetOnly,
            source_count: None,
            target_count: Some(record.count),
            context: BTreeMap::new(),
        }
    }

    fn different_count(source: &CountRecord<K>, target: &CountRecord<K>) -> Self
    where
        K: Clone,
    {
        Self {
            key: source.key.clone(),
            kind: MismatchKind::DifferentCount,
            source_count: Some(source.count),
            target_count: Some(target.count),
            context: BTreeMap::new(),
        }
    }
}

/// Compare two key-sorted count collections.
///
/// Keys present on one side only yield `SourceOnly`/`TargetOnly`; keys on both
/// sides with different counts yield `DifferentCount`; matching keys yield
/// nothing. Runs in O(n + m) and performs no sorting itself.
pub fn diff<K>(source: &[CountRecord<K>], target: &[CountRecord<K>]) -> Vec<Mismatch<K>>
where
    K: Ord + Clone,
{
    let mut mismatches = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < source.len() || j < target.len() {
        if j == target.len() || (i < source.len() && source[i].key < target[j].key) {
            mismatches.push(Mismatch::source_only(&source[i]));
            i += 1;
        } else if i == source.len() || target[j].key < source[i].key {
            mismatches.push(Mismatch::target_only(&target[j]));
            j += 1;
        } else {
            if source[i].count != target[j].count {
                mismatches.push(Mismatch::different_count(&source[i], &target[j]));
            }
            i += 1;
            j += 1;
        }
    }

    mismatches
}

/// Sort a count collection by key, as [`diff`] requires.
#[must_use]
pub fn sorted<K: Ord>(mut records: Vec<CountRecord<K>>) -> Vec<CountRecord<K>> {
    records.sort_by(|a, b| a.key.cmp(&b.key));
    records
}
