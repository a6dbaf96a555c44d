//! Full-scan aggregate helpers used by the per-screen stats functions.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

pub fn count_where<T>(records: &[T], pred: impl Fn(&T) -> bool) -> usize {
    records.iter().filter(|r| pred(r)).count()
}

pub fn sum_by<T>(records: &[T], value: impl Fn(&T) -> f64) -> f64 {
    records.iter().map(value).sum()
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean_by<T>(records: &[T], value: impl Fn(&T) -> f64) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    sum_by(records, value) / records.len() as f64
}

/// `numerator / denominator` as a percentage; 0 when the denominator is 0.
pub fn rate(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

/// Round to one decimal place, halves away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Occurrences per key, ordered by key.
pub fn count_by_key<T, K: Ord>(records: &[T], key: impl Fn(&T) -> K) -> BTreeMap<K, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(key(record)).or_insert(0) += 1;
    }
    counts
}

pub fn distinct_count<T, K: Eq + Hash>(records: &[T], key: impl Fn(&T) -> K) -> usize {
    records.iter().map(key).collect::<HashSet<_>>().len()
}

/// Group records by key, keeping first-seen key order.
pub fn group_by<'a, T, K: PartialEq>(records: &'a [T], key: impl Fn(&T) -> K) -> Vec<(K, Vec<&'a T>)> {
    let mut groups: Vec<(K, Vec<&'a T>)> = Vec::new();
    for record in records {
        let k = key(record);
        match groups.iter_mut().find(|(g, _)| *g == k) {
            Some((_, members)) => members.push(record),
            None => groups.push((k, vec![record])),
        }
    }
    groups
}
