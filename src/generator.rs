//! Seeded mock-record generation.
//!
//! Screens without a backing service fabricate their records on first use.
//! All randomness flows through [`MockRng`], so a fixed seed plus a fixed
//! `today` reproduces the same record set.

use std::ops::Range;

use chrono::{Duration, NaiveDate};
use rand::distributions::uniform::SampleUniform;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const FIRST_NAMES: &[&str] = &[
    "John", "Mary", "James", "Patricia", "Robert", "Jennifer", "Michael", "Linda", "William",
    "Elizabeth",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez",
];

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random source for mock data.
pub struct MockRng {
    inner: StdRng,
}

impl MockRng {
    /// Deterministic generator for fixtures and reproducible sessions.
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            inner: StdRng::from_entropy(),
        }
    }

    /// Seeded when a seed is configured, entropy otherwise.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// Uniform draw in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// `true` with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    /// Uniform integer in a half-open range. The range must be non-empty.
    pub fn int<T: SampleUniform + PartialOrd>(&mut self, range: Range<T>) -> T {
        self.inner.gen_range(range)
    }

    /// Uniform float in `[lo, hi)`.
    pub fn float(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.unit() * (hi - lo)
    }

    /// Uniform element of a non-empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.inner.gen_range(0..items.len())]
    }

    /// `len` characters drawn from `0-9A-Z`.
    pub fn alnum_code(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| *self.pick(CODE_ALPHABET) as char)
            .collect()
    }

    /// "First Last" from the fixture name lists.
    pub fn person_name(&mut self) -> String {
        let first = self.pick(FIRST_NAMES);
        let last = self.pick(LAST_NAMES);
        format!("{first} {last}")
    }

    /// Up to `n` distinct elements in random order.
    pub fn shuffle_take<T: Clone>(&mut self, items: &[T], n: usize) -> Vec<T> {
        let mut pool = items.to_vec();
        pool.shuffle(&mut self.inner);
        pool.truncate(n);
        pool
    }

    /// A date `lo..hi` days before `today`.
    pub fn days_before(&mut self, today: NaiveDate, range: Range<i64>) -> NaiveDate {
        today - Duration::days(self.int(range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = MockRng::seeded(42);
        let mut b = MockRng::seeded(42);
        for _ in 0..20 {
            assert_eq!(a.int(0..1000), b.int(0..1000));
        }
        assert_eq!(a.person_name(), b.person_name());
    }

    #[test]
    fn int_stays_in_range() {
        let mut rng = MockRng::seeded(7);
        for _ in 0..500 {
            let v = rng.int(100..1000);
            assert!((100..1000).contains(&v));
            let u = rng.unit();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn alnum_code_is_uppercase_base36() {
        let mut rng = MockRng::seeded(1);
        let code = rng.alnum_code(9);
        assert_eq!(code.len(), 9);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn shuffle_take_is_distinct_and_bounded() {
        let mut rng = MockRng::seeded(3);
        let items = ["a", "b", "c", "d", "e"];
        let taken = rng.shuffle_take(&items, 3);
        assert_eq!(taken.len(), 3);
        let mut sorted = taken.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 3);
        assert_eq!(rng.shuffle_take(&items, 10).len(), 5);
    }

    #[test]
    fn person_name_uses_fixture_lists() {
        let mut rng = MockRng::seeded(9);
        let name = rng.person_name();
        let (first, last) = name.split_once(' ').unwrap();
        assert!(FIRST_NAMES.contains(&first));
        assert!(LAST_NAMES.contains(&last));
    }

    #[test]
    fn days_before_is_in_the_past() {
        let mut rng = MockRng::seeded(11);
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        for _ in 0..50 {
            let d = rng.days_before(today, 1..181);
            assert!(d < today);
            assert!(d >= today - Duration::days(180));
        }
    }
}
