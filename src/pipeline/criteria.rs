//! Filter criteria.
//!
//! Every criterion treats "absent" as "no constraint", so a filter struct's
//! `Default` value matches every record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A predicate over one record type.
pub trait RecordFilter<T> {
    fn matches(&self, record: &T) -> bool;
}

/// Apply `filter` to `records`, preserving source order.
pub fn filter_records<T: Clone, F: RecordFilter<T>>(records: &[T], filter: &F) -> Vec<T> {
    records.iter().filter(|r| filter.matches(r)).cloned().collect()
}

/// Case-insensitive substring search over several fields.
///
/// An absent or blank needle matches everything.
pub fn text_matches(needle: Option<&str>, haystacks: &[&str]) -> bool {
    let needle = match needle.map(str::trim) {
        None | Some("") => return true,
        Some(n) => n.to_lowercase(),
    };
    haystacks
        .iter()
        .any(|h| h.to_lowercase().contains(&needle))
}

/// Equality against an optional criterion.
pub fn exact<E: PartialEq>(criterion: Option<&E>, value: &E) -> bool {
    criterion.map_or(true, |c| c == value)
}

/// Inclusive numeric bounds; either side may be open.
pub fn in_range<N: PartialOrd>(min: Option<N>, max: Option<N>, value: N) -> bool {
    if let Some(min) = min {
        if value < min {
            return false;
        }
    }
    if let Some(max) = max {
        if value > max {
            return false;
        }
    }
    true
}

/// Inclusive bounds on a date or timestamp; either side may be open.
pub fn in_date_range<D: PartialOrd>(from: Option<D>, to: Option<D>, value: D) -> bool {
    in_range(from, to, value)
}

// ═══════════════════════════════════════════════════════════
// Choice: dropdown selection with an "all" sentinel
// ═══════════════════════════════════════════════════════════

/// A dropdown selection. `None` means "all".
///
/// Deserializes `null`, `""`, `"all"` and `"All"` to `None`, anything else
/// through the inner type's `FromStr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice<E>(pub Option<E>);

impl<E> Default for Choice<E> {
    fn default() -> Self {
        Self(None)
    }
}

impl<E> Choice<E> {
    pub fn any() -> Self {
        Self(None)
    }

    pub fn only(value: E) -> Self {
        Self(Some(value))
    }

    pub fn get(&self) -> Option<&E> {
        self.0.as_ref()
    }

    pub fn is_any(&self) -> bool {
        self.0.is_none()
    }
}

impl<E: PartialEq> Choice<E> {
    pub fn admits(&self, value: &E) -> bool {
        exact(self.get(), value)
    }
}

impl Choice<String> {
    /// String selections compare against `&str` fields without allocating.
    pub fn admits_str(&self, value: &str) -> bool {
        self.0.as_deref().map_or(true, |c| c == value)
    }
}

fn is_all_sentinel(raw: &str) -> bool {
    matches!(raw.trim(), "" | "all" | "All")
}

impl<'de, E> Deserialize<'de> for Choice<E>
where
    E: FromStr,
    E::Err: fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(Self(None)),
            Some(s) if is_all_sentinel(&s) => Ok(Self(None)),
            Some(s) => s
                .trim()
                .parse()
                .map(|v| Self(Some(v)))
                .map_err(serde::de::Error::custom),
        }
    }
}

impl<E: Serialize> Serialize for Choice<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
