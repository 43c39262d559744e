//! Client-side filtering over fetched record lists.
//!
//! Every list view uses the same engine: a record type publishes a static table of
//! [`FilterField`]s, and [`apply`] keeps the records that satisfy every active
//! criterion. The canonical list is never touched.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::de::parse_date;

/// Filter key to raw user-entered value. Empty values are inactive.
pub type FilterCriteria = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    pub fn text(value: &Option<String>) -> Option<Self> {
        value.clone().map(FieldValue::Text)
    }

    pub fn int(value: Option<i64>) -> Option<Self> {
        value.map(FieldValue::Int)
    }

    pub fn float(value: Option<f64>) -> Option<Self> {
        value.map(FieldValue::Float)
    }

    pub fn date(value: Option<NaiveDate>) -> Option<Self> {
        value.map(FieldValue::Date)
    }

    pub fn datetime(value: Option<NaiveDateTime>) -> Option<Self> {
        value.map(FieldValue::DateTime)
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Int(n) => Some(*n as f64),
            FieldValue::Float(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::DateTime(dt) => Some(dt.date()),
            FieldValue::Text(s) => parse_date(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::Float(n) => write!(f, "{n}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    /// Equality after stringification; text compares case-insensitively.
    Exact(&'static str),
    /// Case-insensitive substring of the stringified value.
    Contains(&'static str),
    /// Inclusive bounds. A date `to` bound covers the whole day.
    Range {
        from: &'static str,
        to: &'static str,
    },
}

pub struct FilterField<R> {
    pub criterion: Criterion,
    pub value: fn(&R) -> Option<FieldValue>,
}

impl<R> FilterField<R> {
    pub const fn exact(key: &'static str, value: fn(&R) -> Option<FieldValue>) -> Self {
        Self {
            criterion: Criterion::Exact(key),
            value,
        }
    }

    pub const fn contains(key: &'static str, value: fn(&R) -> Option<FieldValue>) -> Self {
        Self {
            criterion: Criterion::Contains(key),
            value,
        }
    }

    pub const fn range(
        from: &'static str,
        to: &'static str,
        value: fn(&R) -> Option<FieldValue>,
    ) -> Self {
        Self {
            criterion: Criterion::Range { from, to },
            value,
        }
    }

    pub fn keys(&self) -> Vec<&'static str> {
        match self.criterion {
            Criterion::Exact(key) | Criterion::Contains(key) => vec![key],
            Criterion::Range { from, to } => vec![from, to],
        }
    }
}

pub trait Filterable: Sized + 'static {
    fn filter_fields() -> &'static [FilterField<Self>];
}

fn active<'a>(criteria: &'a FilterCriteria, key: &str) -> Option<&'a str> {
    criteria
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn exact_match(value: &FieldValue, wanted: &str) -> bool {
    match value {
        FieldValue::Text(s) => s.trim().to_lowercase() == wanted.to_lowercase(),
        FieldValue::DateTime(dt) => {
            value.to_string() == wanted || dt.date().format("%Y-%m-%d").to_string() == wanted
        }
        _ => value.to_string() == wanted,
    }
}

fn contains_match(value: &FieldValue, needle: &str) -> bool {
    value
        .to_string()
        .to_lowercase()
        .contains(&needle.to_lowercase())
}

fn range_match(value: &FieldValue, from: Option<&str>, to: Option<&str>) -> bool {
    match value {
        FieldValue::Date(_) | FieldValue::DateTime(_) => {
            let Some(day) = value.as_date() else {
                return false;
            };
            if let Some(from) = from {
                match parse_date(from) {
                    Some(bound) if day >= bound => {}
                    _ => return false,
                }
            }
            if let Some(to) = to {
                // end-of-day inclusive: anything before the next midnight
                match parse_date(to).and_then(|d| d.checked_add_signed(Duration::days(1))) {
                    Some(next_day) if day < next_day => {}
                    _ => return false,
                }
            }
            true
        }
        _ => {
            let Some(n) = value.as_number() else {
                return false;
            };
            let lower_ok = from.is_none_or(|b| b.parse::<f64>().is_ok_and(|b| n >= b));
            let upper_ok = to.is_none_or(|b| b.parse::<f64>().is_ok_and(|b| n <= b));
            lower_ok && upper_ok
        }
    }
}

/// Whether `record` satisfies every active criterion.
pub fn matches<R: Filterable>(record: &R, criteria: &FilterCriteria) -> bool {
    R::filter_fields().iter().all(|field| match field.criterion {
        Criterion::Exact(key) => match active(criteria, key) {
            None => true,
            Some(wanted) => (field.value)(record).is_some_and(|v| exact_match(&v, wanted)),
        },
        Criterion::Contains(key) => match active(criteria, key) {
            None => true,
            Some(needle) => (field.value)(record).is_some_and(|v| contains_match(&v, needle)),
        },
        Criterion::Range { from, to } => {
            let (from, to) = (active(criteria, from), active(criteria, to));
            if from.is_none() && to.is_none() {
                return true;
            }
            (field.value)(record).is_some_and(|v| range_match(&v, from, to))
        }
    })
}

/// Records satisfying all active criteria, in their original order.
pub fn apply<R: Filterable + Clone>(records: &[R], criteria: &FilterCriteria) -> Vec<R> {
    records
        .iter()
        .filter(|record| matches(*record, criteria))
        .cloned()
        .collect()
}

/// Every key the record type understands.
pub fn known_keys<R: Filterable>() -> Vec<&'static str> {
    R::filter_fields().iter().flat_map(|f| f.keys()).collect()
}

/// Criteria restricted to the keys `R` understands.
pub fn criteria_for<R: Filterable>(raw: &BTreeMap<String, String>) -> FilterCriteria {
    let known = known_keys::<R>();
    raw.iter()
        .filter(|(key, _)| known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Resets every value to empty, keeping the keys.
pub fn clear(criteria: &mut FilterCriteria) {
    criteria.values_mut().for_each(String::clear);
}
