//! Tag sets and the small textual forms shared across rule bodies.
//!
//! A [`TagSet`] is the key/value label set identifying one alert
//! instance. It is produced by the external alert evaluator and treated
//! as immutable here. The comma-separated `key=value` expression form is
//! shared by squelch rules and lookup entry guards.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// The key/value labels identifying a specific alert instance.
///
/// Ordering of keys is irrelevant for matching; the map form only
/// exists so display output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parses a comma-separated `key=value` expression into a tag set.
    pub fn parse(expr: &str) -> Result<Self, ParseError> {
        Ok(Self(parse_tags(expr)?))
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if the set contains no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of tags in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

/// Parses a comma-separated `key=value` expression into an ordered map.
///
/// Tag values may not contain commas; squelch patterns needing a comma
/// must express it another way (e.g. `{1,3}` repetition is unsupported).
pub fn parse_tags(expr: &str) -> Result<BTreeMap<String, String>, ParseError> {
    let mut tags = BTreeMap::new();
    for pair in expr.split(',') {
        let pair = pair.trim();
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ParseError::MalformedTag {
                pair: pair.to_string(),
            });
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            return Err(ParseError::EmptyTagKey {
                expr: expr.to_string(),
            });
        }
        if value.is_empty() {
            return Err(ParseError::EmptyTagValue {
                key: key.to_string(),
            });
        }
        if tags.insert(key.to_string(), value.to_string()).is_some() {
            return Err(ParseError::DuplicateTagKey {
                key: key.to_string(),
            });
        }
    }
    Ok(tags)
}

/// Parses a duration of the form `<n><unit>` with units s, m, h, d, w.
pub fn parse_duration(value: &str) -> Result<Duration, ParseError> {
    let value = value.trim();
    let err = || ParseError::InvalidDuration {
        value: value.to_string(),
    };
    let mut chars = value.chars();
    let unit = chars.next_back().ok_or_else(err)?;
    let n: i64 = chars.as_str().parse().map_err(|_| err())?;
    if n < 0 {
        return Err(err());
    }
    match unit {
        's' => Ok(Duration::seconds(n)),
        'm' => Ok(Duration::minutes(n)),
        'h' => Ok(Duration::hours(n)),
        'd' => Ok(Duration::days(n)),
        'w' => Ok(Duration::weeks(n)),
        _ => Err(err()),
    }
}

/// Parses `true`/`false`.
pub fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ParseError::InvalidBool {
            value: other.to_string(),
        }),
    }
}
