//! Tag-indexed override tables.
//!
//! A lookup declares the tag keys it discriminates on and an ordered
//! list of entries. Resolution is first-match in declaration order;
//! entries are never merged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::parse::Locator;
use crate::tags::TagSet;

/// One row of a lookup: the raw guard expression it was declared with,
/// plus the flat resolved mapping holding both guard pairs (the
/// lookup's declared tag keys) and payload pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    /// Raw guard expression as written in the rule text.
    pub def: String,
    /// Resolved key/value mapping.
    pub values: BTreeMap<String, String>,
}

impl LookupEntry {
    /// Returns true iff, for every key in `tag_keys`, this entry's
    /// mapping holds a value equal to the tag set's value for that key.
    /// A declared key missing from the tag set is a non-match.
    fn matches(&self, tag_keys: &[String], tags: &TagSet) -> bool {
        tag_keys.iter().all(|key| {
            match (self.values.get(key), tags.get(key)) {
                (Some(entry_value), Some(tag_value)) => entry_value == tag_value,
                _ => false,
            }
        })
    }
}

/// A named, tag-indexed override table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    /// Table name.
    pub name: String,
    /// Tag keys this table discriminates on.
    pub tags: Vec<String>,
    /// Rows, tried in declaration order.
    pub entries: Vec<LookupEntry>,
    /// Where this table sits in the raw rule text.
    #[serde(skip)]
    pub locator: Option<Locator>,
}

impl Lookup {
    /// Resolves the value bound to `key` for `tags`.
    ///
    /// Entries are tried in declaration order; the first entry whose
    /// guard matches wins and resolution stops, even if that entry
    /// lacks `key`.
    #[must_use]
    pub fn get(&self, key: &str, tags: &TagSet) -> Option<&str> {
        let entry = self.entries.iter().find(|e| e.matches(&self.tags, tags))?;
        entry.values.get(key).map(String::as_str)
    }
}
