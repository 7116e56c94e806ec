//! Squelch rules: tag-keyed regex filters that suppress alert firings.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{RuleError, RuleResult};
use crate::tags::{parse_tags, TagSet};

/// One suppression rule: every declared tag key must exist in the tag
/// set and its pattern must match the value.
#[derive(Debug, Clone, Default)]
pub struct Squelch(HashMap<String, Regex>);

impl Squelch {
    /// Returns true iff this rule suppresses `tags`.
    ///
    /// An empty rule never matches, so a degenerate expression cannot
    /// squelch everything. Patterns use substring search semantics
    /// unless they anchor themselves.
    #[must_use]
    pub fn is_squelched(&self, tags: &TagSet) -> bool {
        if self.0.is_empty() {
            return false;
        }
        for (key, re) in &self.0 {
            match tags.get(key) {
                Some(value) if re.is_match(value) => {}
                _ => return false,
            }
        }
        true
    }

    /// Tag keys declared by this rule.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// An ordered collection of [`Squelch`] rules, OR'd together.
#[derive(Debug, Clone, Default)]
pub struct Squelches(Vec<Squelch>);

impl Squelches {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parses a comma-separated `key=value-regex` expression and
    /// appends it as one rule.
    ///
    /// Fails on malformed tag syntax or an invalid pattern for any
    /// value; a partial rule is never committed.
    pub fn add(&mut self, tag_expr: &str) -> RuleResult<()> {
        let tags = parse_tags(tag_expr)?;
        let mut squelch = HashMap::with_capacity(tags.len());
        for (key, value) in tags {
            let re = Regex::new(&value).map_err(|e| RuleError::Regex {
                key: key.clone(),
                source: Box::new(e),
            })?;
            squelch.insert(key, re);
        }
        self.0.push(Squelch(squelch));
        Ok(())
    }

    /// Returns true iff any rule in the collection suppresses `tags`.
    /// Always false for an empty collection.
    #[must_use]
    pub fn is_squelched(&self, tags: &TagSet) -> bool {
        self.0.iter().any(|s| s.is_squelched(tags))
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no rules have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
