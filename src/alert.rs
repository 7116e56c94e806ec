//! Alert definitions and the other named rule-text entities.
//!
//! Everything here is rebuilt wholesale from the raw rule text on every
//! reload; nothing is mutated field-by-field while live.

use chrono::Duration;

use crate::notification::NotificationRules;
use crate::parse::Locator;
use crate::squelch::Squelches;

/// A named alert rule.
///
/// The crit/warn expressions are carried as opaque strings; evaluating
/// them is the expression engine's concern, not this crate's.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default)]
pub struct Alert {
    pub name: String,
    /// Raw section text this alert was parsed from.
    pub text: String,
    pub template: Option<String>,
    pub crit: Option<String>,
    pub warn: Option<String>,
    pub squelch: Squelches,
    /// Squelch expressions as written, for round-tripping and display.
    pub raw_squelch: Vec<String>,
    pub crit_notification: NotificationRules,
    pub warn_notification: NotificationRules,
    pub unknown: Option<Duration>,
    pub max_log_frequency: Option<Duration>,
    pub ignore_unknown: bool,
    pub unknowns_normal: bool,
    pub log: bool,
    pub run_every: Option<u32>,
    pub locator: Option<Locator>,
}

/// A named render template. Body and subject are opaque here; rendering
/// belongs to the template engine.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default)]
pub struct Template {
    pub name: String,
    pub text: String,
    pub body: Option<String>,
    pub subject: Option<String>,
    pub locator: Option<Locator>,
}

/// One key/value pair of a macro, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroPair {
    /// Key as written.
    pub key: String,
    /// Value as written.
    pub value: String,
}

/// A named macro: an ordered list of key/value pairs other sections may
/// splice in. Expansion is a parser-collaborator concern.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default)]
pub struct Macro {
    pub name: String,
    pub text: String,
    pub pairs: Vec<MacroPair>,
    pub locator: Option<Locator>,
}
