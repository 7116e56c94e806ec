//! Notifications and per-alert notification selection.
//!
//! Notifications live in a name-keyed registry; the `next` escalation
//! relation is a name reference resolved at traversal time, never an
//! owning pointer, so shared tails and cycles are representable.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;

use crate::lookup::Lookup;
use crate::parse::Locator;
use crate::tags::TagSet;

/// Name-keyed arena of notifications for one parsed snapshot.
pub type NotificationRegistry = BTreeMap<String, Arc<Notification>>;

/// A transient, per-firing set of active notifications.
pub type NotificationSet = BTreeMap<String, Arc<Notification>>;

/// A named delivery action with an optional escalation successor.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default)]
pub struct Notification {
    pub name: String,
    /// Raw section text this notification was parsed from.
    pub text: String,
    pub email: Vec<String>,
    pub post: Option<String>,
    pub get: Option<String>,
    pub print: bool,
    /// Name of the next notification in the escalation chain.
    pub next: Option<String>,
    pub timeout: Option<Duration>,
    pub content_type: Option<String>,
    pub locator: Option<Locator>,
}

impl Notification {
    /// Returns true if at least one delivery action is configured.
    #[must_use]
    pub fn has_action(&self) -> bool {
        !self.email.is_empty() || self.post.is_some() || self.get.is_some() || self.print
    }
}

/// An alert's statically declared notifications plus the lookup tables
/// that may override them per firing.
#[derive(Debug, Clone, Default)]
pub struct NotificationRules {
    /// Statically declared notifications, by name.
    pub notifications: NotificationSet,
    /// Override tables, keyed by table name.
    pub lookups: BTreeMap<String, Lookup>,
}

impl NotificationRules {
    /// Computes the active notification set for a firing with `tags`.
    ///
    /// Starts from the static set (by reference). Each configured
    /// lookup is resolved under a key equal to its table name; a
    /// resolved value is split on `,`, each trimmed token looked up in
    /// `registry`, and the result merged in, overriding a same-named
    /// static entry. Unknown names are skipped so a typo cannot block
    /// delivery of the remaining valid notifications.
    #[must_use]
    pub fn active(&self, registry: &NotificationRegistry, tags: &TagSet) -> NotificationSet {
        let mut set = self.notifications.clone();
        for (key, lookup) in &self.lookups {
            let Some(value) = lookup.get(key, tags) else {
                continue;
            };
            for name in value.split(',') {
                let name = name.trim();
                if let Some(n) = registry.get(name) {
                    set.insert(name.to_string(), Arc::clone(n));
                }
            }
        }
        set
    }

    /// Returns true if neither static notifications nor lookups are
    /// configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty() && self.lookups.is_empty()
    }
}
