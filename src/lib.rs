//! # rulegate - Alert rule resolution and live-edit core
//!
//! rulegate decides *which notifications fire, and which events are
//! suppressed* for a monitoring engine whose alert rules are authored
//! as human-editable text and mutated while the system runs. The
//! evaluation engine, templating, and schedulers are external
//! collaborators; this crate owns the resolution layer and the
//! concurrent editing protocol for the rule text underneath it.
//!
//! ## Core Concepts
//!
//! - **TagSet**: the key/value labels identifying one alert instance
//! - **Squelch**: tag-keyed regex rules suppressing matching firings
//! - **Lookup**: tag-indexed tables overriding notification selection
//! - **Notification chain**: the escalation order reachable via `next`
//! - **RuleStore**: hash/diff/bulk-edit/save/reload over the raw text
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rulegate::{notification_chains, RuleStore, SectionParser, StoreHooks, TagSet};
//!
//! let store = RuleStore::new(text, Arc::new(SectionParser), None, StoreHooks::default())?;
//! let rules = store.rules();
//! let alert = &rules.alerts["high.cpu"];
//! let tags: TagSet = [("host", "web-01")].into_iter().collect();
//!
//! if !alert.squelch.is_squelched(&tags) {
//!     let active = alert.crit_notification.active(&rules.notifications, &tags);
//!     let chains = notification_chains(&active, &rules.notifications);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alert;
pub mod chain;
pub mod error;
pub mod hook;
pub mod lookup;
pub mod notification;
pub mod parse;
pub mod squelch;
pub mod store;
pub mod tags;

// Re-export primary types at crate root for convenience
pub use alert::{Alert, Macro, MacroPair, Template};
pub use chain::notification_chains;
pub use error::{HookError, ParseError, RuleError, RuleResult};
pub use hook::{command_hook, SaveHook};
pub use lookup::{Lookup, LookupEntry};
pub use notification::{Notification, NotificationRegistry, NotificationRules, NotificationSet};
pub use parse::{EntityKind, Locator, RuleParser, RuleSet, SectionParser};
pub use squelch::{Squelch, Squelches};
pub use store::{
    content_hash, BulkEditRequest, EditRequest, ReloadFn, RuleStore, StoreHooks,
};
pub use tags::{parse_duration, parse_tags, TagSet};
