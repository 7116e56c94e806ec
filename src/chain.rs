//! Escalation chain construction.

use std::collections::HashSet;

use crate::notification::{NotificationRegistry, NotificationSet};

/// Walks every notification in `set` as a chain root, following `next`
/// references through `registry`, and returns one ordered name chain
/// per root.
///
/// A `next` of `None` (or a name absent from the registry) closes the
/// chain. A name already visited in the current chain closes it with
/// the sentinel `"...name"` — a detected loop is reported for display,
/// not treated as an error. Roots are walked in name order, so the
/// result is deterministic.
#[must_use]
pub fn notification_chains(set: &NotificationSet, registry: &NotificationRegistry) -> Vec<Vec<String>> {
    let mut chains = Vec::with_capacity(set.len());
    for root in set.values() {
        let mut chain = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = Some(root);
        while let Some(n) = current {
            if seen.contains(n.name.as_str()) {
                chain.push(format!("...{}", n.name));
                break;
            }
            chain.push(n.name.clone());
            seen.insert(n.name.as_str());
            current = n.next.as_deref().and_then(|next| registry.get(next));
        }
        chains.push(chain);
    }
    chains
}
