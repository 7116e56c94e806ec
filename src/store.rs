//! The rule mutation protocol.
//!
//! [`RuleStore`] owns the canonical rule text, its content hash, and
//! the current parsed snapshot. Mutations (bulk edits and saves) are
//! serialized by a writer lock; readers grab a cheap `Arc` snapshot and
//! never observe a partially rebuilt state (rebuild-then-swap).

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use similar::TextDiff;
use tracing::{debug, info};

use crate::error::{RuleError, RuleResult};
use crate::hook::SaveHook;
use crate::parse::{EntityKind, RuleParser, RuleSet};

/// Callback run with the freshly swapped snapshot after a reload.
pub type ReloadFn = Box<dyn Fn(&RuleSet) -> RuleResult<()> + Send + Sync>;

/// One create/update/delete against a named entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EditRequest {
    /// Entity name.
    pub name: String,
    /// Entity kind being edited.
    #[serde(rename = "Type")]
    pub kind: EntityKind,
    /// Replacement section text; ignored when deleting.
    #[serde(default)]
    pub text: String,
    /// Remove the named entity instead of replacing its text.
    #[serde(default)]
    pub delete: bool,
}

/// An ordered batch of edits, applied all-or-nothing.
pub type BulkEditRequest = Vec<EditRequest>;

/// Late-bound collaborators, injected at construction so the
/// single-writer invariant is enforced by the store rather than by
/// convention at call sites.
#[derive(Default)]
pub struct StoreHooks {
    /// Invoked synchronously after a successful save.
    pub save_hook: Option<SaveHook>,
    /// Invoked after each snapshot swap in [`RuleStore::reload`].
    pub post_reload: Option<ReloadFn>,
}

/// Deterministic digest of rule text, for change tracking and
/// stale-edit detection. Not a cryptographic integrity measure.
#[must_use]
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

struct State {
    raw: String,
    hash: String,
    rules: Arc<RuleSet>,
}

/// Owner of the canonical rule text and its derived snapshot.
pub struct RuleStore {
    state: RwLock<State>,
    writer: Mutex<()>,
    parser: Arc<dyn RuleParser>,
    path: Option<PathBuf>,
    hooks: StoreHooks,
}

impl RuleStore {
    /// Builds a store from initial text, failing if it does not parse.
    ///
    /// `path` is where saves persist the text and what the save hook
    /// receives as its `files` argument; with `None` the text lives in
    /// memory only.
    pub fn new(
        raw: impl Into<String>,
        parser: Arc<dyn RuleParser>,
        path: Option<PathBuf>,
        hooks: StoreHooks,
    ) -> RuleResult<Self> {
        let raw = raw.into();
        let rules = Arc::new(parser.parse(&raw)?);
        let hash = content_hash(&raw);
        Ok(Self {
            state: RwLock::new(State { raw, hash, rules }),
            writer: Mutex::new(()),
            parser,
            path,
            hooks,
        })
    }

    // State is always swapped wholesale, so a poisoned lock cannot
    // expose a torn value; recover instead of propagating.
    fn read(&self) -> RwLockReadGuard<'_, State> {
        match self.state.read() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        match self.state.write() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        match self.writer.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        }
    }

    /// The canonical rule text.
    #[must_use]
    pub fn raw_text(&self) -> String {
        self.read().raw.clone()
    }

    /// Content hash of the current text. Callers compare this against
    /// the hash their edit was based on to detect concurrent changes.
    #[must_use]
    pub fn hash(&self) -> String {
        self.read().hash.clone()
    }

    /// The current derived snapshot. Cheap; safe to call from
    /// concurrent alert evaluations.
    #[must_use]
    pub fn rules(&self) -> Arc<RuleSet> {
        Arc::clone(&self.read().rules)
    }

    /// Unified diff from the current text to `candidate`. Read-only.
    #[must_use]
    pub fn raw_diff(&self, candidate: &str) -> String {
        let current = self.raw_text();
        TextDiff::from_lines(current.as_str(), candidate)
            .unified_diff()
            .context_radius(3)
            .header("current", "candidate")
            .to_string()
    }

    /// Applies an ordered batch of edits atomically.
    ///
    /// Each edit locates its section in a fresh parse of the working
    /// text, splices it (replace, append when absent, or delete), and
    /// the result must reparse. Any failure aborts the whole batch and
    /// leaves the stored text byte-identical. Success commits the new
    /// text and hash; derived structures refresh on the next
    /// [`reload`](Self::reload).
    pub fn bulk_edit(&self, request: &[EditRequest]) -> RuleResult<()> {
        let _writer = self.lock_writer();
        let mut working = self.raw_text();
        for edit in request {
            working = apply_edit(self.parser.as_ref(), &working, edit)?;
        }
        let hash = content_hash(&working);
        info!(edits = request.len(), %hash, "bulk edit committed");
        let mut state = self.write();
        state.raw = working;
        state.hash = hash;
        Ok(())
    }

    /// Replaces the rule text wholesale, persists it, and runs the
    /// save hook.
    ///
    /// The candidate must parse or nothing is written. Once the text is
    /// persisted and committed it stays committed even if the hook then
    /// fails; the hook is a side-effect mechanism, not a transaction
    /// participant, and its error is returned so the caller can react.
    /// Call [`reload`](Self::reload) afterwards to rebuild the derived
    /// snapshot.
    pub fn save_raw_text(
        &self,
        raw: &str,
        diff: &str,
        user: &str,
        message: &str,
        extra_args: &[String],
    ) -> RuleResult<()> {
        let _writer = self.lock_writer();
        self.parser.parse(raw)?;
        if let Some(path) = &self.path {
            fs::write(path, raw)?;
        }
        let hash = content_hash(raw);
        info!(user, message, %hash, diff_lines = diff.lines().count(), "rule text saved");
        {
            let mut state = self.write();
            state.raw = raw.to_string();
            state.hash = hash;
        }
        if let Some(hook) = &self.hooks.save_hook {
            let files = self
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            hook(&files, user, message, extra_args)?;
        }
        Ok(())
    }

    /// Reparses the current text and swaps in the new snapshot, then
    /// runs the injected post-reload callback.
    ///
    /// Invoked by the caller after a successful mutation. Failures wrap
    /// in [`RuleError::Reload`] so "text persisted but new config
    /// invalid" is distinguishable from "text not persisted".
    pub fn reload(&self) -> RuleResult<()> {
        let _writer = self.lock_writer();
        let raw = self.raw_text();
        let rules = self
            .parser
            .parse(&raw)
            .map(Arc::new)
            .map_err(|e| RuleError::Reload {
                source: Box::new(e),
            })?;
        self.write().rules = Arc::clone(&rules);
        debug!(alerts = rules.alerts.len(), "rules reloaded");
        if let Some(cb) = &self.hooks.post_reload {
            cb(&rules).map_err(|e| RuleError::Reload {
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}

fn apply_edit(parser: &dyn RuleParser, text: &str, edit: &EditRequest) -> RuleResult<String> {
    let rules = parser.parse(text)?;
    let located = rules.locate(edit.kind, &edit.name).map(|l| l.line_range());
    let lines: Vec<&str> = text.lines().collect();

    let spliced = if edit.delete {
        let (start, end) = located.ok_or_else(|| RuleError::DeleteUnknown {
            kind: edit.kind.to_string(),
            name: edit.name.clone(),
        })?;
        let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
        kept.extend_from_slice(&lines[..start - 1]);
        kept.extend_from_slice(&lines[end..]);
        kept.join("\n")
    } else {
        let body = edit.text.trim_end();
        match located {
            Some((start, end)) => {
                let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
                kept.extend_from_slice(&lines[..start - 1]);
                kept.extend(body.lines());
                kept.extend_from_slice(&lines[end..]);
                kept.join("\n")
            }
            None if text.trim().is_empty() => body.to_string(),
            None => format!("{}\n\n{body}", text.trim_end()),
        }
    };

    let spliced = if spliced.is_empty() {
        spliced
    } else {
        format!("{spliced}\n")
    };

    parser
        .parse(&spliced)
        .map_err(|e| RuleError::Validation {
            kind: edit.kind.to_string(),
            name: edit.name.clone(),
            source: Box::new(e),
        })?;
    Ok(spliced)
}
