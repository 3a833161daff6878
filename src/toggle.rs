//! Collapse/expand state for code blocks, keyed by block id.
//!
//! The store records which ids the user has toggled, not the resolved
//! visibility. Special-language blocks default to collapsed and every other
//! block to expanded; an override flips the default once.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{language_matches, AssemblerConfig};
use crate::segment::{parse_message, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Collapsed,
    Expanded,
}

/// Session-lifetime table of toggled block ids. No eviction.
#[derive(Debug, Clone)]
pub struct ToggleStore {
    special_language: String,
    overrides: HashSet<String>,
}

/// Store handle shared with the deferred reconciliation task.
pub type SharedToggleStore = Arc<Mutex<ToggleStore>>;

impl Default for ToggleStore {
    fn default() -> Self {
        Self::new("python")
    }
}

impl ToggleStore {
    pub fn new(special_language: impl Into<String>) -> Self {
        Self { special_language: special_language.into(), overrides: HashSet::new() }
    }

    pub fn shared(self) -> SharedToggleStore {
        Arc::new(Mutex::new(self))
    }

    /// Flip the override for `block_id`. Returns whether it is now present.
    pub fn toggle(&mut self, block_id: &str) -> bool {
        if self.overrides.remove(block_id) {
            false
        } else {
            self.overrides.insert(block_id.to_string());
            true
        }
    }

    pub fn has_override(&self, block_id: &str) -> bool {
        self.overrides.contains(block_id)
    }

    pub fn is_collapsed(&self, block_id: &str, language: &str) -> bool {
        let special = language_matches(language, &self.special_language);
        let toggled = self.has_override(block_id);
        if special {
            !toggled
        } else {
            toggled
        }
    }

    pub fn resolve_visibility(&self, block_id: &str, language: &str) -> Visibility {
        if self.is_collapsed(block_id, language) {
            Visibility::Collapsed
        } else {
            Visibility::Expanded
        }
    }

    /// Set whatever override state makes `block_id` resolve collapsed.
    pub fn force_collapsed(&mut self, block_id: &str, language: &str) {
        if !self.is_collapsed(block_id, language) {
            self.toggle(block_id);
        }
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Post-stream reconciliation
// ---------------------------------------------------------------------------

/// One-shot deferred task that collapses a finished message's
/// special-language blocks, undoing expansions made while it streamed.
pub struct CollapseReconciler {
    store: SharedToggleStore,
    config: AssemblerConfig,
    pending: Option<JoinHandle<()>>,
    reconciled: Arc<Mutex<HashSet<String>>>,
}

impl CollapseReconciler {
    pub fn new(store: SharedToggleStore, config: AssemblerConfig) -> Self {
        Self { store, config, pending: None, reconciled: Arc::new(Mutex::new(HashSet::new())) }
    }

    /// Schedule reconciliation of a completed message after the debounce.
    ///
    /// Replaces any pending task. Returns `false` when the message has
    /// already been reconciled. Must be called inside a tokio runtime.
    pub fn schedule(&mut self, message_id: &str, final_content: &str) -> bool {
        if self.was_reconciled(message_id) {
            debug!(message_id, "collapse reconciliation already ran");
            return false;
        }
        self.cancel();

        let targets: Vec<(String, String)> = parse_message(message_id, final_content, false, &self.config)
            .into_iter()
            .flat_map(|b| b.segments)
            .filter_map(|seg| match seg {
                Segment::Code { language, id, .. } => Some((id, language)),
                _ => None,
            })
            .collect();

        let store = Arc::clone(&self.store);
        let reconciled = Arc::clone(&self.reconciled);
        let delay = self.config.collapse_debounce();
        let message_id = message_id.to_string();

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(mut guard) = store.lock() {
                for (id, language) in &targets {
                    guard.force_collapsed(id, language);
                }
            }
            if let Ok(mut guard) = reconciled.lock() {
                guard.insert(message_id.clone());
            }
            info!(message_id = %message_id, blocks = targets.len(), "collapsed code blocks after stream");
        }));
        true
    }

    /// Abort a pending reconciliation, e.g. because a new stream started.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            if !handle.is_finished() {
                debug!("cancelling pending collapse reconciliation");
            }
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn was_reconciled(&self, message_id: &str) -> bool {
        self.reconciled
            .lock()
            .map(|guard| guard.contains(message_id))
            .unwrap_or(false)
    }
}

impl Drop for CollapseReconciler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_language_defaults_collapsed() {
        let store = ToggleStore::default();
        assert!(store.is_collapsed("m-0", "python"));
        assert_eq!(store.resolve_visibility("m-0", "Python"), Visibility::Collapsed);
    }

    #[test]
    fn test_other_language_defaults_expanded() {
        let store = ToggleStore::default();
        assert!(!store.is_collapsed("m-0", "rust"));
    }

    #[test]
    fn test_padded_special_language_defaults_collapsed() {
        let store = ToggleStore::new("python ");
        assert_eq!(store.resolve_visibility("m-0", "python"), Visibility::Collapsed);
    }

    #[test]
    fn test_toggle_twice_restores_default() {
        let mut store = ToggleStore::default();
        assert!(store.toggle("m-1"));
        assert_eq!(store.resolve_visibility("m-1", "python"), Visibility::Expanded);
        assert!(!store.toggle("m-1"));
        assert_eq!(store.resolve_visibility("m-1", "python"), Visibility::Collapsed);
        assert!(store.is_empty());
    }

    #[test]
    fn test_toggle_is_per_id() {
        let mut store = ToggleStore::default();
        store.toggle("m-1");
        assert!(!store.is_collapsed("m-1", "python"));
        assert!(store.is_collapsed("m-2", "python"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_force_collapsed_is_idempotent() {
        let mut store = ToggleStore::default();
        store.toggle("m-0");
        store.force_collapsed("m-0", "python");
        assert!(store.is_collapsed("m-0", "python"));
        store.force_collapsed("m-0", "python");
        assert!(store.is_collapsed("m-0", "python"));
        store.force_collapsed("m-3", "sql");
        assert!(store.is_collapsed("m-3", "sql"));
    }

    fn fast_config() -> AssemblerConfig {
        AssemblerConfig { collapse_debounce_ms: 10, ..Default::default() }
    }

    #[tokio::test]
    async fn test_reconciler_collapses_expanded_blocks() {
        let store = ToggleStore::default().shared();
        store.lock().unwrap().toggle("m-0");
        let mut rec = CollapseReconciler::new(Arc::clone(&store), fast_config());

        assert!(rec.schedule("m", "```python\nx = 1\n```"));
        assert!(rec.is_pending());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.lock().unwrap().is_collapsed("m-0", "python"));
        assert!(rec.was_reconciled("m"));
        assert!(!rec.is_pending());
    }

    #[tokio::test]
    async fn test_reconciler_runs_once_per_message() {
        let store = ToggleStore::default().shared();
        let mut rec = CollapseReconciler::new(Arc::clone(&store), fast_config());
        assert!(rec.schedule("m", "```python\nx\n```"));
        tokio::time::sleep(Duration::from_millis(60)).await;

        store.lock().unwrap().toggle("m-0");
        assert!(!rec.schedule("m", "```python\nx\n```"));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!store.lock().unwrap().is_collapsed("m-0", "python"));
    }

    #[tokio::test]
    async fn test_cancel_before_fire() {
        let store = ToggleStore::default().shared();
        store.lock().unwrap().toggle("m-0");
        let config = AssemblerConfig { collapse_debounce_ms: 200, ..Default::default() };
        let mut rec = CollapseReconciler::new(Arc::clone(&store), config);

        rec.schedule("m", "```python\nx\n```");
        rec.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!store.lock().unwrap().is_collapsed("m-0", "python"));
        assert!(!rec.was_reconciled("m"));
        assert!(!rec.is_pending());
    }

    #[tokio::test]
    async fn test_reconciler_ignores_other_languages() {
        let store = ToggleStore::default().shared();
        let mut rec = CollapseReconciler::new(Arc::clone(&store), fast_config());
        rec.schedule("m", "```js\nx\n```\n```python\ny\n```");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.lock().unwrap().is_empty());
    }
}
