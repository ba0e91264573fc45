//! Selection-mode state machine.
//!
//! # Responsibility
//! - Detect sustained presses from press start/end/poll events.
//! - Maintain the selected id set while in `Selecting`.
//! - Execute confirmed batch deletes against an `ItemStore`.
//!
//! # Invariants
//! - `Idle` always has an empty selection set.
//! - A press released before the threshold never changes state.
//! - A failed batch delete keeps the session and its selection intact.
//! - A pending delete only runs while its ids are still selected in the
//!   live session; a cancelled or changed session drops it.

use crate::model::item::ItemId;
use crate::repo::item_repo::{ItemStore, RepoResult};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Hold duration that turns a press into a long press.
pub const LONG_PRESS_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    Selecting,
}

/// Result of a tap while selecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// Tap arrived while `Idle`.
    Ignored,
}

/// Ids captured for a delete awaiting user confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    ids: Vec<ItemId>,
}

impl PendingDelete {
    /// Number of items the confirmation prompt should mention.
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }
}

#[derive(Debug, Clone)]
struct PendingPress {
    item_id: ItemId,
    started_at: Instant,
}

#[derive(Debug, Clone)]
pub struct SelectionController {
    state: SelectionState,
    selected: BTreeSet<ItemId>,
    press: Option<PendingPress>,
    threshold: Duration,
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::with_threshold(LONG_PRESS_THRESHOLD)
    }
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: Duration) -> Self {
        Self {
            state: SelectionState::Idle,
            selected: BTreeSet::new(),
            press: None,
            threshold,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn is_selecting(&self) -> bool {
        self.state == SelectionState::Selecting
    }

    /// Pointer/touch went down on a selectable item.
    pub fn press_start(&mut self, item_id: impl Into<ItemId>, at: Instant) {
        self.press = Some(PendingPress {
            item_id: item_id.into(),
            started_at: at,
        });
    }

    /// Pointer/touch released or cancelled; a pending long press is dropped.
    pub fn press_end(&mut self) {
        self.press = None;
    }

    /// Fires a pending press once it has been held for the threshold.
    ///
    /// Enters `Selecting` (or stays there) and adds the pressed id. Returns
    /// `true` when the press fired.
    pub fn poll(&mut self, now: Instant) -> bool {
        let fired = match &self.press {
            Some(press) => now.saturating_duration_since(press.started_at) >= self.threshold,
            None => false,
        };
        if !fired {
            return false;
        }

        if let Some(press) = self.press.take() {
            self.begin(press.item_id);
        }
        true
    }

    /// Enters `Selecting` with `item_id` selected.
    pub fn begin(&mut self, item_id: impl Into<ItemId>) {
        if self.state == SelectionState::Idle {
            info!("event=selection_begin module=selection status=ok");
        }
        self.state = SelectionState::Selecting;
        self.selected.insert(item_id.into());
    }

    /// Set-toggles one id; ignored while `Idle`.
    pub fn toggle(&mut self, item_id: &str) -> ToggleOutcome {
        if self.state == SelectionState::Idle {
            return ToggleOutcome::Ignored;
        }
        if self.selected.remove(item_id) {
            ToggleOutcome::Removed
        } else {
            self.selected.insert(item_id.to_string());
            ToggleOutcome::Added
        }
    }

    /// Leaves selection mode and clears the set.
    pub fn cancel(&mut self) {
        self.reset();
        debug!("event=selection_cancel module=selection status=ok");
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.selected.contains(item_id)
    }

    /// Selected ids in ascending order.
    pub fn selected_ids(&self) -> Vec<ItemId> {
        self.selected.iter().cloned().collect()
    }

    /// Captures the current selection for confirmation.
    ///
    /// `None` when not selecting or nothing is selected, meaning the trash
    /// action is a no-op.
    pub fn request_delete(&self) -> Option<PendingDelete> {
        if !self.is_selecting() || self.selected.is_empty() {
            return None;
        }
        Some(PendingDelete {
            ids: self.selected_ids(),
        })
    }

    /// Deletes confirmed ids, then clears the selection and returns to `Idle`.
    ///
    /// A stale `pending` (session left, or ids no longer selected) is dropped
    /// without touching the store and yields `Ok(0)`.
    ///
    /// # Errors
    /// - Item-store failures are returned unchanged; selection is kept.
    pub fn commit_delete<S: ItemStore + ?Sized>(
        &mut self,
        pending: PendingDelete,
        store: &mut S,
    ) -> RepoResult<usize> {
        if !self.is_pending_current(&pending) {
            warn!(
                "event=selection_delete module=selection status=skipped reason=stale_pending requested={}",
                pending.ids.len()
            );
            return Ok(0);
        }

        let removed = store.delete_many(&pending.ids)?;
        self.reset();
        info!(
            "event=selection_delete module=selection status=ok requested={} removed={}",
            pending.ids.len(),
            removed
        );
        Ok(removed)
    }

    fn is_pending_current(&self, pending: &PendingDelete) -> bool {
        self.is_selecting()
            && !pending.ids.is_empty()
            && pending.ids.iter().all(|id| self.selected.contains(id))
    }

    fn reset(&mut self) {
        self.state = SelectionState::Idle;
        self.selected.clear();
        self.press = None;
    }
}
