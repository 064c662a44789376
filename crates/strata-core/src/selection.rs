//! Selection state driven by picking.

use std::collections::HashSet;

use crate::pick::ObjectId;

/// Modifier state accompanying a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClickMode {
    /// Plain click: replace the selection.
    #[default]
    Replace,
    /// Ctrl-click: toggle membership.
    Toggle,
}

impl ClickMode {
    /// Mode for a click with the given ctrl state.
    #[must_use]
    pub fn from_ctrl(ctrl: bool) -> Self {
        if ctrl {
            ClickMode::Toggle
        } else {
            ClickMode::Replace
        }
    }
}

/// The set of currently selected objects.
///
/// Keeps insertion order for iteration and a hash set for lookup.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    selected: HashSet<ObjectId>,
    order: Vec<ObjectId>,
}

impl Selection {
    /// Creates an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a resolved click.
    ///
    /// | hit | mode | effect |
    /// |---|---|---|
    /// | `Some(id)` | `Replace` | selection becomes `{id}` |
    /// | `Some(id)` | `Toggle` | `id` is added or removed |
    /// | `None` | `Replace` | selection is cleared |
    /// | `None` | `Toggle` | no change |
    ///
    /// Returns true if the selection changed.
    pub fn apply_click(&mut self, hit: Option<ObjectId>, mode: ClickMode) -> bool {
        match (hit, mode) {
            (Some(id), ClickMode::Replace) => {
                if self.order.len() == 1 && self.order[0] == id {
                    return false;
                }
                self.clear();
                self.insert(id);
                true
            }
            (Some(id), ClickMode::Toggle) => {
                if self.contains(id) {
                    self.remove(id);
                } else {
                    self.insert(id);
                }
                true
            }
            (None, ClickMode::Replace) => {
                let changed = !self.is_empty();
                self.clear();
                changed
            }
            (None, ClickMode::Toggle) => false,
        }
    }

    /// Adds an object; returns false if it was already selected.
    pub fn insert(&mut self, id: ObjectId) -> bool {
        if self.selected.insert(id) {
            self.order.push(id);
            true
        } else {
            false
        }
    }

    /// Removes an object; returns false if it was not selected.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        if self.selected.remove(&id) {
            self.order.retain(|other| *other != id);
            true
        } else {
            false
        }
    }

    /// Returns true if the object is selected.
    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.selected.contains(&id)
    }

    /// Drops every selected object.
    pub fn clear(&mut self) {
        self.selected.clear();
        self.order.clear();
    }

    /// Selected objects in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.order.iter().copied()
    }

    /// Number of selected objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
