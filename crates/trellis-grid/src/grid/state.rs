//! Row identity arena and per-item UI state.
//!
//! Virtualized rows are recycled as the viewport scrolls, so nothing
//! per-widget can carry item identity. [`RowPool`] is the explicit arena that
//! binds a recycled row slot to the flat index and item key it currently
//! shows; [`GridState`] keys the durable per-item flags (expansion, details,
//! selection) by [`ItemKey`] so they survive scrolling and re-fetching.

use std::collections::{HashMap, HashSet};

use slotmap::{SlotMap, new_key_type};

use crate::data::ItemKey;

new_key_type! {
    /// Handle to one recycled row slot.
    pub struct RowSlotId;
}

/// What a row slot currently displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    /// The flat index this slot is bound to.
    pub flat_index: usize,
    /// Identity of the displayed item, `None` while its page is loading.
    pub key: Option<ItemKey>,
    /// Whether the slot currently renders an open details area.
    pub details_open: bool,
}

/// Arena of recycled row slots, addressable by flat index.
#[derive(Debug, Default)]
pub struct RowPool {
    slots: SlotMap<RowSlotId, RowRecord>,
    by_flat_index: HashMap<usize, RowSlotId>,
}

impl RowPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a slot to `flat_index`, reusing the slot already bound there.
    /// Rebinding updates the key in place (the row was recycled onto a new
    /// item, or its item finished loading).
    pub fn bind(&mut self, flat_index: usize, key: Option<ItemKey>) -> RowSlotId {
        if let Some(&slot) = self.by_flat_index.get(&flat_index) {
            if let Some(record) = self.slots.get_mut(slot) {
                record.key = key;
                return slot;
            }
        }
        let slot = self.slots.insert(RowRecord {
            flat_index,
            key,
            details_open: false,
        });
        self.by_flat_index.insert(flat_index, slot);
        slot
    }

    /// Release the slot bound to `flat_index` (the row scrolled out).
    pub fn release(&mut self, flat_index: usize) -> bool {
        match self.by_flat_index.remove(&flat_index) {
            Some(slot) => self.slots.remove(slot).is_some(),
            None => false,
        }
    }

    pub fn record(&self, slot: RowSlotId) -> Option<&RowRecord> {
        self.slots.get(slot)
    }

    pub fn record_mut(&mut self, slot: RowSlotId) -> Option<&mut RowRecord> {
        self.slots.get_mut(slot)
    }

    pub fn slot_at(&self, flat_index: usize) -> Option<RowSlotId> {
        self.by_flat_index.get(&flat_index).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_flat_index.clear();
    }
}

/// Durable per-item state, keyed by item identity.
#[derive(Debug, Default)]
pub struct GridState {
    expanded_keys: HashSet<ItemKey>,
    details_keys: HashSet<ItemKey>,
    selected_keys: HashSet<ItemKey>,
}

impl GridState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, key: ItemKey) -> bool {
        self.expanded_keys.contains(&key)
    }

    /// Returns `true` if the key was newly expanded.
    pub fn expand(&mut self, key: ItemKey) -> bool {
        self.expanded_keys.insert(key)
    }

    /// Returns `true` if the key was expanded before.
    pub fn collapse(&mut self, key: ItemKey) -> bool {
        self.expanded_keys.remove(&key)
    }

    pub fn expanded_keys(&self) -> &HashSet<ItemKey> {
        &self.expanded_keys
    }

    pub fn has_details(&self, key: ItemKey) -> bool {
        self.details_keys.contains(&key)
    }

    pub fn set_details(&mut self, key: ItemKey, open: bool) -> bool {
        if open {
            self.details_keys.insert(key)
        } else {
            self.details_keys.remove(&key)
        }
    }

    pub fn is_selected(&self, key: ItemKey) -> bool {
        self.selected_keys.contains(&key)
    }

    /// Toggle selection; returns the new selected state.
    pub fn toggle_selected(&mut self, key: ItemKey) -> bool {
        if self.selected_keys.remove(&key) {
            false
        } else {
            self.selected_keys.insert(key);
            true
        }
    }

    pub fn select(&mut self, key: ItemKey) -> bool {
        self.selected_keys.insert(key)
    }

    pub fn deselect(&mut self, key: ItemKey) -> bool {
        self.selected_keys.remove(&key)
    }

    pub fn selected_count(&self) -> usize {
        self.selected_keys.len()
    }

    pub fn clear(&mut self) {
        self.expanded_keys.clear();
        self.details_keys.clear();
        self.selected_keys.clear();
    }
}
