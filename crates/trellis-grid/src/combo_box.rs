//! Headless core of the multi-select combo box.
//!
//! The overlay's item list is virtualized through the same
//! [`DataProviderController`] the grid uses, so arbitrarily large data sets
//! load page by page as the user scrolls or navigates. Selection is tracked
//! by [`ItemKey`] with the selected items themselves retained in selection
//! order, so a selection survives the item being re-fetched as a new value
//! with the same identity.

use std::collections::HashSet;
use std::sync::Arc;

use trellis_core::Signal;

use crate::data::{DataProviderController, DataProviderFn, ItemKey, KeyFn};
use crate::grid::{Key, KeyEvent};

/// Multi-select combo box core: a virtualized overlay list plus a keyed
/// multi-selection.
pub struct MultiSelectComboBox<T> {
    controller: DataProviderController<T>,
    key_fn: KeyFn<T>,
    /// Selected items in selection order.
    selected: Vec<T>,
    selected_keys: HashSet<ItemKey>,
    opened: bool,
    /// The keyboard-active row in the open overlay.
    active_index: Option<usize>,
    /// Emitted with the new selection count after every selection change.
    pub selection_changed: Arc<Signal<usize>>,
    /// Emitted when the overlay opens or closes.
    pub opened_changed: Arc<Signal<bool>>,
}

impl<T: Clone + Send + 'static> MultiSelectComboBox<T> {
    pub fn new(key_fn: KeyFn<T>) -> Self {
        // The overlay list is flat; nothing is ever expanded.
        let controller = DataProviderController::new(key_fn.clone(), Arc::new(|_: &T| false));
        Self {
            controller,
            key_fn,
            selected: Vec::new(),
            selected_keys: HashSet::new(),
            opened: false,
            active_index: None,
            selection_changed: Arc::new(Signal::new()),
            opened_changed: Arc::new(Signal::new()),
        }
    }

    pub fn controller(&self) -> &DataProviderController<T> {
        &self.controller
    }

    /// Replace the provider. The selection is cleared; the new provider's
    /// items are unrelated to the old keys.
    pub fn set_data_provider(&mut self, provider: DataProviderFn<T>) {
        self.controller.set_data_provider(provider);
        self.active_index = None;
        if !self.selected.is_empty() {
            self.selected.clear();
            self.selected_keys.clear();
            self.selection_changed.emit(0);
        }
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Open the overlay and start loading its first page.
    pub fn open(&mut self) {
        if self.opened {
            return;
        }
        self.opened = true;
        if let Err(error) = self.controller.load_first_page() {
            tracing::warn!(target: "trellis_grid::data", %error, "combo box opened without data");
        }
        self.opened_changed.emit(true);
    }

    pub fn close(&mut self) {
        if !self.opened {
            return;
        }
        self.opened = false;
        self.active_index = None;
        self.opened_changed.emit(false);
    }

    pub fn is_loading(&self) -> bool {
        self.controller.is_loading()
    }

    /// The keyboard-active flat index in the open overlay.
    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    /// The item under the keyboard cursor, if its page is loaded.
    pub fn active_item(&self) -> Option<T> {
        let index = self.active_index?;
        self.controller.get_flat_index_context(index)?.item
    }

    pub fn is_selected(&self, item: &T) -> bool {
        self.selected_keys.contains(&(self.key_fn)(item))
    }

    pub fn selected_items(&self) -> &[T] {
        &self.selected
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Add `item` to the selection. Returns `false` if it was selected
    /// already.
    pub fn select(&mut self, item: T) -> bool {
        let key = (self.key_fn)(&item);
        if !self.selected_keys.insert(key) {
            return false;
        }
        self.selected.push(item);
        self.selection_changed.emit(self.selected.len());
        true
    }

    /// Remove `item` from the selection, by identity.
    pub fn deselect(&mut self, item: &T) -> bool {
        let key = (self.key_fn)(item);
        if !self.selected_keys.remove(&key) {
            return false;
        }
        let key_fn = self.key_fn.clone();
        self.selected.retain(|selected| key_fn(selected) != key);
        self.selection_changed.emit(self.selected.len());
        true
    }

    /// Toggle `item`; returns its new selected state.
    pub fn toggle(&mut self, item: T) -> bool {
        if self.is_selected(&item) {
            self.deselect(&item);
            false
        } else {
            self.select(item);
            true
        }
    }

    pub fn clear_selection(&mut self) {
        if self.selected.is_empty() {
            return;
        }
        self.selected.clear();
        self.selected_keys.clear();
        self.selection_changed.emit(0);
    }

    /// Route a key event. Returns `true` when the event was consumed.
    ///
    /// ArrowDown opens the closed overlay; in the open overlay the arrows
    /// move the active row (clamped), Enter toggles it when loaded, Escape
    /// closes.
    pub fn handle_key(&mut self, event: &KeyEvent) -> bool {
        match event.key {
            Key::ArrowDown => {
                if !self.opened {
                    self.open();
                    self.activate(0);
                    return true;
                }
                let next = self.active_index.map_or(0, |index| index + 1);
                self.activate(next);
                true
            }
            Key::ArrowUp => {
                if !self.opened {
                    return false;
                }
                let next = self.active_index.map_or(0, |index| index.saturating_sub(1));
                self.activate(next);
                true
            }
            Key::Enter => {
                if !self.opened {
                    return false;
                }
                if let Some(item) = self.active_item() {
                    self.toggle(item);
                }
                true
            }
            Key::Escape => {
                if !self.opened {
                    return false;
                }
                self.close();
                true
            }
            _ => false,
        }
    }

    /// Clamp, record and start loading the active row.
    fn activate(&mut self, index: usize) {
        let size = self.controller.flat_size();
        if size == 0 {
            self.active_index = None;
            return;
        }
        let index = index.min(size - 1);
        self.active_index = Some(index);
        self.controller.ensure_flat_index_loaded(index);
    }
}
