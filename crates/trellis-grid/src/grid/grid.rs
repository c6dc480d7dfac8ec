//! The grid facade.
//!
//! [`Grid`] wires the data layer to the interaction layer: it owns the
//! [`DataProviderController`], the column model, the per-item state and the
//! keyboard navigator, and implements the navigator's host view over its own
//! state. Hosts feed it key events and data providers; everything else is
//! plumbing between the parts.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_core::Signal;

use super::column::ColumnSet;
use super::navigation::{
    FocusTarget, GridSection, KeyEvent, KeyboardNavigator, NavigationGrid, NavigationOutcome,
    RowPosition,
};
use super::state::{GridState, RowPool, RowSlotId};
use crate::data::{DataProviderController, DataProviderFn, ItemKey, KeyFn};
use crate::error::GridError;

/// Host-supplied layout facts the navigator needs.
#[derive(Debug, Clone)]
pub struct GridConfig {
    pub header_rows: usize,
    pub footer_rows: usize,
    pub hidden_header_rows: HashSet<usize>,
    pub hidden_footer_rows: HashSet<usize>,
    /// Body rows one PageUp/PageDown covers.
    pub rows_per_page: usize,
    pub rtl: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            header_rows: 1,
            footer_rows: 0,
            hidden_header_rows: HashSet::new(),
            hidden_footer_rows: HashSet::new(),
            rows_per_page: 10,
            rtl: false,
        }
    }
}

/// Reports whether an item can have children at all (renders an expand
/// toggle). Independent of whether it is currently expanded.
pub type ExpandableFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A virtualized, lazily loading data grid core.
pub struct Grid<T> {
    controller: DataProviderController<T>,
    state: Arc<Mutex<GridState>>,
    columns: ColumnSet,
    rows: RowPool,
    navigator: KeyboardNavigator,
    key_fn: KeyFn<T>,
    expandable_fn: Option<ExpandableFn<T>>,
    config: GridConfig,
    /// Emitted with `(key, expanded)` after expansion state changes.
    pub expansion_changed: Arc<Signal<(ItemKey, bool)>>,
    /// Emitted with `(key, open)` after a row's details open or close.
    pub details_changed: Arc<Signal<(ItemKey, bool)>>,
}

impl<T: Clone + Send + 'static> Grid<T> {
    /// Create a grid whose items are identified by `key_fn`.
    pub fn new(key_fn: KeyFn<T>) -> Self {
        let state = Arc::new(Mutex::new(GridState::new()));

        // The controller asks "is this item expanded" through this closure,
        // which reads the grid's own expansion state.
        let state_for_controller = state.clone();
        let key_for_controller = key_fn.clone();
        let controller = DataProviderController::new(
            key_fn.clone(),
            Arc::new(move |item: &T| {
                state_for_controller
                    .lock()
                    .is_expanded(key_for_controller(item))
            }),
        );

        Self {
            controller,
            state,
            columns: ColumnSet::new(),
            rows: RowPool::new(),
            navigator: KeyboardNavigator::new(),
            key_fn,
            expandable_fn: None,
            config: GridConfig::default(),
            expansion_changed: Arc::new(Signal::new()),
            details_changed: Arc::new(Signal::new()),
        }
    }

    pub fn controller(&self) -> &DataProviderController<T> {
        &self.controller
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut ColumnSet {
        &mut self.columns
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: GridConfig) {
        self.config = config;
    }

    /// Declare which items can have children. Without this the grid is flat
    /// and nothing is expandable.
    pub fn set_expandable_fn(&mut self, expandable: ExpandableFn<T>) {
        self.expandable_fn = Some(expandable);
    }

    /// Replace the data provider. All per-item state and row bindings are
    /// discarded; the new provider's items have no relationship to the old
    /// keys.
    pub fn set_data_provider(&mut self, provider: DataProviderFn<T>) {
        self.state.lock().clear();
        self.rows.clear();
        self.navigator.clear_focus();
        self.controller.set_data_provider(provider);
    }

    pub fn load_first_page(&self) -> Result<(), GridError> {
        self.controller.load_first_page()
    }

    pub fn flat_size(&self) -> usize {
        self.controller.flat_size()
    }

    /// Expand the row at `flat_index`: record the state, recompute the flat
    /// mapping, then create and load the sub-level. No-op if the row is not
    /// loaded, not expandable, or already expanded.
    pub fn expand_at(&mut self, flat_index: usize) -> bool {
        let Some(key) = self.key_at(flat_index) else {
            return false;
        };
        if !self.is_row_expandable(flat_index) {
            return false;
        }
        if !self.state.lock().expand(key) {
            return false;
        }
        self.controller.recalculate_flat_size();
        self.controller.ensure_flat_index_hierarchy(flat_index);
        self.expansion_changed.emit((key, true));
        true
    }

    /// Collapse the row at `flat_index`, dropping its sub-cache. The
    /// children are re-fetched on the next expand.
    pub fn collapse_at(&mut self, flat_index: usize) -> bool {
        let Some(key) = self.key_at(flat_index) else {
            return false;
        };
        if !self.state.lock().collapse(key) {
            return false;
        }
        self.controller.drop_sub_cache(key);
        self.controller.recalculate_flat_size();
        self.expansion_changed.emit((key, false));
        true
    }

    pub fn is_expanded(&self, key: ItemKey) -> bool {
        self.state.lock().is_expanded(key)
    }

    /// Open or close the details area under a row.
    pub fn set_details_open(&mut self, key: ItemKey, open: bool) {
        if self.state.lock().set_details(key, open) {
            self.details_changed.emit((key, open));
        }
    }

    pub fn has_open_details(&self, key: ItemKey) -> bool {
        self.state.lock().has_details(key)
    }

    pub fn toggle_selected(&mut self, key: ItemKey) -> bool {
        self.state.lock().toggle_selected(key)
    }

    pub fn is_selected(&self, key: ItemKey) -> bool {
        self.state.lock().is_selected(key)
    }

    /// Bind a recycled row slot to `flat_index`, requesting its page if the
    /// item is not loaded yet.
    pub fn bind_row(&mut self, flat_index: usize) -> Option<RowSlotId> {
        if flat_index >= self.controller.flat_size() {
            return None;
        }
        self.controller.ensure_flat_index_loaded(flat_index);
        let key = self.key_at(flat_index);
        Some(self.rows.bind(flat_index, key))
    }

    /// Release the slot of a row that scrolled out of the viewport.
    pub fn release_row(&mut self, flat_index: usize) -> bool {
        self.rows.release(flat_index)
    }

    pub fn row_pool(&self) -> &RowPool {
        &self.rows
    }

    pub fn navigator(&self) -> &KeyboardNavigator {
        &self.navigator
    }

    pub fn set_focus(&mut self, target: FocusTarget) {
        self.navigator.set_focus(target);
    }

    /// Route one key event through the navigator, applying expansion
    /// outcomes to the grid itself.
    pub fn handle_key(&mut self, event: &KeyEvent) -> NavigationOutcome {
        let outcome = {
            let view = NavView {
                controller: &self.controller,
                state: &self.state,
                columns: &self.columns,
                key_fn: &self.key_fn,
                expandable_fn: self.expandable_fn.as_ref(),
                config: &self.config,
            };
            self.navigator.handle_key(&view, event)
        };
        match outcome {
            NavigationOutcome::Expanded(flat_index) => {
                self.expand_at(flat_index);
            }
            NavigationOutcome::Collapsed(flat_index) => {
                self.collapse_at(flat_index);
            }
            _ => {}
        }
        outcome
    }

    fn key_at(&self, flat_index: usize) -> Option<ItemKey> {
        let context = self.controller.get_flat_index_context(flat_index)?;
        context.item.map(|item| (self.key_fn)(&item))
    }

    fn is_row_expandable(&self, flat_index: usize) -> bool {
        let Some(expandable) = &self.expandable_fn else {
            return false;
        };
        self.controller
            .get_flat_index_context(flat_index)
            .and_then(|context| context.item)
            .is_some_and(|item| expandable(&item))
    }
}

/// The navigator's read-only view of the grid.
struct NavView<'a, T> {
    controller: &'a DataProviderController<T>,
    state: &'a Mutex<GridState>,
    columns: &'a ColumnSet,
    key_fn: &'a KeyFn<T>,
    expandable_fn: Option<&'a ExpandableFn<T>>,
    config: &'a GridConfig,
}

impl<T: Clone + Send + 'static> NavView<'_, T> {
    fn key_at(&self, flat_index: usize) -> Option<ItemKey> {
        let context = self.controller.get_flat_index_context(flat_index)?;
        context.item.map(|item| (self.key_fn)(&item))
    }
}

impl<T: Clone + Send + 'static> NavigationGrid for NavView<'_, T> {
    fn flat_size(&self) -> usize {
        self.controller.flat_size()
    }

    fn header_row_count(&self) -> usize {
        self.config.header_rows
    }

    fn footer_row_count(&self) -> usize {
        self.config.footer_rows
    }

    fn is_header_row_hidden(&self, index: usize) -> bool {
        self.config.hidden_header_rows.contains(&index)
    }

    fn is_footer_row_hidden(&self, index: usize) -> bool {
        self.config.hidden_footer_rows.contains(&index)
    }

    fn is_expandable(&self, flat_index: usize) -> bool {
        let Some(expandable) = self.expandable_fn else {
            return false;
        };
        self.controller
            .get_flat_index_context(flat_index)
            .and_then(|context| context.item)
            .is_some_and(|item| expandable(&item))
    }

    fn is_expanded(&self, flat_index: usize) -> bool {
        self.key_at(flat_index)
            .is_some_and(|key| self.state.lock().is_expanded(key))
    }

    fn has_open_details(&self, flat_index: usize) -> bool {
        self.key_at(flat_index)
            .is_some_and(|key| self.state.lock().has_details(key))
    }

    fn row_column_orders(&self, _section: GridSection, row: RowPosition) -> Vec<i64> {
        if row.details {
            return Vec::new();
        }
        self.columns.visible_orders()
    }

    fn rows_per_page(&self) -> usize {
        self.config.rows_per_page
    }

    fn rtl(&self) -> bool {
        self.config.rtl
    }

    fn body_empty(&self) -> bool {
        self.controller.flat_size() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::super::navigation::Key;
    use super::*;
    use crate::data::{ProviderCallback, ProviderParams};

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: String,
        children: usize,
    }

    fn item(name: &str, children: usize) -> Row {
        Row {
            name: name.into(),
            children,
        }
    }

    fn provider(roots: Vec<Row>) -> DataProviderFn<Row> {
        Arc::new(move |params: ProviderParams<Row>, callback: ProviderCallback<Row>| {
            let level: Vec<Row> = match &params.parent_item {
                None => roots.clone(),
                Some(parent) => (0..parent.children)
                    .map(|i| item(&format!("{}/{}", parent.name, i), 0))
                    .collect(),
            };
            let start = (params.page * params.page_size).min(level.len());
            let end = ((params.page + 1) * params.page_size).min(level.len());
            callback.complete(level[start..end].to_vec(), Some(level.len()));
        })
    }

    fn grid_with(roots: Vec<Row>) -> Grid<Row> {
        let mut grid = Grid::new(Arc::new(|row: &Row| ItemKey::of(&row.name)));
        grid.set_expandable_fn(Arc::new(|row: &Row| row.children > 0));
        grid.columns_mut().insert("name", "name");
        grid.set_data_provider(provider(roots));
        grid.load_first_page().unwrap();
        grid
    }

    #[test]
    fn test_expand_loads_children_and_collapse_drops_them() {
        let mut grid = grid_with(vec![item("a", 0), item("b", 2), item("c", 0)]);
        assert_eq!(grid.flat_size(), 3);

        assert!(grid.expand_at(1));
        assert_eq!(grid.flat_size(), 5);
        assert!(grid.is_expanded(ItemKey::of("b")));

        // Expanding again is a no-op.
        assert!(!grid.expand_at(1));

        assert!(grid.collapse_at(1));
        assert_eq!(grid.flat_size(), 3);
        assert!(!grid.is_expanded(ItemKey::of("b")));
    }

    #[test]
    fn test_leaf_rows_are_not_expandable() {
        let mut grid = grid_with(vec![item("a", 0)]);
        assert!(!grid.expand_at(0));
        assert_eq!(grid.flat_size(), 1);
    }

    #[test]
    fn test_expansion_signal_fires() {
        let mut grid = grid_with(vec![item("b", 1)]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        grid.expansion_changed.connect(move |&(key, expanded)| {
            seen_clone.lock().push((key, expanded));
        });

        grid.expand_at(0);
        grid.collapse_at(0);
        assert_eq!(
            *seen.lock(),
            vec![(ItemKey::of("b"), true), (ItemKey::of("b"), false)]
        );
    }

    #[test]
    fn test_key_right_expands_through_navigator() {
        let mut grid = grid_with(vec![item("b", 2)]);
        grid.set_focus(FocusTarget {
            section: GridSection::Body,
            row: RowPosition::row(0),
            column_order: None,
        });

        let outcome = grid.handle_key(&KeyEvent::new(Key::ArrowRight));
        assert_eq!(outcome, NavigationOutcome::Expanded(0));
        assert_eq!(grid.flat_size(), 3);

        let outcome = grid.handle_key(&KeyEvent::new(Key::ArrowLeft));
        assert_eq!(outcome, NavigationOutcome::Collapsed(0));
        assert_eq!(grid.flat_size(), 1);
    }

    #[test]
    fn test_reexpand_requests_fresh_page() {
        let mut grid = grid_with(vec![item("b", 1)]);
        let requests = Arc::new(AtomicUsize::new(0));
        let requests_clone = requests.clone();
        grid.controller().page_requested.connect(move |_| {
            requests_clone.fetch_add(1, Ordering::SeqCst);
        });

        grid.expand_at(0);
        let after_first = requests.load(Ordering::SeqCst);
        assert_eq!(after_first, 1);

        grid.collapse_at(0);
        grid.expand_at(0);
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bind_row_carries_item_key() {
        let mut grid = grid_with(vec![item("a", 0), item("b", 0)]);
        let slot = grid.bind_row(1).unwrap();
        let record = grid.row_pool().record(slot).unwrap();
        assert_eq!(record.key, Some(ItemKey::of("b")));
        assert_eq!(record.flat_index, 1);

        assert!(grid.release_row(1));
        assert!(grid.bind_row(99).is_none());
    }

    #[test]
    fn test_details_pseudo_row_reachable_by_keyboard() {
        let mut grid = grid_with(vec![item("a", 0), item("b", 0)]);
        grid.set_details_open(ItemKey::of("a"), true);
        grid.set_focus(FocusTarget {
            section: GridSection::Body,
            row: RowPosition::row(0),
            column_order: None,
        });

        let outcome = grid.handle_key(&KeyEvent::new(Key::ArrowDown));
        match outcome {
            NavigationOutcome::Moved(target) => {
                assert_eq!(target.row, RowPosition::details(0));
            }
            other => panic!("expected Moved, got {other:?}"),
        }
    }

    #[test]
    fn test_provider_swap_clears_state() {
        let mut grid = grid_with(vec![item("b", 1)]);
        grid.expand_at(0);
        grid.toggle_selected(ItemKey::of("b"));
        assert_eq!(grid.flat_size(), 2);

        grid.set_data_provider(provider(vec![item("x", 0)]));
        grid.load_first_page().unwrap();
        assert_eq!(grid.flat_size(), 1);
        assert!(!grid.is_expanded(ItemKey::of("b")));
        assert!(!grid.is_selected(ItemKey::of("b")));
        assert!(grid.navigator().focus().is_none());
    }
}
