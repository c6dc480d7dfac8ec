//! Column model with stable order values.
//!
//! Every column carries a numeric `order`; navigation and rendering address
//! columns by order rather than by array position, so reordering two columns
//! only swaps their two values and leaves everything else untouched. Orders
//! are assigned with wide spacing so future insertions between neighbors do
//! not require renumbering.

/// Spacing between consecutive column order values.
pub const ORDER_STEP: i64 = 10_000_000;

/// One grid column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Stable identifier, unique within the set.
    pub key: String,
    /// Dotted property path the column renders and sorts by.
    pub path: String,
    /// Hidden columns keep their order but are skipped by navigation.
    pub hidden: bool,
    /// Frozen columns render before scrolling ones.
    pub frozen: bool,
    /// Visual order value; the set keeps these unique.
    pub order: i64,
}

/// An ordered collection of columns.
#[derive(Debug, Default)]
pub struct ColumnSet {
    columns: Vec<Column>,
    next_order: i64,
}

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column bound to `path`. Returns its assigned order value.
    pub fn insert(&mut self, key: impl Into<String>, path: impl Into<String>) -> i64 {
        self.next_order += ORDER_STEP;
        let order = self.next_order;
        self.columns.push(Column {
            key: key.into(),
            path: path.into(),
            hidden: false,
            frozen: false,
            order,
        });
        order
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.key == key)
    }

    pub fn column_by_order(&self, order: i64) -> Option<&Column> {
        self.columns.iter().find(|column| column.order == order)
    }

    pub fn set_hidden(&mut self, key: &str, hidden: bool) -> bool {
        match self.columns.iter_mut().find(|column| column.key == key) {
            Some(column) => {
                column.hidden = hidden;
                true
            }
            None => false,
        }
    }

    pub fn set_frozen(&mut self, key: &str, frozen: bool) -> bool {
        match self.columns.iter_mut().find(|column| column.key == key) {
            Some(column) => {
                column.frozen = frozen;
                true
            }
            None => false,
        }
    }

    /// Exchange the order values of exactly two columns. No other column is
    /// renumbered. Returns `false` if either key is unknown.
    pub fn swap_order(&mut self, a: &str, b: &str) -> bool {
        let index_a = self.columns.iter().position(|column| column.key == a);
        let index_b = self.columns.iter().position(|column| column.key == b);
        match (index_a, index_b) {
            (Some(index_a), Some(index_b)) if index_a != index_b => {
                let order_a = self.columns[index_a].order;
                self.columns[index_a].order = self.columns[index_b].order;
                self.columns[index_b].order = order_a;
                true
            }
            _ => false,
        }
    }

    /// The visible columns in visual left-to-right order: frozen columns
    /// first, each group ascending by order value.
    pub fn visible_columns(&self) -> Vec<&Column> {
        let mut visible: Vec<&Column> = self
            .columns
            .iter()
            .filter(|column| !column.hidden)
            .collect();
        visible.sort_by_key(|column| (!column.frozen, column.order));
        visible
    }

    /// The visible order values in visual order.
    pub fn visible_orders(&self) -> Vec<i64> {
        self.visible_columns()
            .iter()
            .map(|column| column.order)
            .collect()
    }

    pub fn first_visible_order(&self) -> Option<i64> {
        self.visible_columns().first().map(|column| column.order)
    }

    pub fn last_visible_order(&self) -> Option<i64> {
        self.visible_columns().last().map(|column| column.order)
    }

    /// The visible order value numerically closest to `target`.
    ///
    /// Used by navigation to restore the memoized column after a vertical
    /// move lands on a row whose column set differs.
    pub fn nearest_visible_order(&self, target: i64) -> Option<i64> {
        self.columns
            .iter()
            .filter(|column| !column.hidden)
            .map(|column| column.order)
            .min_by_key(|order| order.abs_diff(target))
    }
}
