//! The grid component: column model, per-item state, keyboard navigation and
//! the facade tying them to the data layer.

pub mod column;
#[allow(clippy::module_inception)]
mod grid;
pub mod navigation;
mod state;

pub use column::{Column, ColumnSet, ORDER_STEP};
pub use grid::{ExpandableFn, Grid, GridConfig};
pub use navigation::{
    FocusMode, FocusTarget, GridSection, Key, KeyboardModifiers, KeyboardNavigator, KeyEvent,
    NavigationGrid, NavigationOutcome, RowPosition,
};
pub use state::{GridState, RowPool, RowRecord, RowSlotId};
