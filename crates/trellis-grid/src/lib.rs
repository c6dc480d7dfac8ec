//! Trellis Grid: virtualized data grid and multi-select combo box cores.
//!
//! This crate implements the headless logic of two data-heavy components:
//!
//! - **Grid** ([`Grid`]): a lazily loading, hierarchical data grid. A
//!   [`DataProviderController`] maps the flat row indices a virtualized
//!   viewport scrolls over onto a tree of page-oriented caches, requesting
//!   pages from a pluggable data provider on demand. Columns, per-item state
//!   (expansion, selection, row details) and a keyboard navigation state
//!   machine complete the component.
//! - **Combo box** ([`MultiSelectComboBox`]): a multi-select combo box whose
//!   overlay list is virtualized through the same controller, with selection
//!   tracked by stable item identity.
//!
//! Rendering, styling and event capture belong to the host; this crate only
//! consumes logical events (key presses, viewport binds) and produces
//! logical outcomes (focus targets, page requests, signals).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use trellis_grid::data::array_provider::create_array_data_provider;
//! use trellis_grid::data::{DataProviderController, ItemKey};
//!
//! let controller = DataProviderController::new(
//!     Arc::new(|item: &serde_json::Value| ItemKey::of(&item.to_string())),
//!     Arc::new(|_: &serde_json::Value| false),
//! );
//! controller.set_data_provider(create_array_data_provider(vec![
//!     json!({"name": "Ada"}),
//!     json!({"name": "Brian"}),
//! ]));
//! controller.load_first_page().unwrap();
//!
//! assert_eq!(controller.flat_size(), 2);
//! let first = controller.get_flat_index_context(0).unwrap();
//! assert_eq!(first.item.unwrap()["name"], "Ada");
//! ```

mod combo_box;
pub mod data;
mod error;
pub mod grid;

pub use combo_box::MultiSelectComboBox;
pub use data::{DataProviderController, DataProviderFn, ItemKey};
pub use error::GridError;
pub use grid::Grid;
