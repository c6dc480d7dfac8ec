//! Core systems for Trellis.
//!
//! This crate provides the foundational components of the Trellis UI
//! component library:
//!
//! - **Signal/Slot System**: Type-safe inter-component communication
//! - **Update Queue**: Key-coalescing deferred recomputation, driven by the
//!   host event loop
//! - **Logging**: `tracing` targets and macros used across the workspace
//!
//! # Signal/Slot Example
//!
//! ```
//! use trellis_core::Signal;
//!
//! // Create a signal that notifies when a value changes
//! let value_changed = Signal::<i32>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! // Emit the signal
//! value_changed.emit(42);
//!
//! // Disconnect when done
//! value_changed.disconnect(conn_id);
//! ```
//!
//! # Update Queue Example
//!
//! ```
//! use trellis_core::{TaskKey, UpdateQueue};
//!
//! let queue = UpdateQueue::new();
//!
//! // Scheduling the same key twice coalesces to one task.
//! queue.schedule(TaskKey::new("relayout", 0), || println!("stale"));
//! queue.schedule(TaskKey::new("relayout", 0), || println!("runs once"));
//!
//! // The host flushes at the end of its event-loop turn.
//! assert_eq!(queue.flush(), 1);
//! ```

pub mod logging;
mod queue;
mod signal;

pub use queue::{TaskKey, UpdateQueue};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
