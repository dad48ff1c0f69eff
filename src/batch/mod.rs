//! Batch module - the multiplexed I/O engine.
//!
//! - [`BatchItem`] / [`Outcome`] - per-key input and result
//! - [`BatchCoordinator`] - partitions items and drives one session per node
//! - [`BatchGet`], [`BatchSet`], [`BatchDelete`] - operation facades
//!
//! Sessions are internal: one per destination per call, never reused.

mod coordinator;
mod item;
mod ops;
mod session;

pub use coordinator::BatchCoordinator;
pub use item::{BatchItem, BatchResult, LocalError, Outcome};
pub use ops::{BatchDelete, BatchGet, BatchOperation, BatchSet, SuccessContext};
