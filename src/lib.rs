//! Sprig library crate
//!
//! Sprig keeps nested task lists: arbitrarily deep trees of tasks that can
//! be completed, annotated, removed with their subtrees, and dragged to new
//! parents. The pure tree engine lives in [`models`]; [`store`] mirrors
//! snapshots to a durable JSON slot; [`api`] exposes the whole thing over
//! HTTP for whatever is rendering the list.

pub mod api;
pub mod cli;
pub mod models;
pub mod store;

// Re-export the core types at the crate root
pub use models::{Core, Task, TaskId, Tree, TreeError};
pub use store::{JsonFileStore, MemoryStore, StoreError, TreeStore};
