//! Key-value store boundary.
//!
//! This crate defines the two store operations the sweep relies on (a filtered,
//! paginated scan and a single-item write) without making any assumption about
//! the backing service. An in-memory table is provided for tests/dev.

pub mod filter;
pub mod in_memory;
pub mod r#trait;

pub use filter::{FilterExpression, RenderedFilter};
pub use in_memory::InMemoryTable;
pub use r#trait::{KvStore, ScanCursor, ScanPage, ScanRequest};
