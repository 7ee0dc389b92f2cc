//! Local trade ledger for the put-desk system.
//!
//! This crate owns the durable record of every placed order:
//! - `LocalOrderRecord` model and the `OrderChanges` field-change set
//! - `LocalTradeStore` trait consumed by the reconciliation core
//! - `PgTradeStore` (Postgres) and `MemoryTradeStore` (paper/tests) backends

pub mod memory;
pub mod models;
pub mod store;

pub use memory::MemoryTradeStore;
pub use models::{LocalOrderRecord, OrderChanges};
pub use store::{LocalTradeStore, PgTradeStore};
