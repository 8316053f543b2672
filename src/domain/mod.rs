//! Postgres queries, one module per table.
//!
//! Functions take any `Executor` so callers can run them on the pool or
//! inside a transaction.

pub mod queue;
pub mod settings;
pub mod users;
pub mod videos;
