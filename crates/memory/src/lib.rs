//! Session store implementations for DentAssist.
//!
//! The only backend keeps sessions in process memory with bounded
//! retention; histories do not survive a restart.

pub mod in_memory;

pub use in_memory::{InMemorySessionStore, RetentionPolicy};
