//! Shared domain types for the SeqStack analysis plugins.
//!
//! Everything in this crate is pure: no database access, no process
//! spawning, no filesystem I/O. The plugin workers combine these types
//! with the `seqstack-db` and `seqstack-dispatch` crates.

pub mod config;
pub mod output;
pub mod types;
