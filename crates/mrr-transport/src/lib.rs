//! Transport implementations for mrr.
//!
//! The dispatch layer only depends on the [`Transport`](mrr_core::Transport)
//! capability. This crate provides [`MemoryTransport`], an in-process broker
//! that records every publish and can optionally loop published messages
//! back to local subscribers. It backs the test suites and the demo service.

pub mod memory;

pub use memory::{MemoryTransport, PublishedMessage};
