//! Capacity-bounded round-robin assignment of eligible patients to providers.
//!
//! # Responsibility
//! - Own the shared round-robin cursor and per-provider load counters.
//! - Drive one sequential pass over patients: locate, allocate, record.
//!
//! # Invariants
//! - A provider's load never exceeds the configured capacity.
//! - One allocation attempt probes at most `pool_len()` providers.
//! - The cursor is never rewound between patients within a run.

pub mod allocator;
pub mod engine;
