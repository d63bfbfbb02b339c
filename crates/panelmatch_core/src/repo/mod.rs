//! Roster data access contracts and the SQLite implementation.
//!
//! # Responsibility
//! - Read the three roster datasets an assignment run consumes.
//! - Persist a finished assignment mapping in one atomic write.
//!
//! # Invariants
//! - Read paths reject invalid persisted coordinates instead of masking them.
//! - `persist_assignments` commits every row or none.

pub mod roster_repo;
