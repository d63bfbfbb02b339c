//! Domain model for panel assignment runs.
//!
//! # Responsibility
//! - Define roster records (patients, organizations, provider ids) read from storage.
//! - Define location value types and per-patient assignment outcomes.
//!
//! # Invariants
//! - Roster records are immutable for the duration of a run.
//! - A `GeoPoint` always holds finite, in-range coordinates.

pub mod assignment;
pub mod location;
pub mod roster;
