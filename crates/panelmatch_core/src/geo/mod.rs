//! Proximity eligibility for patients against organization sites.
//!
//! # Responsibility
//! - Compute great-circle distances between validated points.
//! - Decide per patient whether any organization is "near" (coordinates first,
//!   postal code second).
//!
//! # Invariants
//! - Eligibility is binary; there is no distance radius.
//! - Organizations with neither coordinates nor a postal code never match.

pub mod haversine;
pub mod locator;
