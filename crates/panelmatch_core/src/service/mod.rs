//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls and the assignment engine into one run.
//! - Keep the CLI decoupled from storage details.

pub mod assignment_service;
