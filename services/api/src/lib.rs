//! services/api/src/lib.rs
//!
//! The `api` service: HTTP surface, configuration, and the concrete adapters
//! plugged into the `study_notes_core` ports.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
