//! Shared test utilities for the tagsync workspace.
//!
//! This crate provides standardised fixtures so crate test suites do not each
//! hand-build collection trees. It is a dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`collection`]: [`TestCollection`] builder for a music root plus a
//!   snapshot root in one temporary directory

pub mod collection;

pub use collection::{TestCollection, encode_track, payload_hash};
