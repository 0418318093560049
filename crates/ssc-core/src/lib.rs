//! Core types and trait definitions for the Shelter Severity Classification
//! framework engine.
//!
//! This crate has no HTTP or database dependencies.
//! Storage backends implement [`store::CatalogueRepository`] and
//! [`store::VersionRepository`]; everything else is built on those two seams.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod catalogue;
pub mod error;
pub mod lifecycle;
pub mod refcode;
pub mod store;
pub mod tree;
pub mod version;

pub use error::{Error, Result};
