//! SQLite backend for the framework engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`SqliteStore`] implements both
//! [`ssc_core::store::CatalogueRepository`] and
//! [`ssc_core::store::VersionRepository`].

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
