//! SQLite backend for the Habitual habit store and local settings.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod settings;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use settings::SqliteSettings;
pub use store::SqliteStore;
