//! Core types, collaborator traits, and the daily rollover engine for
//! Habitual.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage, session, and settings backends plug in through the traits in
//! [`store`], [`session`], and [`settings`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod config;
pub mod day;
pub mod error;
pub mod habit;
pub mod habit_set;
pub mod history;
pub mod recorder;
pub mod rollover;
pub mod session;
pub mod settings;
pub mod single_flight;
pub mod store;
pub mod tracker;

pub use error::{AuthError, Error, Result, RolloverError, StoreError};

/// Identifier of the authenticated user that owns habits and history rows.
pub type OwnerId = uuid::Uuid;

#[cfg(test)]
mod tests;
