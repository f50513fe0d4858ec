//! Core types and trait definitions for the Warden authorization backend.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the relation tuple model, the structural diff and subset matching
//! primitives, and the activity and policy pipelines, all generic over the
//! storage traits in [`store`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod activity;
pub mod diff;
pub mod directory;
pub mod error;
pub mod policy;
pub mod relation;
pub mod store;
pub mod subset;

#[cfg(test)]
mod arbitrary;
#[cfg(test)]
mod fake;

pub use error::{Error, Result};
