//! Core types and trait definitions for the Meander route-progress engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod album;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod gamify;
pub mod progress;
pub mod route;
pub mod store;
pub mod trace;

pub use error::{EngineError, Error, Result};
