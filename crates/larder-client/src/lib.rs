//! Larder Client - Client library for connecting to Larder servers
//!
//! This crate provides:
//! - JSON-RPC client for the `larder` namespace
//! - Typed wrappers for search, facets, suggestions and ranking

pub mod client;
pub mod error;

pub use client::*;
pub use error::*;
