//! Larder Server - JSON-RPC front end for the search engine
//!
//! This crate provides:
//! - JSON-RPC server over HTTP
//! - Catalog loading and engine wiring at startup
//! - Graceful shutdown that flushes pending analytics

pub mod error;
pub mod handler;
pub mod server;

pub use error::*;
pub use handler::*;
pub use server::*;
