//! Larder RPC - JSON-RPC protocol definitions
//!
//! This crate defines:
//! - The `larder` method namespace shared by server and client
//! - Request/response types
//! - Mapping from engine errors to JSON-RPC error objects

pub mod error;
pub mod methods;
pub mod types;

pub use error::*;
pub use methods::*;
pub use types::*;
