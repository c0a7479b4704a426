//! JSON-RPC 2.0 wire types and error codes for the LSP transport/dispatch core.
//!
//! This crate isolates protocol types from the runtime so they can be shared
//! across the transport layer, the dispatch core, and any domain-specific
//! handler layer built on top.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod errors;
mod jsonrpc;

/// Well-known method names this core recognizes by name (cancellation,
/// content-modified triggers) rather than treating as opaque dispatch keys.
pub mod methods;

pub use errors::*;
pub use jsonrpc::*;
