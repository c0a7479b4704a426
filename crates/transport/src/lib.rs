//! Content-Length message framing for the LSP base protocol.
//!
//! This crate handles only the byte-level framing contract described in
//! spec §4.1: locating headers, reading exactly `Content-Length` bytes of
//! body, and resynchronizing after malformed input. It knows nothing about
//! JSON-RPC envelope shape — that's `lrpc-protocol`'s `classify` — or about
//! dispatch — that's `lrpc-core`.
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> std::io::Result<()> {
//! use tokio::io::{BufReader, AsyncWriteExt};
//!
//! let mut reader = BufReader::new(tokio::io::stdin());
//! let mut writer = tokio::io::stdout();
//!
//! if let Some(body) = lrpc_transport::read_frame(&mut reader).await? {
//!     lrpc_transport::write_frame(&mut writer, &body).await?;
//! }
//! # writer.flush().await
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod framing;

pub use framing::{read_frame, write_frame};
