//! JSON-RPC 2.0 message transport and request-lifecycle core, specialized
//! for the Language Server Protocol.
//!
//! This crate owns framing, envelope classification, handler dispatch,
//! cooperative cancellation (peer-initiated, content-modified, timeout,
//! shutdown), serial-group ordering, concurrency limiting, and response
//! routing. It does not know about any particular LSP method's payload
//! shape — that is left to whatever registers handlers against it.
//!
//! See [`Engine`] for the entry point that wires every component together
//! over a reader/writer pair.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancellation;
mod config;
mod engine;
mod error;
mod input;
mod invoker;
mod output;
mod registry;
mod router;

pub use cancellation::{CancelReason, CancelToken};
pub use config::InvokerConfig;
pub use engine::Engine;
pub use error::CoreError;
pub use input::InputHandler;
pub use invoker::RequestInvoker;
pub use output::OutputHandler;
pub use registry::{
    Handler, HandlerRegistry, NotificationHandler, ParamsValidator, RegistrationHandle, RequestDescriptor,
    ResultValidator,
};
pub use router::ResponseRouter;
