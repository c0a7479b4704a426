//! Method name constants the core itself acts on.
//!
//! This does not attempt to catalogue the full LSP method surface — that
//! belongs to the domain model the core treats as an external collaborator
//! (see spec §1). Only the handful of methods whose *names* are load-bearing
//! for transport/dispatch behavior live here.

/// Consumed by the invoker itself; never reaches user handlers (spec §4.4).
pub const CANCEL_REQUEST: &str = "$/cancelRequest";

/// Default content-modified trigger set (spec §6): notifications that, when
/// received, cancel in-flight requests targeting the same document.
pub const DEFAULT_CONTENT_MODIFIED_TRIGGERS: &[&str] =
    &["textDocument/didChange", "textDocument/didClose"];
