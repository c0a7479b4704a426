//! Invoker configuration (spec §6, §9.3).

use std::time::Duration;

/// Tunables for the [`crate::invoker::RequestInvoker`] — spec §6's
/// "Configuration options".
///
/// No file or environment parsing lives here; that belongs to the thin
/// startup surface the core treats as an external collaborator. The struct
/// and its `Default` are themselves part of the core's public surface.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Cancel any handle older than this. `None` means no timeout.
    pub maximum_request_timeout: Option<Duration>,
    /// Whether content-modified notifications abandon in-flight requests
    /// targeting the same document (spec §4.4, §6).
    pub supports_content_modified: bool,
    /// Methods that, when received as a notification, trigger
    /// content-modified cancellation of in-flight requests targeting the
    /// same document URI.
    pub content_modified_triggers: Vec<String>,
    /// Global cap on simultaneously active handlers. `0` means unbounded.
    pub concurrency: usize,
    /// The task scheduler handler dispatch, timeout watchdogs, and
    /// notification fan-out are spawned onto (spec §6). Defaults to the
    /// handle of whichever runtime the engine is started from.
    pub input_scheduler: tokio::runtime::Handle,
}

impl Default for InvokerConfig {
    /// Panics if called outside a running Tokio runtime, same as
    /// `Handle::current()` itself — the core is always driven from inside one.
    fn default() -> Self {
        Self {
            maximum_request_timeout: None,
            supports_content_modified: true,
            content_modified_triggers: lrpc_protocol::methods::DEFAULT_CONTENT_MODIFIED_TRIGGERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            concurrency: 0,
            input_scheduler: tokio::runtime::Handle::current(),
        }
    }
}
