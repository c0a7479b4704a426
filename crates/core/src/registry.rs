//! Name→descriptor handler registry (spec §4.3, §3 "Handler Descriptor").

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use lrpc_protocol::JsonRpcError;

use crate::cancellation::CancelToken;
use crate::error::CoreError;

/// A request handler: invoked once per inbound request matching its method.
///
/// Implementations should poll `cancel` at suspension points and return
/// promptly once it resolves — cancellation is cooperative (spec §5).
#[async_trait]
pub trait Handler: Send + Sync {
    /// Produce the request's result, or an error to report to the peer.
    async fn handle(&self, params: Option<Value>, cancel: CancelToken) -> Result<Value, JsonRpcError>;
}

/// A notification handler: fire-and-forget, never produces a reply (spec §4.4).
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// React to one notification. Errors are logged, never replied.
    async fn handle(&self, params: Option<Value>);
}

/// Checks a request's params before dispatch. `Err(reason)` becomes an
/// `InvalidParams` reply; the handler is never invoked (spec §3, §6).
pub type ParamsValidator = Arc<dyn Fn(&Option<Value>) -> Result<(), String> + Send + Sync>;

/// Checks a handler's successful result. `Err(reason)` is logged and replied
/// as `InternalError` — a schema-violating result is the handler's bug, not
/// the caller's (spec §3, §7 "Handler errors").
pub type ResultValidator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A request registration, built with [`RequestDescriptor::new`] and the
/// optional builder methods below — the core's realization of spec §3's
/// `{ method, kind, params_schema?, result_schema?, serial_group? }`.
pub struct RequestDescriptor {
    method: String,
    handler: Arc<dyn Handler>,
    serial_group: Option<String>,
    params_schema: Option<ParamsValidator>,
    result_schema: Option<ResultValidator>,
}

impl RequestDescriptor {
    /// A descriptor with no serial group and no schema validation.
    pub fn new(method: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self { method: method.into(), handler, serial_group: None, params_schema: None, result_schema: None }
    }

    /// Requests sharing a group run in received order (spec §4.4, §5).
    pub fn serial_group(mut self, group: impl Into<String>) -> Self {
        self.serial_group = Some(group.into());
        self
    }

    /// Validate params before the handler runs; failure replies `InvalidParams`.
    pub fn params_schema(mut self, validator: ParamsValidator) -> Self {
        self.params_schema = Some(validator);
        self
    }

    /// Validate the handler's successful result; failure replies `InternalError`.
    pub fn result_schema(mut self, validator: ResultValidator) -> Self {
        self.result_schema = Some(validator);
        self
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("serial_group", &self.serial_group)
            .field("has_params_schema", &self.params_schema.is_some())
            .field("has_result_schema", &self.result_schema.is_some())
            .finish()
    }
}

enum Binding {
    Request {
        handler: Arc<dyn Handler>,
        serial_group: Option<String>,
        params_schema: Option<ParamsValidator>,
        result_schema: Option<ResultValidator>,
    },
    Notification(Arc<dyn NotificationHandler>),
}

struct Entry {
    id: u64,
    binding: Binding,
}

#[derive(Default)]
struct RegistryInner {
    requests: HashMap<String, Entry>,
    notifications: HashMap<String, Vec<Entry>>,
}

/// Method name → handler descriptor map (spec §4.3).
///
/// At most one request descriptor per method (fail-fast at registration);
/// any number of notification descriptors, fanned out in registration order.
#[derive(Clone)]
pub struct HandlerRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    next_id: Arc<AtomicU64>,
}

/// The resolved binding for an in-flight request: the handler plus whatever
/// the registering descriptor attached (spec §3).
pub(crate) struct RequestBinding {
    pub handler: Arc<dyn Handler>,
    pub serial_group: Option<String>,
    pub params_schema: Option<ParamsValidator>,
    pub result_schema: Option<ResultValidator>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner::default())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a request handler per `descriptor`.
    ///
    /// Fails if one is already registered for the method: "multiple matches
    /// is a configuration error, fail-fast at registration" (spec §4.3).
    pub fn register_request(&self, descriptor: RequestDescriptor) -> Result<RegistrationHandle, CoreError> {
        let RequestDescriptor { method, handler, serial_group, params_schema, result_schema } = descriptor;
        let mut inner = self.inner.write();
        if inner.requests.contains_key(&method) {
            return Err(CoreError::DuplicateHandler { method });
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        inner.requests.insert(
            method.clone(),
            Entry { id, binding: Binding::Request { handler, serial_group, params_schema, result_schema } },
        );
        Ok(RegistrationHandle { registry: self.inner.clone(), method, id, kind: Kind::Request })
    }

    /// Register a notification handler for `method`.
    ///
    /// Multiple registrations fan out in registration order (spec §4.3).
    pub fn register_notification(
        &self,
        method: impl Into<String>,
        handler: Arc<dyn NotificationHandler>,
    ) -> RegistrationHandle {
        let method = method.into();
        let mut inner = self.inner.write();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        inner
            .notifications
            .entry(method.clone())
            .or_default()
            .push(Entry { id, binding: Binding::Notification(handler) });
        RegistrationHandle { registry: self.inner.clone(), method, id, kind: Kind::Notification }
    }

    /// Look up the request binding for `method`, if any.
    pub(crate) fn lookup_request(&self, method: &str) -> Option<RequestBinding> {
        let inner = self.inner.read();
        inner.requests.get(method).map(|e| {
            let Binding::Request { handler, serial_group, params_schema, result_schema } = &e.binding else {
                unreachable!("requests map only holds Binding::Request")
            };
            RequestBinding {
                handler: handler.clone(),
                serial_group: serial_group.clone(),
                params_schema: params_schema.clone(),
                result_schema: result_schema.clone(),
            }
        })
    }

    /// All notification handlers registered for `method`, in registration order.
    pub(crate) fn lookup_notifications(&self, method: &str) -> Vec<Arc<dyn NotificationHandler>> {
        let inner = self.inner.read();
        inner
            .notifications
            .get(method)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| {
                        let Binding::Notification(h) = &e.binding else {
                            unreachable!("notifications map only holds Binding::Notification")
                        };
                        h.clone()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Request,
    Notification,
}

/// Scoped registration. Dropping it deregisters the handler (spec §4.3).
pub struct RegistrationHandle {
    registry: Arc<RwLock<RegistryInner>>,
    method: String,
    id: u64,
    kind: Kind,
}

impl Drop for RegistrationHandle {
    fn drop(&mut self) {
        let mut inner = self.registry.write();
        match self.kind {
            Kind::Request => {
                if inner.requests.get(&self.method).is_some_and(|e| e.id == self.id) {
                    inner.requests.remove(&self.method);
                }
            }
            Kind::Notification => {
                if let Some(entries) = inner.notifications.get_mut(&self.method) {
                    entries.retain(|e| e.id != self.id);
                    if entries.is_empty() {
                        inner.notifications.remove(&self.method);
                    }
                }
            }
        }
    }
}
