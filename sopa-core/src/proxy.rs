//! # Service Proxy
//!
//! This module implements the dynamic dispatcher: the single component callers talk to.
//!
//! The [`ServiceProxy`] uses a **Typestate Pattern** to separate what needs a transport from
//! what does not:
//!
//! 1. **[`Offline`]**: holds the binding table and the registry. It can list and describe
//!    operations but cannot call them.
//! 2. **[`Online`]**: additionally holds a [`Transport`], the envelope headers, an optional
//!    [`TraceSink`] and the [`ChannelDiscipline`] in force. Operations can be invoked.
//!
//! ## Example: State Transition
//!
//! ```rust,no_run
//! use sopa_core::{ServiceBinding, ServiceProxy, transport::HttpTransport, value::Value};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let binding = ServiceBinding::from_json(&std::fs::read_to_string("users.json")?)?;
//!
//! // 1. Offline: introspection only
//! let proxy = ServiceProxy::offline(binding);
//! println!("{}", proxy.describe("GetUser")?);
//!
//! // 2. Online: invocation
//! let proxy = proxy.connect(HttpTransport::new("http://localhost:8080/users")?);
//! let user = proxy.invoke("GetUser", vec![Value::from("john_doe")], vec![]).await?;
//! # Ok(())
//! # }
//! ```
mod arguments;
pub mod offline;
pub mod online;

pub use arguments::{ArgumentError, Args};
pub use offline::{Parameter, Signature};
pub use online::Operation;

use crate::binding::{BindingTable, NotFoundError, ServiceBinding};
use crate::envelope::{BuildError, Fault, MalformedEnvelopeError};
use crate::registry::{MarshalError, Registry, UnmarshalError};
use crate::trace::TraceSink;
use crate::transport::{ChannelDiscipline, Transport, TransportError};
use crate::value::FromValueError;
use std::fmt;
use std::sync::Arc;

/// Every way an invocation can fail. Exactly one of these is returned per failed call.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("Invalid arguments: '{0}'")]
    Argument(#[from] ArgumentError),
    #[error("Failed to marshal arguments: '{0}'")]
    Marshal(#[from] MarshalError),
    #[error("Failed to build request envelope: '{0}'")]
    Build(#[from] BuildError),
    #[error("Malformed response envelope: '{0}'")]
    MalformedEnvelope(#[from] MalformedEnvelopeError),
    #[error("Transport error: '{0}'")]
    Transport(#[from] TransportError),
    #[error("Remote fault: '{0}'")]
    RemoteFault(Fault),
    #[error("Failed to unmarshal response: '{0}'")]
    Unmarshal(#[from] UnmarshalError),
    #[error("Failed to convert response: '{0}'")]
    Conversion(#[from] FromValueError),
}

impl InvokeError {
    /// The fault reported by the remote peer, if that is what this error is.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            InvokeError::RemoteFault(fault) => Some(fault),
            _ => None,
        }
    }
}

/// A dynamic proxy over one bound service.
///
/// The generic parameter `S` represents the current state of the proxy.
#[derive(Debug, Clone)]
pub struct ServiceProxy<S> {
    table: Arc<BindingTable>,
    registry: Arc<Registry>,
    state: S,
}

/// State: no transport, introspection only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

/// State: connected to a transport.
#[derive(Clone)]
pub struct Online<T> {
    transport: T,
    headers: Vec<(String, String)>,
    trace: Option<Arc<dyn TraceSink>>,
    discipline: ChannelDiscipline,
    /// Held across each exchange under [`ChannelDiscipline::Serialized`].
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<T> Online<T> {
    fn new(transport: T) -> Self {
        Self {
            transport,
            headers: Vec::new(),
            trace: None,
            discipline: ChannelDiscipline::default(),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Online<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Online")
            .field("transport", &self.transport)
            .field("headers", &self.headers)
            .field("trace", &self.trace.is_some())
            .field("discipline", &self.discipline)
            .finish()
    }
}

impl ServiceProxy<Offline> {
    /// Creates a proxy in the `Offline` state from a built binding.
    pub fn offline(binding: ServiceBinding) -> Self {
        let (table, registry) = binding.into_parts();
        Self {
            table: Arc::new(table),
            registry: Arc::new(registry),
            state: Offline,
        }
    }

    /// Transitions to the `Online` state. The binding is shared, not copied.
    pub fn connect<T: Transport>(self, transport: T) -> ServiceProxy<Online<T>> {
        ServiceProxy {
            table: self.table,
            registry: self.registry,
            state: Online::new(transport),
        }
    }
}

impl<S> ServiceProxy<S> {
    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
