//! # Proxy State: Online
//!
//! Invocation of bound operations over a [`Transport`].
//!
//! Every call runs the same pipeline:
//!
//! 1. Resolve the operation in the binding table ([`InvokeError::NotFound`]).
//! 2. Map the arguments onto the input shape ([`InvokeError::Argument`]).
//! 3. Marshal the input into a wire tree ([`InvokeError::Marshal`]).
//! 4. Build the request envelope ([`InvokeError::Build`]).
//! 5. Exchange bytes with the transport ([`InvokeError::Transport`]).
//! 6. Parse the response envelope ([`InvokeError::MalformedEnvelope`]); a fault ends the call
//!    with [`InvokeError::RemoteFault`].
//! 7. Unmarshal the payload against the output shape ([`InvokeError::Unmarshal`]).
//!
//! Nothing reaches the transport unless steps 1 to 4 succeed, and a call makes at most one
//! exchange.
use super::{Args, InvokeError, Offline, Online, ServiceProxy, arguments};
use crate::binding::{BindingEntry, NotFoundError};
use crate::envelope::{self, Response};
use crate::trace::TraceSink;
use crate::transport::{ChannelDiscipline, Transport, TransportError, TransportRequest};
use crate::value::{FromValue, Value};
use std::sync::Arc;
use tracing::Instrument;

impl<T: Transport> ServiceProxy<Online<T>> {
    /// Adds a header entry to every request envelope.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.state.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.state.headers.extend(headers);
        self
    }

    /// Installs a sink receiving the raw request and response envelopes.
    pub fn with_trace(mut self, sink: impl TraceSink + 'static) -> Self {
        self.state.trace = Some(Arc::new(sink));
        self
    }

    pub fn with_discipline(mut self, discipline: ChannelDiscipline) -> Self {
        self.state.discipline = discipline;
        self
    }

    pub fn discipline(&self) -> ChannelDiscipline {
        self.state.discipline
    }

    pub fn transport(&self) -> &T {
        &self.state.transport
    }

    /// Drops the transport and returns to the `Offline` state.
    pub fn disconnect(self) -> ServiceProxy<Offline> {
        ServiceProxy {
            table: self.table,
            registry: self.registry,
            state: Offline,
        }
    }

    /// Invokes `operation` with positional and keyword arguments.
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The unmarshalled response payload.
    /// * `Err(InvokeError)` - Exactly one error kind, never a partial result.
    pub async fn invoke(
        &self,
        operation: &str,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> Result<Value, InvokeError> {
        let entry = self.table.resolve(operation)?;
        self.dispatch(entry, positional, keyword).await
    }

    /// Builder form of [`ServiceProxy::invoke`].
    pub async fn call(&self, operation: &str, args: Args) -> Result<Value, InvokeError> {
        let (positional, keyword) = args.into_parts();
        self.invoke(operation, positional, keyword).await
    }

    /// Invokes `operation` and converts the result into `R`.
    pub async fn invoke_as<R: FromValue>(
        &self,
        operation: &str,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> Result<R, InvokeError> {
        let value = self.invoke(operation, positional, keyword).await?;
        Ok(R::from_value(value)?)
    }

    /// Resolves `operation` once and returns a callable handle to it.
    pub fn operation(&self, operation: &str) -> Result<Operation<'_, T>, NotFoundError> {
        let entry = self.table.resolve(operation)?;
        Ok(Operation { proxy: self, entry })
    }

    async fn dispatch(
        &self,
        entry: &BindingEntry,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> Result<Value, InvokeError> {
        let span = tracing::debug_span!(
            "invoke",
            operation = %entry.name,
            action = %entry.wire.action
        );

        self.run(entry, positional, keyword).instrument(span).await
    }

    async fn run(
        &self,
        entry: &BindingEntry,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> Result<Value, InvokeError> {
        let input = arguments::bind(self.registry.shapes(), entry, positional, keyword)?;
        let tree = self.registry.marshal(&input, entry.input)?;
        let request = envelope::build_request(&entry.wire, &self.state.headers, &tree)?;

        let response = self.exchange(entry, &request).await?;

        match envelope::parse_response(&response)? {
            Response::Fault(fault) => {
                tracing::warn!(code = %fault.code, reason = %fault.reason, "Remote fault");
                Err(InvokeError::RemoteFault(fault))
            }
            Response::Payload(tree) => Ok(self.registry.unmarshal(&tree, entry.output)?),
        }
    }

    async fn exchange(
        &self,
        entry: &BindingEntry,
        request: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        // Held until the response has been traced, so serialized exchanges never interleave.
        let _guard = match self.state.discipline {
            ChannelDiscipline::Shared => None,
            ChannelDiscipline::Serialized => Some(self.state.gate.lock().await),
        };

        if let Some(trace) = &self.state.trace {
            trace.outgoing(&entry.name, request);
        }

        let transport_request = TransportRequest {
            operation: &entry.name,
            action: &entry.wire.action,
            body: request,
        };

        tracing::debug!(bytes = request.len(), "Sending request envelope");
        let response = self.state.transport.send(transport_request).await?;
        tracing::debug!(bytes = response.len(), "Received response envelope");

        if let Some(trace) = &self.state.trace {
            trace.incoming(&entry.name, &response);
        }

        Ok(response)
    }
}

/// A resolved operation: the per-operation callable wrapper.
///
/// Holding one skips the table lookup on every call and guarantees the name exists.
#[derive(Debug)]
pub struct Operation<'a, T> {
    proxy: &'a ServiceProxy<Online<T>>,
    entry: &'a BindingEntry,
}

impl<T> Clone for Operation<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Operation<'_, T> {}

impl<T: Transport> Operation<'_, T> {
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn entry(&self) -> &BindingEntry {
        self.entry
    }

    pub async fn invoke(
        &self,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> Result<Value, InvokeError> {
        self.proxy.dispatch(self.entry, positional, keyword).await
    }

    pub async fn call(&self, args: Args) -> Result<Value, InvokeError> {
        let (positional, keyword) = args.into_parts();
        self.invoke(positional, keyword).await
    }

    pub async fn invoke_as<R: FromValue>(
        &self,
        positional: Vec<Value>,
        keyword: Vec<(String, Value)>,
    ) -> Result<R, InvokeError> {
        let value = self.invoke(positional, keyword).await?;
        Ok(R::from_value(value)?)
    }
}
