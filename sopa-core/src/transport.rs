//! # Transport Channel
//!
//! The proxy never opens sockets itself. It hands each request envelope to a [`Transport`],
//! a byte-oriented request/response channel supplied by the caller, and waits for the
//! response bytes.
//!
//! [`HttpTransport`] is the stock implementation: it POSTs envelopes with `reqwest`.
//!
//! ## Channel discipline
//!
//! A proxy may be called concurrently. [`ChannelDiscipline`] decides what the proxy does with
//! its single transport instance when that happens:
//!
//! * [`ChannelDiscipline::Shared`]: calls reach the transport concurrently. This is the
//!   default, and fits transports that multiplex on their own (an HTTP client pool).
//! * [`ChannelDiscipline::Serialized`]: one request/response pair completes before the next
//!   request is handed over.
use crate::BoxError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;

const SOAP_ACTION: &str = "SOAPAction";
const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// How concurrent calls share the proxy's transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelDiscipline {
    #[default]
    Shared,
    Serialized,
}

/// One request handed to a transport.
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    /// Name of the invoked operation.
    pub operation: &'a str,
    /// Routing hint of the operation (sent as `SOAPAction` over HTTP).
    pub action: &'a str,
    /// The complete request envelope.
    pub body: &'a [u8],
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid endpoint URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("Failed to build HTTP client: '{0}'")]
    Client(#[source] reqwest::Error),
    #[error("Request to '{url}' failed: '{source}'")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Server answered with HTTP status {status}")]
    Status { status: u16, body: String },
    #[error("Transport failed: '{0}'")]
    Other(#[source] BoxError),
}

impl TransportError {
    /// Wraps an error coming from a custom transport.
    pub fn other(err: impl Into<BoxError>) -> Self {
        TransportError::Other(err.into())
    }
}

/// A byte-oriented request/response channel.
///
/// Retries, back-off and cancellation are the transport's business. The proxy makes exactly
/// one `send` per call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest<'_>) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: TransportRequest<'_>) -> Result<Vec<u8>, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&self, request: TransportRequest<'_>) -> Result<Vec<u8>, TransportError> {
        (**self).send(request).await
    }
}

/// Sends envelopes as HTTP POST requests to a single endpoint.
///
/// A `500 Internal Server Error` is not a transport failure: faults travel with that status, so
/// its body is returned like any successful one. Any other non-2xx status is a
/// [`TransportError::Status`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(TransportError::Client)?;
        Self::with_client(client, endpoint)
    }

    /// Uses an already configured client (proxies, TLS roots, pooling).
    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Result<Self, TransportError> {
        let endpoint = Url::parse(endpoint).map_err(|e| TransportError::InvalidUrl {
            url: endpoint.to_string(),
            source: e.into(),
        })?;

        Ok(Self {
            client,
            endpoint,
            timeout: None,
        })
    }

    /// Bounds the whole request/response exchange.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn request_error(&self, source: reqwest::Error) -> TransportError {
        match self.timeout {
            Some(timeout) if source.is_timeout() => TransportError::Timeout(timeout),
            _ => TransportError::Request {
                url: self.endpoint.to_string(),
                source,
            },
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest<'_>) -> Result<Vec<u8>, TransportError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            action = request.action,
            bytes = request.body.len(),
            "Posting envelope"
        );

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .header(SOAP_ACTION, format!("\"{}\"", request.action))
            .body(request.body.to_vec());

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| self.request_error(e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.request_error(e))?;

        tracing::debug!(status = status.as_u16(), bytes = body.len(), "Received response");

        if status.is_success() || status == StatusCode::INTERNAL_SERVER_ERROR {
            Ok(body.to_vec())
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }
}
