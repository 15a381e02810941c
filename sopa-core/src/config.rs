//! # Proxy Configuration
//!
//! [`ProxyConfig`] gathers the settings of a connected proxy so they can live in a JSON file:
//!
//! ```json
//! {
//!   "endpoint": "http://localhost:8080/users",
//!   "timeout_secs": 10,
//!   "headers": [["Token", "abc"]],
//!   "unknown_fields": "reject",
//!   "discipline": "serialized"
//! }
//! ```
//!
//! Every key is optional.
use crate::binding::{BindingError, ServiceBinding, ServiceBindingBuilder};
use crate::proxy::{Online, ServiceProxy};
use crate::registry::UnknownFieldPolicy;
use crate::transport::{ChannelDiscipline, HttpTransport, TransportError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: '{0}'")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: '{0}'")]
    Json(#[from] serde_json::Error),
    #[error("No endpoint configured")]
    MissingEndpoint,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Binding(#[from] BindingError),
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    /// URL requests are posted to.
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Header entries added to every request envelope.
    pub headers: Vec<(String, String)>,
    pub unknown_fields: UnknownFieldPolicy,
    pub discipline: ChannelDiscipline,
}

impl ProxyConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Applies the unknown-field policy and freezes the binding.
    pub fn build_binding(
        &self,
        mut builder: ServiceBindingBuilder,
    ) -> Result<ServiceBinding, ConfigError> {
        builder.set_unknown_fields(self.unknown_fields);
        Ok(builder.build()?)
    }

    /// An [`HttpTransport`] for the configured endpoint and timeout.
    pub fn http_transport(&self) -> Result<HttpTransport, ConfigError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(ConfigError::MissingEndpoint)?;

        let transport = HttpTransport::new(endpoint)?;
        Ok(match self.timeout() {
            Some(timeout) => transport.timeout(timeout),
            None => transport,
        })
    }

    /// Connects `binding` over HTTP with every configured setting applied.
    pub fn connect(
        &self,
        binding: ServiceBinding,
    ) -> Result<ServiceProxy<Online<HttpTransport>>, ConfigError> {
        let transport = self.http_transport()?;

        Ok(ServiceProxy::offline(binding)
            .connect(transport)
            .with_headers(self.headers.clone())
            .with_discipline(self.discipline))
    }
}
