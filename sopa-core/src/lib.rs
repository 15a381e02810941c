//! # Sopa Core
//!
//! `sopa-core` is the foundational library powering the Sopa CLI. It provides a dynamic
//! RPC proxy capable of invoking the operations of any envelope-based (SOAP style) service
//! without compile-time knowledge of its schema.
//!
//! ## Key Components
//!
//! * **[`ServiceProxy`]:** The main entry point. It resolves operations through the
//!   binding table, marshals arguments, and dispatches the resulting envelope over a
//!   [`Transport`].
//! * **[`BindingTable`]:** The read-only table of operations, built once from an already
//!   resolved service description (a JSON description, a protobuf descriptor pool, or code).
//! * **[`Registry`]:** Converts between domain [`Value`]s and the neutral [`WireValue`] tree,
//!   guided by the shapes stored in a [`ShapeArena`].
//! * **[`envelope`]:** Builds request envelopes and parses response envelopes (payload or fault).
//!
//! ## Example
//!
//! ```rust,no_run
//! use sopa_core::{binding::ServiceBinding, proxy::ServiceProxy, transport::HttpTransport, value::Value};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let description = std::fs::read_to_string("users.json")?;
//! let binding = ServiceBinding::from_json(&description)?;
//!
//! let proxy = ServiceProxy::offline(binding)
//!     .connect(HttpTransport::new("http://localhost:8080/users")?);
//!
//! let user = proxy
//!     .invoke("GetUser", vec![Value::from("john_doe")], vec![])
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports `prost-reflect` so that consumers building bindings from
//! descriptor pools use a compatible version.
pub mod binding;
pub mod config;
pub mod envelope;
pub mod proxy;
pub mod registry;
pub mod shape;
pub mod trace;
pub mod transport;
pub mod value;
pub mod wire;

pub use binding::{BindingEntry, BindingTable, ServiceBinding};
pub use proxy::{InvokeError, ServiceProxy};
pub use registry::Registry;
pub use shape::{ShapeArena, ShapeId};
pub use transport::Transport;
pub use value::Value;
pub use wire::WireValue;

// Re-exports
pub use prost_reflect;

/// Type alias for the standard boxed error used in transport failures.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
