//! # Sopa CLI Entry Point
//!
//! The main executable for the Sopa tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and sets up logging.
//! 2. **Binding**: Loads the service description and the optional proxy config into a `ServiceBinding`.
//! 3. **Execution**: Lists, describes or invokes operations through a `ServiceProxy`.
//! 4. **Presentation**: Formats and prints the resulting data or error to standard output/error.
mod cli;
mod formatter;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use formatter::{FormattedString, GenericError, OperationList};
use sopa_core::binding::{ServiceBinding, description, descriptor_pool};
use sopa_core::config::ProxyConfig;
use sopa_core::proxy::ServiceProxy;
use sopa_core::trace::WriterSink;
use sopa_core::value::json;
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let mut config = match args.config.as_deref().map(ProxyConfig::load).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => exit_with(GenericError("Failed to load config", err)),
    };

    let binding = match load_binding(&args.description, args.service.as_deref(), &config) {
        Ok(binding) => binding,
        Err(err) => exit_with(GenericError("Failed to load service description", format!("{err:#}"))),
    };

    match args.command {
        Commands::List => list_operations(binding),
        Commands::Describe { operation } => describe_operation(binding, &operation),
        Commands::Call {
            operation,
            url,
            args: positional,
            kwargs,
            headers,
            timeout,
            trace,
        } => {
            if url.is_some() {
                config.endpoint = url;
            }
            if timeout.is_some() {
                config.timeout_secs = timeout;
            }
            config.headers.extend(headers);

            run_call(binding, &config, &operation, positional, kwargs, trace).await
        }
    }
}

fn exit_with(message: impl Into<FormattedString>) -> ! {
    eprintln!("{}", message.into());
    process::exit(1);
}

/// A JSON description, or a `FileDescriptorSet` when a service name is given.
fn load_binding(
    path: &Path,
    service: Option<&str>,
    config: &ProxyConfig,
) -> anyhow::Result<ServiceBinding> {
    let builder = match service {
        Some(service) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("reading {}", path.display()))?;
            descriptor_pool::from_file_descriptor_set(&bytes, service)?
        }
        None => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            description::from_json(&content)?
        }
    };

    Ok(config.build_binding(builder)?)
}

fn list_operations(binding: ServiceBinding) {
    let proxy = ServiceProxy::offline(binding);

    let signatures = proxy
        .operations()
        .into_iter()
        .filter_map(|entry| proxy.describe(&entry.name).ok())
        .collect();

    println!("{}", FormattedString::from(OperationList(signatures)));
}

fn describe_operation(binding: ServiceBinding, operation: &str) {
    match ServiceProxy::offline(binding).describe(operation) {
        Ok(signature) => println!("{}", FormattedString::from(signature)),
        Err(err) => exit_with(GenericError("Lookup Failed", err)),
    }
}

async fn run_call(
    binding: ServiceBinding,
    config: &ProxyConfig,
    operation: &str,
    positional: Vec<serde_json::Value>,
    kwargs: Vec<(String, serde_json::Value)>,
    trace: bool,
) {
    let proxy = match config.connect(binding) {
        Ok(proxy) => proxy,
        Err(err) => exit_with(GenericError("Connection Error", err)),
    };

    let proxy = if trace {
        proxy.with_trace(WriterSink::new(std::io::stderr()))
    } else {
        proxy
    };

    tracing::debug!(operation, endpoint = ?config.endpoint, "calling");

    let positional = positional.into_iter().map(json::from_json).collect();
    let keyword = kwargs
        .into_iter()
        .map(|(name, value)| (name, json::from_json(value)))
        .collect();

    match proxy.invoke(operation, positional, keyword).await {
        Ok(value) => println!("{}", FormattedString::from(value)),
        Err(err) => exit_with(err),
    }
}
