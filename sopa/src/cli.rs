//! # CLI
//!
//! This module defines the command-line interface of `sopa` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring headers are `key:value`);
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sopa", version, about = "Dynamic SOAP style RPC CLI")]
pub struct Cli {
    /// Path to the service description.
    ///
    /// A resolved JSON description by default, or an encoded protobuf `FileDescriptorSet`
    /// when `--service` is given.
    pub description: PathBuf,

    /// Bind this service (e.g. my.package.Service) from a FileDescriptorSet
    #[arg(long)]
    pub service: Option<String>,

    /// JSON file with proxy settings (endpoint, timeout_secs, headers, unknown_fields, discipline)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the operations of the service
    List,

    /// Describe a single operation (parameters, result, action)
    Describe {
        /// Operation name (e.g. GetUser)
        operation: String,
    },

    /// Invoke an operation
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// sopa users.json call GetUser --url http://localhost:8080/users --arg john_doe
    /// sopa users.json call Search --url http://localhost:8080/users --kwarg 'limit=10'
    /// ```
    Call {
        /// Operation name (e.g. GetUser)
        operation: String,

        /// Endpoint URL. Overrides the config file
        #[arg(long)]
        url: Option<String>,

        /// Positional argument as JSON. Text that is not valid JSON is sent as a string
        #[arg(short = 'a', long = "arg", value_parser = parse_arg)]
        args: Vec<serde_json::Value>,

        /// Keyword argument as `name=JSON`
        #[arg(short = 'k', long = "kwarg", value_parser = parse_kwarg)]
        kwargs: Vec<(String, serde_json::Value)>,

        /// Envelope header entry as `name:value`
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Request timeout in seconds. Overrides the config file
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the raw request and response envelopes to stderr
        #[arg(long)]
        trace: bool,
    },
}

fn parse_arg(value: &str) -> Result<serde_json::Value, String> {
    Ok(serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string())))
}

fn parse_kwarg(value: &str) -> Result<(String, serde_json::Value), String> {
    let (name, json) = value
        .split_once('=')
        .ok_or_else(|| format!("Invalid keyword argument: '{value}'. Expected 'name=JSON'"))?;

    if name.trim().is_empty() {
        return Err("Keyword argument name cannot be empty".to_string());
    }

    Ok((name.trim().to_string(), parse_arg(json)?))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}
