use colored::*;
use sopa_core::{
    InvokeError,
    envelope::Fault,
    proxy::Signature,
    value::{Value, json},
};
use std::fmt::Display;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct OperationList(pub Vec<Signature>);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<Value> for FormattedString {
    fn from(value: Value) -> Self {
        FormattedString::from(json::to_json(&value))
    }
}

impl From<&Fault> for FormattedString {
    fn from(fault: &Fault) -> Self {
        let mut out = format!(
            "{} code={:?} reason={:?}",
            "Remote Fault:".red().bold(),
            fault.code,
            fault.reason
        );
        if let Some(actor) = &fault.actor {
            out.push_str(&format!(" actor={actor:?}"));
        }
        FormattedString(out)
    }
}

impl From<InvokeError> for FormattedString {
    fn from(err: InvokeError) -> Self {
        match err.fault() {
            Some(fault) => FormattedString::from(fault),
            None => FormattedString(format!("{}\n\n'{}'", "Call Failed:".red().bold(), err)),
        }
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{}:\n\n'{}'", msg.red().bold(), err))
    }
}

impl From<OperationList> for FormattedString {
    fn from(OperationList(operations): OperationList) -> Self {
        if operations.is_empty() {
            return FormattedString("No operations found.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Available Operations:\n");
        for signature in operations {
            out.push_str(&format!(
                "  - {}({}) -> {}\n",
                signature.name.green(),
                parameter_list(&signature),
                signature.output.yellow()
            ));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<Signature> for FormattedString {
    fn from(signature: Signature) -> Self {
        let mut out = format!(
            "{} {}({}) {} {}\n",
            "operation".cyan(),
            signature.name.green(),
            parameter_list(&signature),
            "returns".cyan(),
            signature.output.yellow()
        );
        out.push_str(&format!("  {} {}\n", "namespace".cyan(), signature.namespace));
        out.push_str(&format!("  {} {}", "action".cyan(), signature.action));
        FormattedString(out)
    }
}

fn parameter_list(signature: &Signature) -> String {
    if signature.parameters.is_empty() {
        return signature.input.yellow().to_string();
    }

    signature
        .parameters
        .iter()
        .map(|parameter| {
            let marker = if parameter.required { "" } else { "?" };
            format!("{}{marker}: {}", parameter.name, parameter.type_name.yellow())
        })
        .collect::<Vec<_>>()
        .join(", ")
}
