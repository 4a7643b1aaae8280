//! MediaWiki reports most semantic failures with HTTP 200 and an `error`
//! key, and soft problems under `warnings`. This module turns a decoded
//! body into either an accepted payload or an [`ApiError`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{ApiError, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiWarning {
    pub module: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub code: String,
    pub info: String,
}

impl From<RemoteError> for ApiError {
    fn from(error: RemoteError) -> Self {
        ApiError::Remote {
            code: error.code,
            info: error.info,
        }
    }
}

/// Decoded top-level response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiEnvelope {
    body: Value,
    error: Option<RemoteError>,
    warnings: Vec<ApiWarning>,
}

impl ApiEnvelope {
    pub fn decode(text: &str) -> Result<Self, TransportError> {
        let body: Value = serde_json::from_str(text).map_err(|error| {
            TransportError::MalformedResponse(format!(
                "{error}; body starts with {:?}",
                preview(text)
            ))
        })?;
        Ok(Self::from_value(body))
    }

    pub fn from_value(body: Value) -> Self {
        let error = body.get("error").map(parse_error);
        let warnings = body
            .get("warnings")
            .map(parse_warnings)
            .unwrap_or_default();
        Self {
            body,
            error,
            warnings,
        }
    }

    pub fn error(&self) -> Option<&RemoteError> {
        self.error.as_ref()
    }

    pub fn warnings(&self) -> &[ApiWarning] {
        &self.warnings
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}

/// A payload that passed classification, with any non-fatal warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub body: Value,
    pub warnings: Vec<ApiWarning>,
}

impl Accepted {
    /// The payload subtree at `path`. Absence means the remote answered with
    /// a shape this client does not understand.
    pub fn subtree(&self, path: &[&str]) -> Result<&Value, ApiError> {
        let mut current = &self.body;
        for (depth, key) in path.iter().enumerate() {
            current = current.get(*key).ok_or_else(|| {
                ApiError::shape(format!(
                    "missing `{}` in response",
                    path[..=depth].join(".")
                ))
            })?;
        }
        Ok(current)
    }

    pub fn decode<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, ApiError> {
        let value = self.subtree(path)?;
        serde_json::from_value(value.clone()).map_err(|error| {
            ApiError::shape(format!("cannot decode `{}`: {error}", path.join(".")))
        })
    }
}

pub fn classify(envelope: ApiEnvelope, warnings_as_error: bool) -> Result<Accepted, ApiError> {
    if let Some(error) = envelope.error {
        return Err(error.into());
    }
    if !envelope.warnings.is_empty() {
        if warnings_as_error {
            return Err(ApiError::WarningsPromoted(join_warnings(&envelope.warnings)));
        }
        for warning in &envelope.warnings {
            warn!(module = %warning.module, "MediaWiki warning: {}", warning.text);
        }
    }
    Ok(Accepted {
        body: envelope.body,
        warnings: envelope.warnings,
    })
}

pub fn join_warnings(warnings: &[ApiWarning]) -> String {
    warnings
        .iter()
        .map(|warning| format!("{}: {}", warning.module, warning.text))
        .collect::<Vec<_>>()
        .join("; ")
}

fn parse_error(value: &Value) -> RemoteError {
    match value {
        Value::String(info) => RemoteError {
            code: "unknown_error".to_string(),
            info: info.clone(),
        },
        _ => RemoteError {
            code: value
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string(),
            info: value
                .get("info")
                .or_else(|| value.get("text"))
                .or_else(|| value.get("*"))
                .and_then(Value::as_str)
                .unwrap_or("unknown info")
                .to_string(),
        },
    }
}

// formatversion=2 nests text under "warnings", formatversion=1 under "*";
// errorformat=plaintext yields an array of {code, module, text}.
fn parse_warnings(value: &Value) -> Vec<ApiWarning> {
    match value {
        Value::Object(modules) => modules
            .iter()
            .map(|(module, entry)| ApiWarning {
                module: module.clone(),
                text: warning_text(entry),
            })
            .collect(),
        Value::Array(entries) => entries
            .iter()
            .map(|entry| ApiWarning {
                module: entry
                    .get("module")
                    .and_then(Value::as_str)
                    .unwrap_or("main")
                    .to_string(),
                text: warning_text(entry),
            })
            .collect(),
        other => vec![ApiWarning {
            module: "main".to_string(),
            text: warning_text(other),
        }],
    }
}

fn warning_text(entry: &Value) -> String {
    if let Some(text) = entry.as_str() {
        return text.to_string();
    }
    for key in ["warnings", "*", "text", "html"] {
        if let Some(text) = entry.get(key).and_then(Value::as_str) {
            return text.to_string();
        }
    }
    entry.to_string()
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}
