//! Best-effort JSON/YAML decoding of uploaded API specifications.
//!
//! Specs arrive as raw text, usually with a filename hint from the upload.
//! The parser picks a strategy from that hint and falls back between JSON
//! and YAML when the hint is missing or ambiguous:
//!
//! - `*.json`: strict JSON only
//! - `*.yaml` / `*.yml`: tolerant YAML, then strict YAML
//! - anything else: JSON first, then YAML
//!
//! The result must be a mapping. Beyond that, no OpenAPI validation is done;
//! a document without any of the well-known top-level keys only produces an
//! advisory warning.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

/// Top-level keys that mark a document as an OpenAPI/Swagger spec.
pub const OPENAPI_MARKER_KEYS: [&str; 4] = ["openapi", "swagger", "info", "paths"];

/// Errors produced while decoding spec text.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Text is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Text is not valid YAML.
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[source] serde_yaml::Error),

    /// Neither decoder accepted the text.
    #[error("content is neither valid JSON ({json}) nor valid YAML ({yaml})")]
    Unrecognized {
        /// JSON decoder message.
        json: String,
        /// YAML decoder message.
        yaml: String,
    },

    /// The text decoded, but not to a mapping.
    #[error("not an object: document decoded to {found}")]
    NotAnObject {
        /// Kind of value that was found instead.
        found: &'static str,
    },
}

/// Result alias for parser operations.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Encoding a spec was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpecFormat {
    /// JSON text.
    Json,
    /// YAML text.
    Yaml,
}

impl SpecFormat {
    /// Guess the display format from raw content: `{` prefix means JSON.
    #[must_use]
    pub fn sniff(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Yaml
        }
    }
}

/// A decoded spec document with its key order preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpecDocument {
    /// Format the text was decoded from.
    pub format: SpecFormat,

    /// The decoded top-level mapping.
    #[schema(value_type = Object)]
    pub content: Map<String, Value>,
}

impl SpecDocument {
    /// Whether any of the well-known OpenAPI/Swagger keys is present.
    #[must_use]
    pub fn looks_like_openapi(&self) -> bool {
        OPENAPI_MARKER_KEYS
            .iter()
            .any(|key| self.content.contains_key(*key))
    }

    /// Advisory warnings about the document. Never blocking.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        if self.looks_like_openapi() {
            Vec::new()
        } else {
            vec![format!(
                "document has none of the expected top-level keys ({})",
                OPENAPI_MARKER_KEYS.join(", ")
            )]
        }
    }

    /// The document as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.content.clone())
    }
}

/// Decoding strategy derived from the filename hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    JsonOnly,
    YamlOnly,
    JsonThenYaml,
}

impl Strategy {
    fn from_hint(filename: Option<&str>) -> Self {
        let Some(name) = filename.map(str::to_ascii_lowercase) else {
            return Self::JsonThenYaml;
        };
        if name.ends_with(".json") {
            Self::JsonOnly
        } else if name.ends_with(".yaml") || name.ends_with(".yml") {
            Self::YamlOnly
        } else {
            Self::JsonThenYaml
        }
    }
}

/// Parse spec text into a [`SpecDocument`].
///
/// `filename` is only a hint; it selects the decoding order, never the
/// outcome of a successful decode.
///
/// # Errors
///
/// Returns a [`ParseError`] when the text cannot be decoded or does not
/// decode to a mapping.
pub fn parse_spec(text: &str, filename: Option<&str>) -> ParseResult<SpecDocument> {
    let (format, value) = match Strategy::from_hint(filename) {
        Strategy::JsonOnly => (SpecFormat::Json, parse_json(text)?),
        Strategy::YamlOnly => (SpecFormat::Yaml, parse_yaml(text)?),
        Strategy::JsonThenYaml => match parse_json(text) {
            Ok(value) => (SpecFormat::Json, value),
            Err(json_err) => match parse_yaml(text) {
                Ok(value) => (SpecFormat::Yaml, value),
                Err(yaml_err) => {
                    return Err(ParseError::Unrecognized {
                        json: json_err.to_string(),
                        yaml: yaml_err.to_string(),
                    })
                }
            },
        },
    };

    match value {
        Value::Object(content) => {
            let document = SpecDocument { format, content };
            for warning in document.warnings() {
                tracing::warn!(%warning, "spec parsed with advisory warning");
            }
            Ok(document)
        }
        other => Err(ParseError::NotAnObject {
            found: value_kind(&other),
        }),
    }
}

/// Decode JSON or YAML text into a generic value, JSON first.
///
/// Used where any decoded value is acceptable, e.g. diff normalization.
///
/// # Errors
///
/// Returns [`ParseError::Unrecognized`] when both decoders fail.
pub fn parse_any(text: &str) -> ParseResult<Value> {
    match parse_json(text) {
        Ok(value) => Ok(value),
        Err(json_err) => parse_yaml(text).map_err(|yaml_err| ParseError::Unrecognized {
            json: json_err.to_string(),
            yaml: yaml_err.to_string(),
        }),
    }
}

fn parse_json(text: &str) -> ParseResult<Value> {
    serde_json::from_str(text).map_err(ParseError::InvalidJson)
}

/// Tolerant load first (non-string keys stringified, tags dropped), strict
/// load second. If both fail the tolerant loader's error is reported.
fn parse_yaml(text: &str) -> ParseResult<Value> {
    let tolerant = serde_yaml::from_str::<serde_yaml::Value>(text).map(yaml_to_json);
    match tolerant {
        Ok(value) => Ok(value),
        Err(original) => serde_yaml::from_str::<Value>(text).map_err(|_| ParseError::InvalidYaml(original)),
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number_to_json(&n),
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(yaml_key_to_string(key), yaml_to_json(value));
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_number_to_json(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map_or_else(|| Value::String(n.to_string()), Value::Number)
    }
}

/// OpenAPI YAML routinely uses bare status codes (`200:`) as keys.
fn yaml_key_to_string(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => s,
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Null => "null".to_string(),
        Yaml::Tagged(tagged) => yaml_key_to_string(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
