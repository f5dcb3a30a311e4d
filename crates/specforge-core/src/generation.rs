//! AI client generation.
//!
//! A [`ClientGenerator`] turns a prompt into JavaScript source. The production
//! implementation, [`GeminiGenerator`], makes one `generateContent` call per
//! request and never retries.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::GenerationConfig;

/// First fenced JavaScript block in a model answer.
static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:javascript|js)([\s\S]*?)```").expect("Invalid regex pattern"));

/// Longest upstream body quoted back in an error.
const MAX_ERROR_BODY: usize = 500;

/// Errors raised while generating client code.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No API key is configured.
    #[error("generation API key is not configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    /// The HTTP request could not be sent or its body not read.
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("generation endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The endpoint answered 2xx but without generated text.
    #[error("invalid response format from generation endpoint: {0}")]
    MalformedResponse(String),
}

/// Result alias for generation operations.
pub type GenerationResult<T> = std::result::Result<T, GenerationError>;

/// Produces client source code from a prompt.
#[async_trait]
pub trait ClientGenerator: Send + Sync {
    /// Send `prompt` and return the extracted client code.
    async fn generate(&self, prompt: &str) -> GenerationResult<String>;
}

// ============================================================================
// Prompt construction
// ============================================================================

/// Build the generation prompt.
///
/// With `previous_client` the model is asked to update that code for the new
/// spec instead of writing a client from scratch.
#[must_use]
pub fn build_prompt(spec: &str, version: &str, previous_client: Option<&str>) -> String {
    let header = "Generate a JavaScript client library for the following OpenAPI specification.\n\
                  The client should provide functions for all the endpoints defined in the spec.";
    let version_line =
        format!("Make sure to include the version \"{version}\" in a comment at the top of the file.");
    let format_line =
        "Format the output as JavaScript code only, with detailed comments for each function.";

    match previous_client {
        Some(previous) => format!(
            "{header}\n\n\
             I have a previous version of the client code and need to update it based on the new API specification.\n\n\
             Here's the previous client code:\n{previous}\n\n\
             Here's the new API specification:\n{spec}\n\n\
             Please focus on updating only the parts affected by the changes in the spec.\n\
             {format_line}\n\n\
             {version_line}"
        ),
        None => format!(
            "{header}\n\
             {format_line}\n\n\
             {version_line}\n\n\
             Here's the OpenAPI specification:\n{spec}"
        ),
    }
}

/// Pull the first fenced JavaScript block out of `text`, or return it whole.
#[must_use]
pub fn extract_code(text: &str) -> String {
    CODE_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| text.to_string(), |m| m.as_str().trim().to_string())
}

// ============================================================================
// Gemini
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiGenerator {
    /// Build a generator from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::MissingApiKey`] when no key is configured,
    /// or a request error if the HTTP client cannot be built.
    pub fn new(config: &GenerationConfig) -> GenerationResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(GenerationError::MissingApiKey)?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.api_base.trim_end_matches('/'),
                config.model
            ),
            api_key,
        })
    }
}

#[async_trait]
impl ClientGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> GenerationResult<String> {
        info!(prompt_len = prompt.len(), "Calling generation endpoint");

        let body = GenerateContentRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };
        let response = self
            .client
            .post(format!("{}?key={}", self.endpoint, self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(redact)?;

        let status = response.status();
        let text = response.text().await.map_err(redact)?;

        if !status.is_success() {
            error!(status = status.as_u16(), "Generation endpoint error");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let generated = serde_json::from_str::<GenerateContentResponse>(&text)
            .ok()
            .and_then(GenerateContentResponse::into_text)
            .ok_or_else(|| {
                error!("Generation endpoint returned no candidate text");
                GenerationError::MalformedResponse(truncate(&text, MAX_ERROR_BODY))
            })?;

        let code = extract_code(&generated);
        debug!(code_len = code.len(), "Client code extracted");
        Ok(code)
    }
}

/// The request URL carries the API key.
fn redact(err: reqwest::Error) -> GenerationError {
    GenerationError::Request(err.without_url())
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
