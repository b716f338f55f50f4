use std::env;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use snapmagic_contracts::photos::EditedImage;

use super::ImageEditor;
use crate::codec::{self, ImagePayload};
use crate::error::EditError;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_TIMEOUT_S: f64 = 90.0;
const API_KEY_HEADER: &str = "x-goog-api-key";
const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

#[derive(Debug, Clone)]
enum Credential {
    Env,
    Fixed(Option<String>),
}

/// Edits through the Gemini `generateContent` endpoint with image output.
pub struct GeminiEditor {
    api_base: String,
    model: String,
    timeout: Duration,
    credential: Credential,
    http: HttpClient,
}

impl GeminiEditor {
    pub fn from_env() -> Self {
        let api_base = non_empty_env("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());
        let model = non_empty_env("SNAPMAGIC_IMAGE_MODEL")
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());
        let timeout_s = non_empty_env("SNAPMAGIC_REQUEST_TIMEOUT")
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .unwrap_or(DEFAULT_TIMEOUT_S)
            .clamp(5.0, 600.0);
        Self {
            api_base,
            model,
            timeout: Duration::from_secs_f64(timeout_s),
            credential: Credential::Env,
            http: HttpClient::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model.trim().to_string();
        }
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim().trim_end_matches('/').to_string();
        self
    }

    /// Pins the credential instead of reading the environment on each call.
    /// `None` pins "no credential".
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.credential = Credential::Fixed(api_key);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn api_key(&self) -> Option<String> {
        match &self.credential {
            Credential::Env => API_KEY_VARS.iter().find_map(|key| non_empty_env(key)),
            Credential::Fixed(value) => value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        }
    }

    fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_payload(payload: &ImagePayload, prompt: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": payload.mime_type,
                            "data": payload.base64(),
                        }
                    },
                    { "text": prompt },
                ],
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
            },
        })
    }

    fn extract_edited_image(response: &Value) -> Result<EditedImage, EditError> {
        let parts = response
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for part in parts {
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
                EditError::Service(format!("Gemini image base64 decode failed: {err}"))
            })?;
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str);
            return Ok(codec::decode(bytes, mime_type));
        }

        Err(EditError::EmptyResult(empty_result_reason(response)))
    }
}

impl ImageEditor for GeminiEditor {
    fn name(&self) -> &str {
        "gemini"
    }

    fn edit(&self, payload: &ImagePayload, prompt: &str) -> Result<EditedImage, EditError> {
        let Some(api_key) = self.api_key() else {
            return Err(EditError::Configuration(format!(
                "{} not set",
                API_KEY_VARS.join(" or ")
            )));
        };
        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key.as_str())
            .timeout(self.timeout)
            .json(&Self::build_payload(payload, prompt))
            .send()?;
        let response_payload = response_json_or_error("Gemini", response)?;
        Self::extract_edited_image(&response_payload)
    }
}

fn empty_result_reason(response: &Value) -> String {
    if let Some(reason) = response
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
    {
        return format!("prompt blocked ({reason})");
    }
    if let Some(reason) = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("finishReason"))
        .and_then(Value::as_str)
    {
        return format!("no image part (finish reason {reason})");
    }
    "no image part in response".to_string()
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value, EditError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| EditError::Service(format!("{provider} response body read failed: {err}")))?;
    if !status.is_success() {
        return Err(EditError::Service(format!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        )));
    }
    serde_json::from_str(&body).map_err(|err| {
        EditError::Service(format!("{provider} returned invalid JSON payload: {err}"))
    })
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
