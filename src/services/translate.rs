//! Translation Client (Google Translate web endpoint)
//!
//! Uses the public `client=gtx` endpoint. The response is a nested JSON array
//! whose first element holds `[translated, original, ...]` segments.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::ServiceError;

const TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Text translation
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `source` to `target` (two-letter codes)
    async fn translate(&self, source: &str, target: &str, text: &str) -> Result<String, ServiceError>;
}

/// Join the translated segments of a gtx response
fn parse_segments(body: &Value) -> Result<String, ServiceError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| ServiceError::Malformed("missing segment list".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect();

    if translated.trim().is_empty() {
        return Err(ServiceError::Malformed("empty translation".to_string()));
    }
    Ok(translated)
}

#[derive(Clone)]
pub struct GoogleTranslateClient {
    client: Client,
}

impl GoogleTranslateClient {
    pub fn new() -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Translator for GoogleTranslateClient {
    async fn translate(&self, source: &str, target: &str, text: &str) -> Result<String, ServiceError> {
        debug!("Translating {} -> {} ({} chars)", source, target, text.len());

        let response = self
            .client
            .get(TRANSLATE_URL)
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        parse_segments(&body)
    }
}
