//! Word Lookup Client (dictionaryapi.dev)

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::ServiceError;

const DICTIONARY_BASE_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Dictionary lookup
#[async_trait]
pub trait WordLookup: Send + Sync {
    /// First definition of `word`, `None` when the word is unknown
    async fn define(&self, word: &str) -> Result<Option<String>, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    meanings: Vec<Meaning>,
}

#[derive(Debug, Deserialize)]
struct Meaning {
    #[serde(default)]
    definitions: Vec<Definition>,
}

#[derive(Debug, Deserialize)]
struct Definition {
    definition: String,
}

fn first_definition(entries: Vec<Entry>) -> Option<String> {
    entries
        .into_iter()
        .flat_map(|e| e.meanings)
        .flat_map(|m| m.definitions)
        .map(|d| d.definition)
        .next()
}

#[derive(Clone)]
pub struct DictionaryClient {
    client: Client,
    base_url: Url,
}

impl DictionaryClient {
    pub fn new() -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = Url::parse(DICTIONARY_BASE_URL)
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn entry_url(&self, word: &str) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::Malformed("base url cannot hold a path".to_string()))?
            .pop_if_empty()
            .push(word);
        Ok(url)
    }
}

#[async_trait]
impl WordLookup for DictionaryClient {
    async fn define(&self, word: &str) -> Result<Option<String>, ServiceError> {
        let url = self.entry_url(word)?;
        debug!("Dictionary lookup: {}", url);

        let response = self.client.get(url).send().await?;

        // Unknown words come back as 404
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }

        let entries: Vec<Entry> = response.json().await?;
        Ok(first_definition(entries))
    }
}
