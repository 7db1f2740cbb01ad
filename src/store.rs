use std::env;
use std::time::Duration;

use anyhow::Context;
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

const REQUEST_TIMEOUT_SECS: u64 = 10;

static CLIENT: OnceCell<Client> = OnceCell::new();

fn http_client() -> Result<&'static Client, StoreError> {
    CLIENT
        .get_or_try_init(|| {
            Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .context("failed to build http client")
        })
        .map_err(StoreError::Transport)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store credentials missing: set STORE_URL and STORE_KEY")]
    Config,
    #[error("store request failed: {0}")]
    Transport(anyhow::Error),
    #[error("store answered http {status} for {collection}")]
    Http {
        collection: String,
        status: u16,
        body: String,
    },
}

/// The generic "query the store with filters, get back rows" primitive.
/// Filters are passed through as query parameters; building them is the
/// caller's job via the helpers below.
pub trait Store {
    /// Raw response payload for one query. Bodies that are not valid JSON
    /// come back as `Value::Null` — a shape problem is "no rows", not a
    /// failure.
    fn fetch(&self, collection: &str, filters: &[(String, String)]) -> Result<Value, StoreError>;

    /// Rows from either a bare array response or a `{data: [...]}` envelope.
    fn fetch_rows(
        &self,
        collection: &str,
        filters: &[(String, String)],
    ) -> Result<Vec<Value>, StoreError> {
        Ok(rows_from_payload(self.fetch(collection, filters)?))
    }
}

pub fn rows_from_payload(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

// PostgREST-style filter builders.
pub fn select(columns: &str) -> (String, String) {
    ("select".to_string(), columns.to_string())
}

pub fn eq(column: &str, value: &str) -> (String, String) {
    (column.to_string(), format!("eq.{value}"))
}

pub fn ilike(column: &str, value: &str) -> (String, String) {
    (column.to_string(), format!("ilike.{value}"))
}

pub fn order_asc(column: &str) -> (String, String) {
    ("order".to_string(), format!("{column}.asc"))
}

pub fn order_desc(column: &str) -> (String, String) {
    ("order".to_string(), format!("{column}.desc"))
}

pub fn limit(n: u32) -> (String, String) {
    ("limit".to_string(), n.to_string())
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub service_key: String,
}

impl StoreConfig {
    /// Reads `STORE_URL` and `STORE_KEY`. Missing or blank values are a
    /// configuration error, surfaced as a 500-class failure and not retried.
    pub fn from_env() -> Result<Self, StoreError> {
        let base_url = env::var("STORE_URL").ok().unwrap_or_default();
        let service_key = env::var("STORE_KEY").ok().unwrap_or_default();
        if base_url.trim().is_empty() || service_key.trim().is_empty() {
            return Err(StoreError::Config);
        }
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            service_key: service_key.trim().to_string(),
        })
    }
}

/// REST-over-HTTP store client (PostgREST dialect).
pub struct RestStore {
    config: StoreConfig,
}

impl RestStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Result<Self, StoreError> {
        Ok(Self::new(StoreConfig::from_env()?))
    }
}

impl Store for RestStore {
    fn fetch(&self, collection: &str, filters: &[(String, String)]) -> Result<Value, StoreError> {
        let client = http_client()?;
        let url = format!("{}/rest/v1/{collection}", self.config.base_url);

        let resp = client
            .get(&url)
            .query(filters)
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .with_context(|| format!("request to {collection} failed"))
            .map_err(StoreError::Transport)?;

        let status = resp.status();
        let body = resp
            .text()
            .context("failed reading store response body")
            .map_err(StoreError::Transport)?;

        if !status.is_success() {
            return Err(StoreError::Http {
                collection: collection.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        // Defensive: a malformed body is zero rows, never a hard failure.
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }
}
