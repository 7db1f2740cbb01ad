use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::normalize::normalized_key;
use crate::store::{Store, StoreError, rows_from_payload};

/// In-memory store with just enough PostgREST filter semantics for tests
/// and offline runs: `eq.` (exact), `ilike.` (case/diacritic-insensitive),
/// `limit`. `select` and `order` are accepted and ignored.
#[derive(Default)]
pub struct FakeStore {
    collections: HashMap<String, Value>,
    failing: HashMap<String, u16>,
    queries: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, collection: &str, rows: Vec<Value>) -> Self {
        self.collections
            .insert(collection.to_string(), Value::Array(rows));
        self
    }

    /// Raw payload form, for envelope responses (`{data, resolved_date}`).
    pub fn with_payload(mut self, collection: &str, payload: Value) -> Self {
        self.collections.insert(collection.to_string(), payload);
        self
    }

    /// Script an HTTP failure for one collection.
    pub fn failing(mut self, collection: &str, status: u16) -> Self {
        self.failing.insert(collection.to_string(), status);
        self
    }

    /// Collections queried so far, in order. Used to assert probe order.
    pub fn queried(&self) -> Vec<String> {
        self.queries.lock().expect("query log lock poisoned").clone()
    }
}

impl Store for FakeStore {
    fn fetch(&self, collection: &str, filters: &[(String, String)]) -> Result<Value, StoreError> {
        self.queries
            .lock()
            .expect("query log lock poisoned")
            .push(collection.to_string());

        if let Some(&status) = self.failing.get(collection) {
            return Err(StoreError::Http {
                collection: collection.to_string(),
                status,
                body: String::new(),
            });
        }

        let Some(payload) = self.collections.get(collection) else {
            return Ok(Value::Array(Vec::new()));
        };

        // Envelope payloads pass through untouched; filtering applies to
        // plain row arrays only.
        if !payload.is_array() {
            return Ok(payload.clone());
        }

        let mut rows = rows_from_payload(payload.clone());
        let mut limit: Option<usize> = None;

        for (key, spec) in filters {
            match key.as_str() {
                "select" | "order" => {}
                "limit" => limit = spec.parse().ok(),
                column => {
                    if let Some(wanted) = spec.strip_prefix("eq.") {
                        rows.retain(|row| field_as_string(row, column).as_deref() == Some(wanted));
                    } else if let Some(wanted) = spec.strip_prefix("ilike.") {
                        let wanted = normalized_key(wanted);
                        rows.retain(|row| {
                            field_as_string(row, column)
                                .map(|v| normalized_key(&v) == wanted)
                                .unwrap_or(false)
                        });
                    }
                }
            }
        }

        if let Some(n) = limit {
            rows.truncate(n);
        }
        Ok(Value::Array(rows))
    }
}

fn field_as_string(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
