//! Request context: who is calling and for which company.
//!
//! The context is resolved once from a [`SessionStore`] and handed to the client explicitly.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use serde_json::Value;

/// Keys checked for the auth token, highest priority first.
pub const TOKEN_KEYS: [&str; 3] = ["authToken", "token", "accessToken"];

/// Keys checked for the current company, highest priority first.
pub const COMPANY_KEYS: [&str; 3] = ["currentCompany", "companyId", "selectedCompany"];

/// Persisted key-value storage holding session values.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory session store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Session store backed by a JSON object on disk.
///
/// String values are returned as-is; any other JSON value is returned as its JSON text.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    values: serde_json::Map<String, Value>,
}

impl FileStore {
    pub fn open(path: &Path) -> io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let values = match serde_json::from_str::<Value>(&raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        {
            Value::Object(map) => map,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "session file must contain a JSON object",
                ))
            }
        };
        Ok(Self { values })
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Credentials and company scope attached to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub token: Option<String>,
    pub company_id: Option<String>,
}

impl RequestContext {
    pub fn new(token: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            company_id: Some(company_id.into()),
        }
    }

    /// Resolve the context from a session store: the first non-empty key wins.
    pub fn from_store(store: &dyn SessionStore) -> Self {
        let token = first_present(store, &TOKEN_KEYS);
        let company_id = first_present(store, &COMPANY_KEYS).and_then(|raw| company_from_value(&raw));

        if token.is_none() {
            tracing::debug!("No auth token found in session store");
        }
        Self { token, company_id }
    }

    /// Headers to attach, in `(name, value)` form.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(2);
        if let Some(token) = &self.token {
            headers.push(("authorization", format!("Bearer {}", token)));
        }
        if let Some(company) = &self.company_id {
            headers.push((crate::auth::COMPANY_HEADER, company.clone()));
        }
        headers
    }
}

fn first_present(store: &dyn SessionStore, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| store.get(key))
        .map(|v| v.trim().to_string())
        .find(|v| !is_blank(v))
}

/// Browser storage tends to hold the literal strings "null" and "undefined".
fn is_blank(value: &str) -> bool {
    value.is_empty() || value == "null" || value == "undefined"
}

/// A stored company is either a bare id or a JSON object carrying `_id` or `id`.
fn company_from_value(raw: &str) -> Option<String> {
    if !raw.starts_with('{') {
        return Some(raw.to_string());
    }
    let value: Value = serde_json::from_str(raw).ok()?;
    ["_id", "id"]
        .iter()
        .filter_map(|field| match value.get(field)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .find(|id| !is_blank(id))
}
