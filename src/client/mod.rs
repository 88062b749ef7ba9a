//! Typed client for the Bizdesk REST API.
//!
//! [`ApiClient`] attaches the [`RequestContext`] headers, sends through a [`Transport`] and
//! decodes the response envelope into a [`ServiceResult`]. [`StaffService`] and
//! [`TaskService`] build the endpoint contracts on top of it.

mod cache;
mod context;
mod error;
mod staff;
mod tasks;
#[cfg(test)]
pub(crate) mod test_support;
mod transport;

pub use cache::*;
pub use context::*;
pub use error::*;
pub use staff::*;
pub use tasks::*;
pub use transport::*;

use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;

/// Longest slice of a non-JSON error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

/// Low-level API client bound to one request context.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    context: RequestContext,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, context: RequestContext) -> Self {
        Self { transport, context }
    }

    /// Build a client that talks HTTP to `config.base_url`.
    pub fn from_config(config: &ClientConfig, context: RequestContext) -> ServiceResult<Self> {
        let transport = HttpTransport::new(&config.base_url, config.timeout)?;
        Ok(Self::new(Arc::new(transport), context))
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// A client sharing this transport but carrying another context.
    pub fn with_context(&self, context: RequestContext) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            context,
        }
    }

    pub async fn get<T, P>(&self, path: &str, params: &P) -> ServiceResult<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.execute(Method::GET, path, query_pairs(params)?, None)
            .await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> ServiceResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.execute(Method::POST, path, Vec::new(), Some(body))
            .await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> ServiceResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.execute(Method::PUT, path, Vec::new(), Some(body))
            .await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> ServiceResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.execute(Method::PATCH, path, Vec::new(), Some(body))
            .await
    }

    pub async fn delete<T, P>(&self, path: &str, params: &P) -> ServiceResult<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.execute(Method::DELETE, path, query_pairs(params)?, None)
            .await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> ServiceResult<T> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            query,
            headers: self.context.headers(),
            body,
        };
        let reply = self.transport.send(request).await?;
        decode_reply(reply)
    }
}

/// Turn a reply into data or a categorized error.
fn decode_reply<T: DeserializeOwned>(reply: ApiReply) -> ServiceResult<T> {
    let parsed: Option<Value> = serde_json::from_str(&reply.body).ok();
    let succeeded = (200..300).contains(&reply.status);

    match parsed {
        Some(mut envelope) if succeeded && envelope["success"] != Value::Bool(false) => {
            if let Some(message) = envelope.get("message").and_then(Value::as_str) {
                tracing::debug!("API: {}", message);
            }
            let data = envelope
                .get_mut("data")
                .map(Value::take)
                .unwrap_or(Value::Null);
            Ok(serde_json::from_value(data)?)
        }
        Some(envelope) => {
            let code = envelope["error"]["code"].as_str().map(str::to_string);
            let message = envelope["error"]["message"]
                .as_str()
                .or_else(|| envelope["message"].as_str())
                .unwrap_or("Request failed")
                .to_string();
            // A 2xx carrying `success: false` is reported as a bad request.
            let status = if succeeded { 400 } else { reply.status };
            Err(ServiceError::from_status(status, code, message))
        }
        None if succeeded => Err(ServiceError::decode("Response body is not JSON")),
        None => {
            let text: String = reply.body.trim().chars().take(MAX_ERROR_BODY).collect();
            let message = if text.is_empty() {
                format!("Request failed with status {}", reply.status)
            } else {
                text
            };
            Err(ServiceError::from_status(reply.status, None, message))
        }
    }
}

/// Flatten serializable parameters into query pairs. `null` fields are dropped.
pub fn query_pairs<P: Serialize + ?Sized>(params: &P) -> ServiceResult<Vec<(String, String)>> {
    let value = serde_json::to_value(params)?;
    let Value::Object(map) = value else {
        return Ok(Vec::new());
    };

    Ok(map
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect())
}

/// Bytes escaped in a path segment: everything except RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// `{collection}/{id}` with the id trimmed and percent-encoded as a single segment.
pub(crate) fn resource_path(collection: &str, id: &str, what: &str) -> ServiceResult<String> {
    let id = id.trim();
    if id.is_empty() || id == "." || id == ".." {
        return Err(ServiceError::validation(format!("{} id is required", what)));
    }
    Ok(format!(
        "{}/{}",
        collection,
        utf8_percent_encode(id, PATH_SEGMENT)
    ))
}

/// A rejected session on a collection read yields an empty collection instead of an error.
pub(crate) fn swallow_unauthorized<T: Default>(
    operation: &str,
    result: ServiceResult<T>,
) -> ServiceResult<T> {
    match result {
        Err(err) if err.kind == ErrorKind::Authentication => {
            tracing::warn!(operation = %operation, "Unauthorized response treated as empty: {}", err.message);
            Ok(T::default())
        }
        other => other,
    }
}
