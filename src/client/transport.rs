//! The HTTP seam of the client.
//!
//! Services talk to a [`Transport`]; [`HttpTransport`] is the reqwest-backed implementation.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Method;
use serde_json::Value;

use super::error::{ServiceError, ServiceResult};

/// A fully prepared request, relative to the API base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

/// Raw response: status code and body text.
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
}

pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, ServiceResult<ApiReply>>;
}

/// Transport over a pooled reqwest client with a fixed timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ServiceResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, ServiceResult<ApiReply>> {
        Box::pin(async move {
            let url = format!("{}{}", self.base_url, request.path);
            let mut builder = self.http.request(request.method.clone(), &url);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            for (name, value) in &request.headers {
                builder = builder.header(*name, value);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|e| {
                tracing::warn!(method = %request.method, url = %url, "Request failed: {}", e);
                ServiceError::from(e)
            })?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok(ApiReply { status, body })
        })
    }
}
