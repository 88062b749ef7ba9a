//! In-memory transport for unit tests.

use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Method;

use super::error::ServiceResult;
use super::transport::{ApiReply, ApiRequest, Transport};

type Responder = Box<dyn Fn(&ApiRequest) -> ApiReply + Send + Sync>;

/// Records every request and answers from a responder function.
pub struct FakeTransport {
    responder: Responder,
    requests: Mutex<Vec<ApiRequest>>,
    delay: Option<Duration>,
    method_delays: Vec<(Method, Duration)>,
}

impl FakeTransport {
    pub fn new(responder: impl Fn(&ApiRequest) -> ApiReply + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            delay: None,
            method_delays: Vec::new(),
        }
    }

    /// Hold every reply for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold replies to `method` for `delay`, overriding [`with_delay`](Self::with_delay).
    pub fn with_method_delay(mut self, method: Method, delay: Duration) -> Self {
        self.method_delays.push((method, delay));
        self
    }

    /// Answer every request with the same status and body.
    pub fn replying(status: u16, body: &str) -> Self {
        let body = body.to_string();
        Self::new(move |_| ApiReply {
            status,
            body: body.clone(),
        })
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, ServiceResult<ApiReply>> {
        let reply = (self.responder)(&request);
        let delay = self
            .method_delays
            .iter()
            .find(|(method, _)| *method == request.method)
            .map(|(_, delay)| *delay)
            .or(self.delay);
        self.requests.lock().unwrap().push(request);
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(reply)
        })
    }
}
