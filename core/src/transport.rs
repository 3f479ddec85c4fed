//! The network boundary.
//!
//! A `Transport` executes one `HttpRequest` and returns the raw status and
//! body. Non-2xx statuses are data, not errors: status interpretation belongs
//! to the response decoder. Only a failed round trip (connection refused,
//! timeout, unreadable body) is a `UsersError::Transport`.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{UsersError, UsersResult};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub trait Transport {
    fn send(&self, request: &HttpRequest) -> UsersResult<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> UsersResult<HttpResponse> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &HttpRequest) -> UsersResult<HttpResponse> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &HttpRequest) -> UsersResult<HttpResponse> {
        (**self).send(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
///
/// The core imposes no timeout; pass one to [`UreqTransport::with_timeout`]
/// to bound each round trip.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> UsersResult<HttpResponse> {
        let url = request.url.as_str();
        let headers = &request.headers;
        let body = request.body.as_deref();

        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), headers).call(),
            HttpMethod::Post => {
                let builder = with_headers(self.agent.post(url), headers);
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Put => {
                let builder = with_headers(self.agent.put(url), headers);
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = result.map_err(|e| UsersError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| UsersError::Transport(e.to_string()))?;

        tracing::debug!(method = %request.method, url, status, "round trip complete");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
