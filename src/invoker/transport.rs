//! Backend transport.
//!
//! # Responsibilities
//! - Define the abstract `send(endpoint, request)` capability
//! - Provide an HTTP implementation over the hyper-util client
//!
//! # Design Decisions
//! - Any HTTP status is a response; only I/O failures are errors
//! - Response bodies are collected so a dropped attempt leaves nothing behind
//! - The transport never retries; failover owns retries

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use url::Url;

use crate::load_balancer::endpoint::Endpoint;

/// Outbound request handed to the transport.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    /// Path appended to the endpoint target.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BackendRequest {
    /// A bodiless request (e.g., health probes).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// Backend response.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid backend uri '{0}'")]
    InvalidUri(String),

    #[error("connection to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("failed to read response body: {0}")]
    Body(String),
}

pub type TransportFuture<'a> = BoxFuture<'a, Result<BackendResponse, TransportError>>;

/// Capability to issue a call to a backend endpoint.
pub trait Transport: Send + Sync + std::fmt::Debug {
    fn send<'a>(&'a self, endpoint: &'a Endpoint, request: BackendRequest) -> TransportFuture<'a>;
}

/// HTTP/1.1 and HTTP/2 transport backed by the hyper-util legacy client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Join the endpoint target with the request path and query.
pub fn backend_uri(target: &Url, request: &BackendRequest) -> String {
    let mut uri = target.as_str().trim_end_matches('/').to_string();
    if !request.path.starts_with('/') {
        uri.push('/');
    }
    uri.push_str(&request.path);
    if let Some(query) = &request.query {
        uri.push('?');
        uri.push_str(query);
    }
    uri
}

impl Transport for HttpTransport {
    fn send<'a>(&'a self, endpoint: &'a Endpoint, request: BackendRequest) -> TransportFuture<'a> {
        async move {
            let uri = backend_uri(endpoint.target(), &request);

            let mut builder = Request::builder().method(request.method).uri(&uri);
            if let Some(headers) = builder.headers_mut() {
                for (name, value) in request.headers.iter() {
                    // Host is derived from the target uri.
                    if name != header::HOST {
                        headers.append(name.clone(), value.clone());
                    }
                }
            }
            let outbound = builder
                .body(Body::from(request.body))
                .map_err(|_| TransportError::InvalidUri(uri.clone()))?;

            let response = self.client.request(outbound).await.map_err(|e| {
                TransportError::Connect {
                    endpoint: endpoint.name().to_string(),
                    reason: e.to_string(),
                }
            })?;

            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), usize::MAX)
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;

            Ok(BackendResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        }
        .boxed()
    }
}
