//! Inbound request model.
//!
//! # Responsibilities
//! - Carry method, path-info, query and headers of the inbound request
//! - Buffer the body on first read so every failover attempt replays it
//! - Build the outbound request handed to the transport
//!
//! # Design Decisions
//! - Body buffering is idempotent; later calls reuse the cached bytes
//! - Buffering is bounded (default 2MB) to protect the gateway

use std::sync::Mutex;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request};

use crate::invoker::transport::BackendRequest;

/// Default maximum body size buffered for replay.
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

enum RequestBody {
    Empty,
    // Body is !Sync; the mutex keeps GatewayRequest Sync.
    Streaming(Mutex<Body>),
    Buffered(Bytes),
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Streaming(_) => f.write_str("Streaming"),
            RequestBody::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
        }
    }
}

/// The inbound request as seen by the dispatch core.
#[derive(Debug)]
pub struct GatewayRequest {
    method: Method,
    path_info: String,
    query: Option<String>,
    headers: HeaderMap,
    body: RequestBody,
    body_limit: usize,
}

impl GatewayRequest {
    /// Create a request without headers or body.
    pub fn new(method: Method, path_info: impl Into<String>) -> Self {
        Self {
            method,
            path_info: path_info.into(),
            query: None,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            body_limit: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Convert an HTTP request. The body stays unread until buffered.
    pub fn from_http(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            path_info: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body: RequestBody::Streaming(Mutex::new(body)),
            body_limit: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Set an already-read body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Buffered(body.into());
        self
    }

    /// Set a body that is read lazily on first buffering.
    pub fn with_streaming_body(mut self, body: Body) -> Self {
        self.body = RequestBody::Streaming(Mutex::new(body));
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Read the body once and cache it. Subsequent calls return the cache.
    pub async fn buffer_body(&mut self) -> Result<Bytes, axum::Error> {
        let body = std::mem::replace(&mut self.body, RequestBody::Empty);
        let bytes = match body {
            RequestBody::Empty => Bytes::new(),
            RequestBody::Buffered(bytes) => bytes,
            RequestBody::Streaming(body) => {
                let body = body.into_inner().unwrap_or_else(|e| e.into_inner());
                axum::body::to_bytes(body, self.body_limit).await?
            }
        };
        self.body = RequestBody::Buffered(bytes.clone());
        Ok(bytes)
    }

    /// Cached body, if it has been buffered.
    pub fn buffered_body(&self) -> Option<&Bytes> {
        match &self.body {
            RequestBody::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Build the outbound request. The body must have been buffered.
    pub fn to_backend_request(&self) -> BackendRequest {
        BackendRequest {
            method: self.method.clone(),
            path: self.path_info.clone(),
            query: self.query.clone(),
            headers: self.headers.clone(),
            body: self.buffered_body().cloned().unwrap_or_default(),
        }
    }
}
