//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use gateway_dispatch::config::{
    ApiDefinition, EndpointConfig, EndpointGroupConfig, FailoverConfig, LoadBalancerType,
};
use gateway_dispatch::el::{EvaluationError, ExpressionEvaluator};
use gateway_dispatch::invoker::{BackendRequest, BackendResponse, TransportError, TransportFuture};
use gateway_dispatch::load_balancer::endpoint::Endpoint;
use gateway_dispatch::{ExecutionContext, GatewayRequest, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Scripted result of one transport call.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Status(u16),
    Refused,
    Hang,
}

/// A programmable backend transport.
#[derive(Debug)]
pub struct MockTransport {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    latency: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, BackendRequest)>>,
}

impl MockTransport {
    /// Answers 200 to every call.
    pub fn ok() -> Self {
        Self::scripted(Vec::new(), Outcome::Status(200))
    }

    /// Refuses every call.
    pub fn refusing() -> Self {
        Self::scripted(Vec::new(), Outcome::Refused)
    }

    /// Plays `script` in order, then `fallback` forever.
    pub fn scripted(script: Vec<Outcome>, fallback: Outcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Names of the endpoints called, in order.
    pub fn endpoints(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Bodies sent, in order.
    pub fn bodies(&self) -> Vec<Bytes> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| request.body.clone())
            .collect()
    }
}

impl Transport for MockTransport {
    fn send<'a>(&'a self, endpoint: &'a Endpoint, request: BackendRequest) -> TransportFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.name().to_string(), request));
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);

        async move {
            tokio::time::sleep(self.latency).await;
            match outcome {
                Outcome::Status(code) => Ok(BackendResponse::new(StatusCode::from_u16(code).unwrap())
                    .with_body(endpoint.name().to_string())),
                Outcome::Refused => Err(TransportError::Connect {
                    endpoint: endpoint.name().to_string(),
                    reason: "connection refused".into(),
                }),
                Outcome::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
        .boxed()
    }
}

/// Answers known expressions from a table; unknown ones fail to evaluate.
#[derive(Debug, Default)]
pub struct ScriptedEvaluator {
    answers: HashMap<String, Result<bool, EvaluationError>>,
}

impl ScriptedEvaluator {
    pub fn answer(mut self, expression: &str, result: Result<bool, EvaluationError>) -> Self {
        self.answers.insert(expression.to_string(), result);
        self
    }
}

impl ExpressionEvaluator for ScriptedEvaluator {
    fn eval_bool<'a>(
        &'a self,
        expression: &'a str,
        _ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<bool, EvaluationError>> {
        let result = self.answers.get(expression).cloned().unwrap_or_else(|| {
            Err(EvaluationError::Invalid {
                expression: expression.to_string(),
                reason: "unknown expression".into(),
            })
        });
        futures_util::future::ready(result).boxed()
    }
}

pub fn context(method: Method, path: &str) -> ExecutionContext {
    ExecutionContext::new(GatewayRequest::new(method, path))
}

pub fn endpoint(name: &str, weight: u32, backup: bool) -> EndpointConfig {
    EndpointConfig {
        name: name.into(),
        target: "http://127.0.0.1:3000".into(),
        weight,
        backup,
        tenants: Vec::new(),
    }
}

/// An API with one endpoint group and no flows.
pub fn api(
    endpoints: Vec<EndpointConfig>,
    load_balancer: LoadBalancerType,
    failover: Option<FailoverConfig>,
) -> ApiDefinition {
    ApiDefinition {
        id: "api-1".into(),
        name: "API 1".into(),
        endpoint_groups: vec![EndpointGroupConfig {
            name: "default".into(),
            endpoints,
        }],
        load_balancer,
        failover,
        ..Default::default()
    }
}

/// Start a programmable HTTP/1.1 backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();
                let request_line = head.lines().next().unwrap_or_default().to_string();

                let (status, body) = f(request_line).await;
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
