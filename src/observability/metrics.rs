//! Metrics collection.
//!
//! # Responsibilities
//! - Define dispatch metrics (flow resolution, endpoint selection, failover)
//! - Track per-API and per-endpoint counters and gauges
//!
//! # Metrics
//! - `dispatch_flows_resolved_total` (counter): flows retained by the resolver
//! - `dispatch_endpoint_selected_total` (counter): picks by api, endpoint
//! - `dispatch_endpoint_unavailable_total` (counter): empty candidate sets by api
//! - `dispatch_failover_attempts_total` (counter): attempts made by failover, by api
//! - `dispatch_circuit_breaker_state` (gauge): 0=closed, 1=half-open, 2=open, by key
//! - `dispatch_endpoints_registered` (gauge): registered endpoints by api, available or not
//! - `dispatch_endpoint_health` (gauge): 1=available, 0=unavailable, by api, endpoint
//!
//! # Design Decisions
//! - Facade only: no recorder is installed here, the host process picks one
//! - Without a recorder every call is a no-op

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!("dispatch_flows_resolved_total", "Flows retained by flow resolution");
    describe_counter!(
        "dispatch_endpoint_selected_total",
        "Endpoints selected by the load balancer"
    );
    describe_counter!(
        "dispatch_endpoint_unavailable_total",
        "Invocations failed for lack of an available endpoint"
    );
    describe_counter!(
        "dispatch_failover_attempts_total",
        "Delegate attempts made by the failover invoker"
    );
    describe_gauge!(
        "dispatch_circuit_breaker_state",
        "Circuit breaker state (0=closed, 1=half-open, 2=open)"
    );
    describe_gauge!("dispatch_endpoints_registered", "Endpoints registered per API");
    describe_gauge!("dispatch_endpoint_health", "Endpoint availability from health checks");
}

pub fn record_flows_resolved(count: usize) {
    counter!("dispatch_flows_resolved_total").increment(count as u64);
}

pub fn record_endpoint_selected(api: &str, endpoint: &str) {
    counter!(
        "dispatch_endpoint_selected_total",
        "api" => api.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

pub fn record_endpoint_unavailable(api: &str) {
    counter!("dispatch_endpoint_unavailable_total", "api" => api.to_string()).increment(1);
}

pub fn record_failover_attempt(api: &str) {
    counter!("dispatch_failover_attempts_total", "api" => api.to_string()).increment(1);
}

pub fn record_circuit_state(key: &str, state: f64) {
    gauge!("dispatch_circuit_breaker_state", "key" => key.to_string()).set(state);
}

pub fn record_endpoints_registered(api: &str, count: usize) {
    gauge!("dispatch_endpoints_registered", "api" => api.to_string()).set(count as f64);
}

pub fn record_endpoint_health(api: &str, endpoint: &str, available: bool) {
    gauge!(
        "dispatch_endpoint_health",
        "api" => api.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .set(if available { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use std::sync::Mutex;

    /// Remembers the names of registered gauges.
    #[derive(Debug, Default)]
    struct GaugeNames(Mutex<Vec<String>>);

    impl Recorder for GaugeNames {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            self.0.lock().unwrap().push(key.name().to_string());
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_registered_count_gauge_name() {
        let recorder = GaugeNames::default();
        metrics::with_local_recorder(&recorder, || record_endpoints_registered("api-1", 3));
        assert_eq!(*recorder.0.lock().unwrap(), vec!["dispatch_endpoints_registered"]);
    }
}
