//! Process-wide counters exposed in the Prometheus text format.
//!
//! The registry is built once in `main` and handed to the request
//! handlers.  Handlers only ever increment; nothing in the probing core
//! reads these values.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub requests: IntCounterVec,
    pub errors: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "The number of received http requests"),
            &["handler", "method"],
        )?;
        let errors = IntCounter::new("errors_total", "The total number of errors")?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;
        Ok(Self {
            registry,
            requests,
            errors,
        })
    }

    pub fn record_request(&self, handler: &str, method: &str) {
        self.requests.with_label_values(&[handler, method]).inc();
    }

    pub fn record_error(&self) {
        self.errors.inc();
    }

    /// Encode every registered metric family as text.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_the_exposition() {
        let m = Metrics::new().unwrap();
        m.record_request("/vector", "GET");
        m.record_request("/vector", "GET");
        m.record_error();

        assert_eq!(m.requests.with_label_values(&["/vector", "GET"]).get(), 2);
        let text = m.encode().unwrap();
        assert!(text.contains("http_requests_total{handler=\"/vector\",method=\"GET\"} 2"));
        assert!(text.contains("errors_total 1"));
    }

    #[test]
    fn registries_are_independent() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_error();
        assert_eq!(b.errors.get(), 0);
    }
}
