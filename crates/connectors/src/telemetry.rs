use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

/// Per-server query counters with a running average latency.
#[derive(Clone, Default)]
pub struct Telemetry {
    inner: Arc<Mutex<HashMap<String, ServerStats>>>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub queries: u64,
    pub avg_latency_ms: f64,
}

impl Telemetry {
    pub fn new() -> Self {
        Telemetry::default()
    }

    pub fn record(&self, server: &str, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let mut guard = self.inner.lock().expect("telemetry poisoned");
        let stats = guard.entry(server.to_string()).or_default();
        stats.queries += 1;
        stats.avg_latency_ms += (ms - stats.avg_latency_ms) / stats.queries as f64;
    }

    pub fn snapshot(&self) -> HashMap<String, ServerStats> {
        self.inner.lock().expect("telemetry poisoned").clone()
    }
}
