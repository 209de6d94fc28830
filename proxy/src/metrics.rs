//! Prometheus metrics for SILTA

use crate::error::{Result, SiltaError};
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
    register_counter_vec, register_gauge, register_histogram_vec, register_int_counter,
    register_int_counter_vec,
};
use parking_lot::Mutex;
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Serializes registration with the global prometheus registry
static INIT: Mutex<()> = Mutex::new(());

/// All SILTA metrics
pub struct Metrics {
    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────
    /// Live proxied sessions
    pub active_sessions: Gauge,

    /// Sessions accepted since start
    pub sessions_total: IntCounter,

    /// Session terminations (by reason)
    pub session_terminations: IntCounterVec,

    /// Session lifetime in seconds
    pub session_duration_seconds: HistogramVec,

    // ─────────────────────────────────────────────────────────────────────────
    // Traffic
    // ─────────────────────────────────────────────────────────────────────────
    /// Requests handed to the upstream queue (by type, kind)
    pub requests_forwarded: CounterVec,

    /// Responses handed to the downstream queue (by type)
    pub responses_forwarded: CounterVec,

    // ─────────────────────────────────────────────────────────────────────────
    // Extension config translation
    // ─────────────────────────────────────────────────────────────────────────
    /// NACKs synthesized by the translator
    pub nacks_synthesized: IntCounter,

    /// Responses withheld while modules are pending
    pub responses_withheld: IntCounter,

    /// Module cache lookups (by outcome)
    pub module_resolutions: IntCounterVec,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Returns error if metric registration fails.
    #[allow(clippy::result_large_err)]
    pub fn init() -> Result<&'static Metrics> {
        let _registering = INIT.lock();
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            active_sessions: register_gauge!(
                "silta_active_sessions",
                "Number of live proxied sessions"
            )
            .map_err(|e| SiltaError::Metrics(format!("active_sessions: {e}")))?,

            sessions_total: register_int_counter!(
                "silta_sessions_total",
                "Total sessions accepted"
            )
            .map_err(|e| SiltaError::Metrics(format!("sessions_total: {e}")))?,

            session_terminations: register_int_counter_vec!(
                "silta_session_terminations_total",
                "Session terminations by reason",
                &["reason"]
            )
            .map_err(|e| SiltaError::Metrics(format!("session_terminations: {e}")))?,

            session_duration_seconds: register_histogram_vec!(
                "silta_session_duration_seconds",
                "Lifetime of proxied sessions",
                &["reason"],
                // Buckets: 1s to 1 day
                vec![1.0, 10.0, 60.0, 300.0, 1800.0, 3600.0, 21600.0, 86400.0]
            )
            .map_err(|e| SiltaError::Metrics(format!("session_duration_seconds: {e}")))?,

            requests_forwarded: register_counter_vec!(
                "silta_requests_forwarded_total",
                "Discovery requests forwarded upstream",
                &["type", "kind"]
            )
            .map_err(|e| SiltaError::Metrics(format!("requests_forwarded: {e}")))?,

            responses_forwarded: register_counter_vec!(
                "silta_responses_forwarded_total",
                "Discovery responses forwarded downstream",
                &["type"]
            )
            .map_err(|e| SiltaError::Metrics(format!("responses_forwarded: {e}")))?,

            nacks_synthesized: register_int_counter!(
                "silta_nacks_synthesized_total",
                "NACKs generated for extension configs with failed modules"
            )
            .map_err(|e| SiltaError::Metrics(format!("nacks_synthesized: {e}")))?,

            responses_withheld: register_int_counter!(
                "silta_responses_withheld_total",
                "Extension config responses withheld while modules are pending"
            )
            .map_err(|e| SiltaError::Metrics(format!("responses_withheld: {e}")))?,

            module_resolutions: register_int_counter_vec!(
                "silta_module_resolutions_total",
                "Module cache lookups by outcome",
                &["outcome"]
            )
            .map_err(|e| SiltaError::Metrics(format!("module_resolutions: {e}")))?,
        };

        Ok(METRICS.get_or_init(|| metrics))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    /// Record a session start
    pub fn session_started(&self) {
        self.sessions_total.inc();
        self.active_sessions.inc();
    }

    /// Record a session end
    pub fn session_ended(&self, reason: &str, seconds: f64) {
        self.active_sessions.dec();
        self.session_terminations.with_label_values(&[reason]).inc();
        self.session_duration_seconds
            .with_label_values(&[reason])
            .observe(seconds);
    }

    /// Record a request handed upstream
    pub fn record_request(&self, type_url: &str, kind: &str) {
        self.requests_forwarded
            .with_label_values(&[silta_core::type_url::short_name(type_url), kind])
            .inc();
    }

    /// Record a response handed downstream
    pub fn record_response(&self, type_url: &str) {
        self.responses_forwarded
            .with_label_values(&[silta_core::type_url::short_name(type_url)])
            .inc();
    }

    /// Record a module lookup outcome
    pub fn record_resolution(&self, outcome: &str) {
        self.module_resolutions.with_label_values(&[outcome]).inc();
    }
}

/// Gather all metrics and encode as Prometheus text format
///
/// Returns the metrics as a String, ready to be served via HTTP.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

/// Run `f` against the metrics if they were initialized, otherwise skip
pub fn with_metrics(f: impl FnOnce(&Metrics)) {
    if let Some(m) = Metrics::get() {
        f(m);
    }
}
