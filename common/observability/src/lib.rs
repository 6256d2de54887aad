use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for the authentication chokepoint and the audit trail.
#[derive(Clone)]
pub struct SecurityMetrics {
    pub registry: Registry,
    pub auth_rejections_total: IntCounterVec,
    pub audit_entries_total: IntCounterVec,
    pub audit_append_failures: IntCounter,
    pub http_errors_total: IntCounterVec,
}

impl SecurityMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let auth_rejections_total = IntCounterVec::new(
            Opts::new(
                "auth_rejections_total",
                "Requests rejected by authentication or authorization, by reason",
            ),
            &["reason"],
        ).unwrap();
        let audit_entries_total = IntCounterVec::new(
            Opts::new(
                "audit_entries_total",
                "Audit entries appended, by action",
            ),
            &["action"],
        ).unwrap();
        let audit_append_failures = IntCounter::new(
            "audit_append_failures_total",
            "Audit entries that could not be appended",
        ).unwrap();
        let http_errors_total = IntCounterVec::new(
            Opts::new(
                "http_errors_total",
                "Count of HTTP error responses emitted (status >= 400)"
            ),
            &["service", "code", "status"]
        ).unwrap();
        let _ = registry.register(Box::new(auth_rejections_total.clone()));
        let _ = registry.register(Box::new(audit_entries_total.clone()));
        let _ = registry.register(Box::new(audit_append_failures.clone()));
        let _ = registry.register(Box::new(http_errors_total.clone()));
        SecurityMetrics { registry, auth_rejections_total, audit_entries_total, audit_append_failures, http_errors_total }
    }

    pub fn auth_rejected(&self, reason: &str) {
        self.auth_rejections_total.with_label_values(&[reason]).inc();
    }

    pub fn audit_appended(&self, action: &str) {
        self.audit_entries_total.with_label_values(&[action]).inc();
    }

    pub fn audit_failed(&self) {
        self.audit_append_failures.inc();
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

impl Default for SecurityMetrics {
    fn default() -> Self { Self::new() }
}
