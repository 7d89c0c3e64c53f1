//! Client metrics
//!
//! Emitted through the `metrics` facade; they are no-ops unless the embedding
//! application installs a recorder.
//!
//! - `storefront_requests_total` (counter): labels `method`, `status`
//! - `storefront_auth_challenges_total` (counter): label `event`

/// Record a completed request. `status` is `"network_error"` when no response arrived.
pub fn record_request(method: &str, status: &str) {
    metrics::counter!(
        "storefront_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a challenge lifecycle event: `opened`, `reused`, `authenticated`, `cancelled`.
pub fn record_challenge(event: &'static str) {
    metrics::counter!("storefront_auth_challenges_total", "event" => event).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("GET", "200");
        record_challenge("opened");
    }

    #[test]
    fn counters_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_request("POST", "403");
            record_request("POST", "403");
            record_challenge("reused");
        });

        let output = handle.render();
        assert!(
            output.contains(r#"storefront_requests_total{method="POST",status="403"} 2"#),
            "got:\n{output}"
        );
        assert!(
            output.contains(r#"storefront_auth_challenges_total{event="reused"} 1"#),
            "got:\n{output}"
        );
    }
}
