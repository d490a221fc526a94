//! Authentication recovery counters
//!
//! - `auth_refresh_total` (counter): label `outcome` = `success` | `no_token` | `error` | `stale`
//! - `auth_login_total` (counter): label `outcome` = `success` | `error` | `no_credentials`
//! - `auth_queued_requests_total` (counter): requests that waited on an in-flight refresh
//!
//! Without an installed recorder these are no-ops.

/// Record the result of a refresh flight.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("auth_refresh_total", "outcome" => outcome).increment(1);
}

/// Record the result of a fallback or explicit login.
pub fn record_login(outcome: &'static str) {
    metrics::counter!("auth_login_total", "outcome" => outcome).increment(1);
}

/// Record a request that queued behind an in-flight refresh.
pub fn record_queued() {
    metrics::counter!("auth_queued_requests_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_refresh("success");
        record_login("error");
        record_queued();
    }

    #[test]
    fn counters_render_with_outcome_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_refresh("success");
        record_refresh("error");
        record_login("no_credentials");
        record_queued();
        record_queued();

        let output = handle.render();
        assert!(output.contains("auth_refresh_total{outcome=\"success\"} 1"), "{output}");
        assert!(output.contains("auth_refresh_total{outcome=\"error\"} 1"), "{output}");
        assert!(output.contains("auth_login_total{outcome=\"no_credentials\"} 1"), "{output}");
        assert!(output.contains("auth_queued_requests_total 2"), "{output}");
    }
}
