//! Dispatcher metrics
//!
//! Emitted through the `metrics` facade; the embedding application decides
//! whether to install a recorder.
//!
//! - `oauth_client_requests_total` (counter): labels `status`, `method`
//! - `oauth_client_token_refresh_total` (counter): label `outcome`
//! - `oauth_client_session_expired_total` (counter)

/// Result of a refresh attempt, used as the `outcome` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Success,
    Failure,
    NoRefreshToken,
}

impl RefreshOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshOutcome::Success => "success",
            RefreshOutcome::Failure => "failure",
            RefreshOutcome::NoRefreshToken => "no_refresh_token",
        }
    }
}

/// Record a proxy response with status code and HTTP method labels.
pub fn record_request(status: u16, method: &str) {
    metrics::counter!(
        "oauth_client_requests_total",
        "status" => status.to_string(),
        "method" => method.to_string()
    )
    .increment(1);
}

pub fn record_refresh(outcome: RefreshOutcome) {
    metrics::counter!("oauth_client_token_refresh_total", "outcome" => outcome.as_str())
        .increment(1);
}

pub fn record_session_expired() {
    metrics::counter!("oauth_client_session_expired_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    /// Recorder scoped to the current thread, so tests do not fight over the
    /// global recorder.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request(200, "GET");
        record_refresh(RefreshOutcome::Failure);
        record_session_expired();
    }

    #[test]
    fn record_request_carries_labels() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request(200, "GET");
        record_request(401, "POST");

        let output = handle.render();
        assert!(output.contains("oauth_client_requests_total"));
        assert!(output.contains("status=\"200\""));
        assert!(output.contains("method=\"GET\""));
        assert!(output.contains("status=\"401\""));
        assert!(output.contains("method=\"POST\""));
    }

    #[test]
    fn refresh_and_expiry_counters() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_refresh(RefreshOutcome::Success);
        record_refresh(RefreshOutcome::NoRefreshToken);
        record_session_expired();

        let output = handle.render();
        assert!(output.contains("outcome=\"success\""));
        assert!(output.contains("outcome=\"no_refresh_token\""));
        assert!(output.contains("oauth_client_session_expired_total 1"));
    }
}
