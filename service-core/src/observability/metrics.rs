use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static HTTP_METRICS: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the global `metrics` recorder that backs the HTTP middleware.
///
/// Safe to call more than once; only the first call installs. If another
/// recorder is already installed the HTTP metrics are not rendered.
pub fn init_http_metrics() {
    HTTP_METRICS.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install HTTP metrics recorder");
            None
        }
    });
}

/// HTTP request metrics in Prometheus text format.
pub fn render_http_metrics() -> String {
    HTTP_METRICS
        .get()
        .and_then(Option::as_ref)
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}
