//! Metrics recorder initialization and configuration.

use {anyhow::Result, tracing::info};

/// Handle to the metrics system, providing access to exported metrics.
#[derive(Clone)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsHandle {
    /// Render metrics in Prometheus text format, for the `/metrics` endpoint.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle.render()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    pub enabled: bool,
    pub global_labels: Vec<(String, String)>,
}

/// Initialize the metrics system. Call once at daemon startup.
///
/// When the `prometheus` feature is off, or `config.enabled` is false, every
/// recording call through the `metrics` facade is a no-op.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder fails to install.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection disabled");
        return Ok(MetricsHandle {
            #[cfg(feature = "prometheus")]
            prometheus_handle: init_prometheus_disabled()?,
        });
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = init_prometheus(config)?;
        info!("prometheus metrics exporter initialized");
        Ok(MetricsHandle {
            prometheus_handle: handle,
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        info!("metrics feature not enabled at compile time");
        Ok(MetricsHandle {})
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus(
    config: MetricsRecorderConfig,
) -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    use {crate::buckets, metrics_exporter_prometheus::PrometheusBuilder};

    let mut builder = PrometheusBuilder::new();

    builder = builder
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(crate::requests::DURATION_SECONDS.to_string()),
            &buckets::REQUEST_DURATION,
        )?
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &buckets::HTTP_DURATION,
        )?
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(crate::requests::QUEUE_DEPTH.to_string()),
            &buckets::QUEUE_SIZE,
        )?;

    for (key, value) in config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    let handle = builder.install_recorder()?;
    Ok(handle)
}

#[cfg(feature = "prometheus")]
fn init_prometheus_disabled() -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}
