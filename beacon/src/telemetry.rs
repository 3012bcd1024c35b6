use crate::config::{Config, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs logging, error reporting and the metrics exporter. The returned
/// guard flushes pending Sentry events when dropped.
pub fn init(config: &Config) -> Option<sentry::ClientInitGuard> {
    let guard = config.logging.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry::integrations::tracing::layer())
        .init();

    if let Some(metrics) = &config.metrics {
        init_metrics(metrics);
    }

    guard
}

fn init_metrics(config: &MetricsConfig) {
    let recorder = match StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(&config.prefix))
    {
        Ok(recorder) => recorder,
        Err(e) => {
            tracing::warn!(error = %e, "Could not create statsd exporter, metrics disabled");
            return;
        }
    };

    if let Err(e) = metrics::set_global_recorder(recorder) {
        tracing::warn!(error = %e, "Metrics recorder already installed");
    }
}
