use tracing_subscriber::prelude::*;
use tracing_subscriber::Registry;

pub fn init_telemetry(service_name: &'static str) {
    // Needed to forward ordinary log statements to our tracing subscriber.
    tracing_log::LogTracer::init().expect("Failed to initialize log tracer");

    let subscriber = Registry::default()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_names(true),
        );

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to install `tracing` subscriber");

    tracing::info!(service = service_name, "telemetry initialized");
}
