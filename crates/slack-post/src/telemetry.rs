use tracing::Subscriber;
use tracing::subscriber::set_global_default;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Map `-v` occurrences to a default filter directive. `RUST_LOG` wins when set.
pub fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Build a subscriber that writes to stderr, leaving stdout for `--dry-run` JSON.
pub fn get_subscriber(env_filter: &str, json: bool) -> Box<dyn Subscriber + Send + Sync> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));
    let registry = Registry::default().with(env_filter);

    if json {
        Box::new(registry.with(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        Box::new(
            registry.with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            ),
        )
    }
}

pub fn init_subscriber(subscriber: Box<dyn Subscriber + Send + Sync>) {
    if let Err(e) = set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {}", e);
    }
}
