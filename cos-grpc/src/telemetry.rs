use tracing_subscriber::EnvFilter;

/// Structured logging to stderr; `RUST_LOG` overrides the default `info` level.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
