use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the tracing subscriber. Output goes to stderr; stdout carries IPC responses.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("aresd=info"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(false),
        )
        .with(filter)
        .try_init();
}
