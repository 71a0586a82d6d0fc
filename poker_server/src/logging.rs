//! Structured logging configuration.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging. Level is controlled via `RUST_LOG`.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("structured logging initialized");
}

/// Log a connection lifecycle event (join, disconnect, spectate) with the
/// seat/session identity attached as structured fields.
pub fn log_connection_event(event_type: &str, seat: Option<usize>, message: &str) {
    tracing::info!(event_type = event_type, seat = seat, "{}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_connection_event_does_not_panic_without_a_seat() {
        log_connection_event("disconnect", None, "connection closed before joining");
    }

    #[test]
    fn log_connection_event_does_not_panic_with_a_seat() {
        log_connection_event("join", Some(3), "Alice joined at seat 3");
    }
}
