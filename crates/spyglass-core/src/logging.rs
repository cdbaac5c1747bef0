//! Structured logging setup with `tracing`.
//!
//! The session layer logs through `tracing` macros everywhere; host apps
//! that have no subscriber of their own call [`init_subscriber`] once at
//! startup. Log context (session id, vendor, status) travels as structured
//! fields rather than formatted strings.

/// Initialize the global tracing subscriber with stderr output only.
///
/// Call once at application startup. Subsequent calls are no-ops.
/// `SPYGLASS_LOG` overrides the level with a full `EnvFilter` directive.
///
/// # Arguments
///
/// * `level` - Minimum log level to display when `SPYGLASS_LOG` is unset.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("SPYGLASS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init is a no-op if a subscriber is already set
    let _ = subscriber.try_init();
}
