//! Orchestrator configuration.

use std::time::Duration;

use spyglass_core::Environment;
use spyglass_core::constants::DEFAULT_SERVICE_DOMAIN;

/// Tunables for the session layer.
///
/// [`OrchestratorConfig::from_env`] applies `SPYGLASS_*` overrides on top of
/// the defaults; invalid values are ignored with a warning.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Domain the connect host is built from (`connect{infix}.{domain}`).
    pub service_domain: String,
    /// Environment used when a session start carries none (quick connect).
    pub environment: Environment,
    /// How long an activated orchestrator waits for a session start before
    /// releasing the outbound buffer.
    pub idle_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            service_domain: DEFAULT_SERVICE_DOMAIN.to_owned(),
            environment: Environment::Prod,
            idle_timeout: Duration::from_secs(5),
        }
    }
}

impl OrchestratorConfig {
    /// Defaults with environment variable overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(domain) = read_env_string("SPYGLASS_SERVICE_DOMAIN") {
            config.service_domain = domain;
        }
        if let Some(environment) = read_env_environment("SPYGLASS_ENVIRONMENT") {
            config.environment = environment;
        }
        if let Some(millis) = read_env_u64("SPYGLASS_IDLE_TIMEOUT_MS", 100, 600_000) {
            config.idle_timeout = Duration::from_millis(millis);
        }
        config
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn read_env_environment(name: &str) -> Option<Environment> {
    let value = std::env::var(name).ok()?;
    let parsed = Environment::parse(&value);
    if parsed.is_none() {
        tracing::warn!(key = name, value = %value, "invalid environment env var, ignoring");
    }
    parsed
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let value = std::env::var(name).ok()?;
    let parsed = parse_u64_range(&value, min, max);
    if parsed.is_none() {
        tracing::warn!(key = name, value = %value, "invalid numeric env var, ignoring");
    }
    parsed
}

/// Parse a string as a `u64` within `[min, max]`.
fn parse_u64_range(value: &str, min: u64, max: u64) -> Option<u64> {
    let parsed: u64 = value.trim().parse().ok()?;
    (parsed >= min && parsed <= max).then_some(parsed)
}
