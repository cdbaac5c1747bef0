//! Deployment environments of the inspection service.
//!
//! The environment picks the connect host: `connect.{domain}` for
//! production, `connect-stage.{domain}` for staging, and so on. Deep links
//! select one via the `env` query parameter; stored connect URLs carry it
//! implicitly in their host name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment environment a session connects to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production (the default).
    #[default]
    Prod,
    /// Staging.
    Stage,
    /// QA.
    Qa,
    /// Development.
    Dev,
}

impl Environment {
    /// Host infix spliced after `connect` in the service host name.
    ///
    /// Production is the empty string; the rest are `-stage`, `-qa`, `-dev`.
    #[must_use]
    pub fn url_infix(self) -> &'static str {
        match self {
            Self::Prod => "",
            Self::Stage => "-stage",
            Self::Qa => "-qa",
            Self::Dev => "-dev",
        }
    }

    /// Parse one of the four environment names (lowercase, exact).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prod" => Some(Self::Prod),
            "stage" => Some(Self::Stage),
            "qa" => Some(Self::Qa),
            "dev" => Some(Self::Dev),
            _ => None,
        }
    }

    /// Resolve an environment from a deep-link query value.
    ///
    /// Absent, empty, or unrecognized values fall back to production.
    #[must_use]
    pub fn from_query_value(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }

    /// Recover the environment from a connect host name.
    ///
    /// `connect-stage.observe.spyglass.net` → `Stage`. Hosts without a
    /// recognizable infix resolve to production.
    #[must_use]
    pub fn from_host(host: &str) -> Self {
        let infix = host
            .strip_prefix("connect")
            .and_then(|rest| rest.split('.').next())
            .unwrap_or("");
        match infix {
            "-stage" => Self::Stage,
            "-qa" => Self::Qa,
            "-dev" => Self::Dev,
            _ => Self::Prod,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Prod => "prod",
            Self::Stage => "stage",
            Self::Qa => "qa",
            Self::Dev => "dev",
        })
    }
}
