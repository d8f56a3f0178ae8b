//! Resolver configuration
//!
//! The only tunable is what happens when a device or occupancy query fails
//! while an axis is being inferred. Configuration is plain data; callers
//! either build it directly or read it from the environment with
//! [`ResolverConfig::from_env`].

use std::env;
use std::fmt;
use std::str::FromStr;

/// Environment variable consulted by [`ResolverConfig::from_env`]
pub const QUERY_FAILURE_ENV: &str = "GRIDR_ON_QUERY_FAILURE";

/// What the resolver does when an occupancy or device query fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryFailurePolicy {
    /// Log a warning, resolve the free axis to one block and keep going
    #[default]
    Degrade,
    /// Fail the launch with `Error::OccupancyQuery`
    Fatal,
}

impl FromStr for QueryFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrade" => Ok(Self::Degrade),
            "fatal" => Ok(Self::Fatal),
            other => Err(format!("unknown query failure policy '{}'", other)),
        }
    }
}

impl fmt::Display for QueryFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degrade => f.write_str("degrade"),
            Self::Fatal => f.write_str("fatal"),
        }
    }
}

/// Resolver settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Behaviour on occupancy/device query failure
    pub on_query_failure: QueryFailurePolicy,
}

impl ResolverConfig {
    /// Config that aborts the launch if occupancy cannot be queried.
    pub fn strict() -> Self {
        Self {
            on_query_failure: QueryFailurePolicy::Fatal,
        }
    }

    /// Read the config from `GRIDR_ON_QUERY_FAILURE`.
    ///
    /// Unset or unparsable values fall back to the default policy.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let on_query_failure = match lookup(QUERY_FAILURE_ENV) {
            None => QueryFailurePolicy::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(
                    env = QUERY_FAILURE_ENV,
                    value = %raw,
                    "{}; using {}",
                    e,
                    QueryFailurePolicy::default()
                );
                QueryFailurePolicy::default()
            }),
        };
        Self { on_query_failure }
    }
}
