//! Build profile selection
//!
//! The profile picks which overlay is merged onto the base document. It is
//! decided once, at the process boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable consulted when no profile is given explicitly
pub const MODE_ENV_VAR: &str = "NODE_ENV";

/// Build profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Development,
    Production,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::Development, Profile::Production];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// File stem of this profile's overlay document
    pub fn overlay_stem(self) -> &'static str {
        self.as_str()
    }

    /// Interpret a mode value: exactly `production` selects Production,
    /// anything else (including unset) selects Development.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some("production") => Self::Production,
            _ => Self::Development,
        }
    }

    /// Read the profile from [`MODE_ENV_VAR`]
    pub fn from_env() -> Self {
        let value = std::env::var(MODE_ENV_VAR).ok();
        let profile = Self::from_env_value(value.as_deref());
        tracing::debug!(
            env = MODE_ENV_VAR,
            value = value.as_deref().unwrap_or("<unset>"),
            profile = profile.as_str(),
            "profile selected from environment"
        );
        profile
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
