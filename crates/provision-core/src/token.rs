use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const SEPARATOR: &str = "::";

/// Correlation id for one execution attempt of a provisioning run.
///
/// Formatted as `{projectCode}::{ISO-8601 UTC millis}::{4 lowercase hex}`.
/// The suffix is not cryptographically random and collisions are tolerated:
/// the token ties audit entries together, it does not deduplicate runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyToken(String);

impl IdempotencyToken {
    #[must_use]
    pub fn generate(project_code: &str) -> Self {
        Self::from_parts(project_code, Utc::now(), rand::random::<u16>())
    }

    #[must_use]
    pub fn from_parts(project_code: &str, issued_at: DateTime<Utc>, suffix: u16) -> Self {
        let timestamp = issued_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        Self(format!("{project_code}{SEPARATOR}{timestamp}{SEPARATOR}{suffix:04x}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn project_code(&self) -> &str {
        self.0.split(SEPARATOR).next().unwrap_or_default()
    }
}

impl fmt::Display for IdempotencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IdempotencyToken {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoreError::MalformedToken(s.to_string());
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        let [code, timestamp, suffix] = parts.as_slice() else {
            return Err(malformed());
        };

        if code.is_empty() || code.contains(':') {
            return Err(malformed());
        }
        let well_formed_time = timestamp.len() == 24
            && timestamp.ends_with('Z')
            && DateTime::parse_from_rfc3339(timestamp).is_ok();
        if !well_formed_time {
            return Err(malformed());
        }
        let hex_suffix = suffix.len() == 4
            && suffix
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !hex_suffix {
            return Err(malformed());
        }

        Ok(Self(s.to_string()))
    }
}
