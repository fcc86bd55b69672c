//! Build environment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FesError;

/// The environment a Fes run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    /// Local development build.
    #[default]
    Development,
    /// Optimized production build.
    Production,
}

impl Env {
    /// Returns the string name of this environment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// Returns whether this is a production run.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Env {
    type Err = FesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(FesError::validation(format!(
                "Unknown environment '{other}', expected 'development' or 'production'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("prod".parse::<Env>().unwrap(), Env::Production);
        assert_eq!("Development".parse::<Env>().unwrap(), Env::Development);
        assert!("staging".parse::<Env>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_value(Env::Production).unwrap();
        assert_eq!(json, serde_json::json!("production"));
    }
}
