#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration for the patrol toolchain.
//!
//! Values are layered: the defaults embedded from `default.toml`, then an
//! optional TOML file, then `PATROL_*` environment variables. Every key is
//! optional in a file; missing keys keep their defaults.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use patrol_dispatch::DispatchSettings;
use patrol_jurisdiction::JurisdictionResolver;
use patrol_report_models::UnitId;
use patrol_urgency::{UrgencyScorer, UrgencySettings};
use serde::{Deserialize, Serialize};

/// Defaults shipped with the binary.
pub const DEFAULT_TOML: &str = include_str!("../default.toml");

/// Overrides [`JurisdictionSettings::cybercrime_unit_id`].
pub const ENV_CYBERCRIME_UNIT_ID: &str = "PATROL_CYBERCRIME_UNIT_ID";

/// Overrides [`DispatchSettings::sla_seconds`].
pub const ENV_SLA_SECONDS: &str = "PATROL_SLA_SECONDS";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has wrongly typed values.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    /// A setting parsed but is outside its usable range.
    #[error("Invalid setting {key} = {value}: {reason}")]
    OutOfRange {
        key: &'static str,
        value: i64,
        reason: &'static str,
    },
}

/// Jurisdiction resolution parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JurisdictionSettings {
    /// Unit that owns cybercrime reports regardless of location.
    pub cybercrime_unit_id: Option<UnitId>,
}

/// Complete toolchain configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatrolConfig {
    pub jurisdiction: JurisdictionSettings,
    pub urgency: UrgencySettings,
    pub dispatch: DispatchSettings,
}

impl PatrolConfig {
    /// Parses the embedded defaults.
    ///
    /// # Errors
    ///
    /// * If the embedded TOML is invalid
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_TOML)
    }

    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// * If `toml_str` is not valid TOML or has wrongly typed values
    /// * If a value is out of range, see [`Self::validate`]
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every time setting is positive (or, for windows and
    /// ages, non-negative) and fits a [`TimeDelta`].
    ///
    /// # Errors
    ///
    /// * [`ConfigError::OutOfRange`] naming the first offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sla = self.dispatch.sla_seconds;
        if sla <= 0 {
            return Err(out_of_range("dispatch.sla_seconds", sla, "must be positive"));
        }
        if TimeDelta::try_seconds(sla).is_none() {
            return Err(out_of_range("dispatch.sla_seconds", sla, "too large"));
        }

        let max_age = self.dispatch.officer_location_max_age_seconds;
        if max_age < 0 {
            return Err(out_of_range(
                "dispatch.officer_location_max_age_seconds",
                max_age,
                "must not be negative",
            ));
        }
        if TimeDelta::try_seconds(max_age).is_none() {
            return Err(out_of_range(
                "dispatch.officer_location_max_age_seconds",
                max_age,
                "too large",
            ));
        }

        let window = self.urgency.recency_window_minutes;
        if window < 0 {
            return Err(out_of_range(
                "urgency.recency_window_minutes",
                window,
                "must not be negative",
            ));
        }
        if TimeDelta::try_minutes(window).is_none() {
            return Err(out_of_range("urgency.recency_window_minutes", window, "too large"));
        }

        Ok(())
    }

    /// Reads a TOML config file.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If its contents are invalid
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads `path` if given, otherwise the embedded defaults, then applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read or parsed
    /// * If an environment override is malformed
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::embedded()?,
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `PATROL_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// * If an override is set but malformed
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup`. Blank values are
    /// ignored.
    ///
    /// # Errors
    ///
    /// * If an override is set but malformed
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_CYBERCRIME_UNIT_ID).filter(|v| !v.trim().is_empty()) {
            let unit_id = parse_env(ENV_CYBERCRIME_UNIT_ID, &value)?;
            log::debug!("{ENV_CYBERCRIME_UNIT_ID} overrides cybercrime unit to {unit_id}");
            self.jurisdiction.cybercrime_unit_id = Some(unit_id);
        }

        if let Some(value) = lookup(ENV_SLA_SECONDS).filter(|v| !v.trim().is_empty()) {
            let seconds: i64 = parse_env(ENV_SLA_SECONDS, &value)?;
            if seconds <= 0 {
                return Err(ConfigError::InvalidEnv {
                    key: ENV_SLA_SECONDS,
                    value,
                });
            }
            log::debug!("{ENV_SLA_SECONDS} overrides SLA to {seconds}s");
            self.dispatch.sla_seconds = seconds;
        }

        Ok(())
    }

    /// Resolver configured with this jurisdiction section.
    #[must_use]
    pub const fn resolver(&self) -> JurisdictionResolver {
        JurisdictionResolver::new(self.jurisdiction.cybercrime_unit_id)
    }

    /// Scorer configured with this urgency section.
    #[must_use]
    pub fn scorer(&self) -> UrgencyScorer {
        UrgencyScorer::new(self.urgency.clone())
    }
}

const fn out_of_range(key: &'static str, value: i64, reason: &'static str) -> ConfigError {
    ConfigError::OutOfRange { key, value, reason }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn embedded_defaults_match_code_defaults() {
        assert_eq!(PatrolConfig::embedded().unwrap(), PatrolConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = PatrolConfig::from_toml_str(
            r"
            [jurisdiction]
            cybercrime_unit_id = 42

            [dispatch]
            sla_seconds = 240
            ",
        )
        .unwrap();

        assert_eq!(config.jurisdiction.cybercrime_unit_id, Some(42));
        assert_eq!(config.dispatch.sla_seconds, 240);
        assert_eq!(config.dispatch.guard_retries, 3);
        assert_eq!(config.urgency, UrgencySettings::default());
    }

    #[test]
    fn wrongly_typed_value_is_rejected() {
        let err = PatrolConfig::from_toml_str("[urgency]\nevidence_bonus = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = PatrolConfig::default();
        config
            .apply_overrides(env(&[
                (ENV_CYBERCRIME_UNIT_ID, "7"),
                (ENV_SLA_SECONDS, " 300 "),
            ]))
            .unwrap();

        assert_eq!(config.jurisdiction.cybercrime_unit_id, Some(7));
        assert_eq!(config.dispatch.sla_seconds, 300);
        assert_eq!(config.resolver(), JurisdictionResolver::new(Some(7)));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = PatrolConfig::default();
        config
            .apply_overrides(env(&[(ENV_CYBERCRIME_UNIT_ID, "  ")]))
            .unwrap();
        assert_eq!(config, PatrolConfig::default());
    }

    #[test]
    fn malformed_env_values_are_rejected() {
        for (key, value) in [(ENV_SLA_SECONDS, "soon"), (ENV_SLA_SECONDS, "0"), (ENV_CYBERCRIME_UNIT_ID, "cyber")] {
            let mut config = PatrolConfig::default();
            let err = config.apply_overrides(env(&[(key, value)])).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEnv { key: k, .. } if k == key),
                "{key}={value}"
            );
        }
    }

    #[test]
    fn out_of_range_file_values_are_rejected() {
        for (toml_str, key) in [
            ("[dispatch]\nsla_seconds = -5", "dispatch.sla_seconds"),
            ("[dispatch]\nsla_seconds = 0", "dispatch.sla_seconds"),
            ("[dispatch]\nsla_seconds = 9223372036854775807", "dispatch.sla_seconds"),
            (
                "[dispatch]\nofficer_location_max_age_seconds = -1",
                "dispatch.officer_location_max_age_seconds",
            ),
            (
                "[urgency]\nrecency_window_minutes = 9223372036854775807",
                "urgency.recency_window_minutes",
            ),
            ("[urgency]\nrecency_window_minutes = -60", "urgency.recency_window_minutes"),
        ] {
            let err = PatrolConfig::from_toml_str(toml_str).unwrap_err();
            assert!(
                matches!(err, ConfigError::OutOfRange { key: k, .. } if k == key),
                "{toml_str}: {err}"
            );
        }
    }

    #[test]
    fn zero_window_and_age_are_allowed() {
        let config = PatrolConfig::from_toml_str(
            "[urgency]\nrecency_window_minutes = 0\n[dispatch]\nofficer_location_max_age_seconds = 0",
        )
        .unwrap();
        assert_eq!(config.urgency.recency_window_minutes, 0);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = PatrolConfig::load(Path::new("/nonexistent/patrol.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/patrol.toml"));
    }
}
