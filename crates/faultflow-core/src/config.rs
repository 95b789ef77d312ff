//! Study settings and solver configuration.
//!
//! [`StudyConfig`] is the TOML-facing document. Every field has a default, so
//! partial files are accepted:
//!
//! ```toml
//! [settings]
//! base_power = 100.0
//! frequency = 60.0
//!
//! [newton]
//! tolerance = 1e-4
//! max_iterations = 20
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};
use crate::units::{Hertz, MegavoltAmperes};

/// System-wide per-unit base and frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// System MVA base for per-unit conversion
    pub base_power: MegavoltAmperes,
    pub frequency: Hertz,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_power: MegavoltAmperes(100.0),
            frequency: Hertz(60.0),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> FlowResult<()> {
        if !(self.base_power.value() > 0.0 && self.base_power.is_finite()) {
            return Err(FlowError::Config(format!(
                "base_power must be positive, got {}",
                self.base_power
            )));
        }
        if !(self.frequency.value() > 0.0 && self.frequency.is_finite()) {
            return Err(FlowError::Config(format!(
                "frequency must be positive, got {}",
                self.frequency
            )));
        }
        Ok(())
    }
}

/// Newton-Raphson stopping criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonConfig {
    /// Largest absolute per-unit mismatch accepted as converged
    pub tolerance: f64,
    /// Number of state updates before giving up
    pub max_iterations: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 20,
        }
    }
}

impl NewtonConfig {
    pub fn validate(&self) -> FlowResult<()> {
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(FlowError::Config(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(FlowError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete study configuration as loaded from TOML.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub settings: Settings,
    pub newton: NewtonConfig,
}

impl StudyConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> FlowResult<Self> {
        let config: StudyConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> FlowResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> FlowResult<()> {
        self.settings.validate()?;
        self.newton.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StudyConfig::default();
        assert_eq!(config.settings.base_power, MegavoltAmperes(100.0));
        assert_eq!(config.settings.frequency, Hertz(60.0));
        assert_eq!(config.newton.max_iterations, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = StudyConfig::from_toml_str(
            r#"
            [newton]
            tolerance = 1e-6
            "#,
        )
        .unwrap();
        assert_eq!(config.newton.tolerance, 1e-6);
        assert_eq!(config.newton.max_iterations, 20);
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_full_toml() {
        let config = StudyConfig::from_toml_str(
            r#"
            [settings]
            base_power = 250.0
            frequency = 50.0

            [newton]
            tolerance = 1e-8
            max_iterations = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.settings.base_power, MegavoltAmperes(250.0));
        assert_eq!(config.settings.frequency, Hertz(50.0));
        assert_eq!(config.newton.max_iterations, 7);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let err = StudyConfig::from_toml_str("[settings]\nbase_power = 0.0\n").unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));

        let err = StudyConfig::from_toml_str("[newton]\nmax_iterations = 0\n").unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));

        let err = StudyConfig::from_toml_str("[newton]\ntolerance = -1.0\n").unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = StudyConfig::from_toml_str("[newton\n").unwrap_err();
        assert!(matches!(err, FlowError::Parse(_)));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[settings]\nbase_power = 50.0").unwrap();

        let config = StudyConfig::from_path(file.path()).unwrap();
        assert_eq!(config.settings.base_power, MegavoltAmperes(50.0));

        let missing = StudyConfig::from_path(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(FlowError::Io(_))));
    }
}
