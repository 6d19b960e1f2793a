use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SEVERITY_THRESHOLD: u8 = 5;
pub const DEFAULT_MAX_RECENT_COMMENTS: usize = 3;
pub const DEFAULT_MODEL: &str = "openai/gpt-4.1";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 1_000;

#[derive(Debug, Error)]
/// Enumerates supported `ModerationConfigError` values.
pub enum ModerationConfigError {
    #[error("failed to parse moderation config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Tunables for one moderation run.
pub struct ModerationConfig {
    /// Minimum decision severity (1-10) that may trigger a platform action.
    pub severity_threshold: u8,
    pub max_recent_comments: usize,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider for a `json_object` response format.
    pub json_response_format: bool,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            severity_threshold: DEFAULT_SEVERITY_THRESHOLD,
            max_recent_comments: DEFAULT_MAX_RECENT_COMMENTS,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            json_response_format: false,
        }
    }
}

impl ModerationConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ModerationConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ModerationConfigError> {
        if !(1..=10).contains(&self.severity_threshold) {
            return Err(ModerationConfigError::InvalidValue {
                field: "severity_threshold",
                message: format!("{} is outside 1..=10", self.severity_threshold),
            });
        }
        if self.model.trim().is_empty() {
            return Err(ModerationConfigError::InvalidValue {
                field: "model",
                message: "model must not be empty".to_string(),
            });
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(ModerationConfigError::InvalidValue {
                field: "temperature",
                message: format!("{} is outside 0.0..=2.0", self.temperature),
            });
        }
        if self.max_tokens == 0 {
            return Err(ModerationConfigError::InvalidValue {
                field: "max_tokens",
                message: "value must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ModerationConfig, ModerationConfigError};

    #[test]
    fn unit_default_config_matches_documented_values() {
        let config = ModerationConfig::default();
        assert_eq!(config.severity_threshold, 5);
        assert_eq!(config.max_recent_comments, 3);
        assert_eq!(config.model, "openai/gpt-4.1");
        assert_eq!(config.max_tokens, 1_000);
        assert!((config.temperature - 0.3).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn functional_from_toml_str_fills_missing_fields_with_defaults() {
        let config = ModerationConfig::from_toml_str(
            r#"
severity_threshold = 7
model = "openai/gpt-4o-mini"
"#,
        )
        .expect("config should parse");
        assert_eq!(config.severity_threshold, 7);
        assert_eq!(config.model, "openai/gpt-4o-mini");
        assert_eq!(config.max_recent_comments, 3);
    }

    #[test]
    fn regression_from_toml_str_rejects_out_of_range_threshold() {
        let error = ModerationConfig::from_toml_str("severity_threshold = 11")
            .expect_err("threshold 11 is invalid");
        assert!(matches!(
            error,
            ModerationConfigError::InvalidValue {
                field: "severity_threshold",
                ..
            }
        ));
    }

    #[test]
    fn regression_from_toml_str_rejects_unknown_keys() {
        let error = ModerationConfig::from_toml_str("severity = 3").expect_err("unknown key");
        assert!(matches!(error, ModerationConfigError::Toml(_)));
    }

    #[test]
    fn unit_validate_rejects_zero_tokens_and_bad_temperature() {
        let mut config = ModerationConfig {
            max_tokens: 0,
            ..ModerationConfig::default()
        };
        assert!(config.validate().is_err());
        config.max_tokens = 10;
        config.temperature = f32::NAN;
        assert!(config.validate().is_err());
    }
}
