//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{AspectConfig, LogFormat, LogOutput, LoggingConfig, WeaveConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &WeaveConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_aspects_config(&config.aspects)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if cfg!(not(feature = "json-log")) && logging.format == LogFormat::Json {
        return Err(ConfigError::validation(
            "JSON log format requires the json-log feature",
        ));
    }

    if let Some(module) = logging
        .filters
        .keys()
        .find(|module| module.trim().is_empty() || module.contains(char::is_whitespace))
    {
        return Err(ConfigError::validation(format!(
            "Invalid log filter module name: {module:?}"
        )));
    }

    Ok(())
}

fn validate_aspects_config(aspects: &[AspectConfig]) -> ConfigResult<()> {
    let mut seen_names = HashSet::new();

    for aspect in aspects {
        if aspect.name.trim().is_empty() {
            return Err(ConfigError::missing_field("aspects.name"));
        }
        if !seen_names.insert(aspect.name.as_str()) {
            return Err(ConfigError::DuplicateAspect(aspect.name.clone()));
        }
        validate_aspect_config(aspect)?;
    }

    Ok(())
}

fn validate_aspect_config(aspect: &AspectConfig) -> ConfigResult<()> {
    let mut seen_methods = HashSet::new();

    for advice in &aspect.advice {
        if advice.method.trim().is_empty() {
            return Err(ConfigError::missing_field(format!(
                "aspects.{}.advice.method",
                aspect.name
            )));
        }
        if !seen_methods.insert(advice.method.as_str()) {
            return Err(ConfigError::validation(format!(
                "Advice method '{}' is configured twice for aspect '{}'",
                advice.method, aspect.name
            )));
        }
        advice
            .descriptor
            .validate()
            .map_err(|e| ConfigError::invalid_advice(&aspect.name, &advice.method, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use weave_aspect::AdviceDescriptor;

    use super::*;
    use crate::config::schema::AdviceConfig;

    fn aspect(name: &str, advice: Vec<AdviceConfig>) -> AspectConfig {
        AspectConfig {
            name: name.to_string(),
            enabled: true,
            advice,
        }
    }

    fn advice(method: &str, descriptor: AdviceDescriptor) -> AdviceConfig {
        AdviceConfig {
            method: method.to_string(),
            descriptor,
        }
    }

    #[test]
    fn test_validate_empty_config() {
        assert!(validate_config(&WeaveConfig::default()).is_ok());
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = WeaveConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.logging.file_path = Some(PathBuf::from("weave.log"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_file_output_from_serialized_config() {
        let config: WeaveConfig = serde_json::from_str(
            r#"{ "logging": { "output": "file", "file_path": "logs/weave.log" } }"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_duplicate_aspect_name() {
        let config = WeaveConfig {
            aspects: vec![aspect("Audit", vec![]), aspect("Audit", vec![])],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateAspect(_))
        ));
    }

    #[test]
    fn test_invalid_descriptor() {
        let config = WeaveConfig {
            aspects: vec![aspect(
                "Audit",
                vec![advice(
                    "log_entry",
                    AdviceDescriptor::before("within(Lecturer)").returning("result"),
                )],
            )],
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAdvice { .. }));
        assert!(err.to_string().starts_with("Invalid advice 'Audit.log_entry'"));
    }

    #[test]
    fn test_blank_advice_method() {
        let config = WeaveConfig {
            aspects: vec![aspect(
                "Audit",
                vec![advice(" ", AdviceDescriptor::before("within(Lecturer)"))],
            )],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
