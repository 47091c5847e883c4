//! Configuration file loading for Runcell
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{
    Config, ConfigError, DEFAULT_CONFIG, ENV_PREFIX, LanguageKind, TIMEOUT_CEILING_MS,
};
use crate::workspace::is_plain_file_name;

impl Config {
    /// Load the layered configuration used by the server
    ///
    /// Sources, lowest precedence first: the embedded defaults, the optional
    /// TOML file at `path`, then `RUNCELL_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "max_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.max_timeout_ms > TIMEOUT_CEILING_MS {
            return Err(ConfigError::Invalid(format!(
                "max_timeout_ms ({}) exceeds the limit of {TIMEOUT_CEILING_MS}",
                self.max_timeout_ms
            )));
        }
        if self.default_timeout_ms > self.max_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "default_timeout_ms ({}) exceeds max_timeout_ms ({})",
                self.default_timeout_ms, self.max_timeout_ms
            )));
        }
        if self.max_concurrent == Some(0) {
            return Err(ConfigError::Invalid(
                "max_concurrent must be greater than zero when set".to_owned(),
            ));
        }

        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.run.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty run command"
                )));
            }
            // The class placeholder is substituted before the name is checked
            if !is_plain_file_name(&lang.source_name_for("Main")) {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has invalid source name '{}'",
                    lang.source_name
                )));
            }

            match lang.kind {
                LanguageKind::Compiled => match lang.compile {
                    None => {
                        return Err(ConfigError::Invalid(format!(
                            "compiled language '{id}' has no compile section"
                        )));
                    }
                    Some(ref compile) if compile.command.is_empty() => {
                        return Err(ConfigError::Invalid(format!(
                            "language '{id}' has empty compile command"
                        )));
                    }
                    Some(_) => {}
                },
                LanguageKind::Interpreted | LanguageKind::SourceRun => {
                    if lang.compile.is_some() {
                        return Err(ConfigError::Invalid(format!(
                            "language '{id}' is {} but has a compile section",
                            lang.kind
                        )));
                    }
                }
            }

            if let Some(ref project) = lang.project_file
                && !is_plain_file_name(&project.name)
            {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has invalid project file name '{}'",
                    project.name
                )));
            }
        }

        Ok(())
    }
}
