use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::json_reader::{FormatOptions, Int64Format, MemberNameCasing};
use crate::relationship_path::EcSqlOptions;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Reader configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Schema searched first for unqualified class names
    #[validate(length(min = 1, message = "Default schema cannot be empty"))]
    pub default_schema: Option<String>,

    /// Select path roots polymorphically (no `ONLY`)
    pub polymorphic: bool,

    /// Reference classes as `Schema.Class` in generated ECSQL
    pub qualify_class_names: bool,

    /// Prepared statement cache size (1-100000)
    #[validate(range(
        min = 1,
        max = 100_000,
        message = "Statement cache size must be between 1 and 100000"
    ))]
    pub statement_cache_max_entries: usize,

    /// Also read the related items declared for the instance's class
    pub expand_related_items: bool,

    pub member_name_casing: MemberNameCasing,

    pub int64_format: Int64Format,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            default_schema: None,
            polymorphic: true,
            qualify_class_names: true,
            statement_cache_max_entries: 256,
            expand_related_items: false,
            member_name_casing: MemberNameCasing::KeepOriginal,
            int64_format: Int64Format::AsHexadecimalString,
        }
    }
}

impl ReaderConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            default_schema: env::var("ECDBMAP_DEFAULT_SCHEMA").ok(),
            polymorphic: parse_env_var("ECDBMAP_POLYMORPHIC", "true")?,
            qualify_class_names: parse_env_var("ECDBMAP_QUALIFY_CLASS_NAMES", "true")?,
            statement_cache_max_entries: parse_env_var(
                "ECDBMAP_STATEMENT_CACHE_MAX_ENTRIES",
                "256",
            )?,
            expand_related_items: parse_env_var("ECDBMAP_EXPAND_RELATED_ITEMS", "false")?,
            member_name_casing: parse_env_var("ECDBMAP_MEMBER_NAME_CASING", "keep_original")?,
            int64_format: parse_env_var("ECDBMAP_INT64_FORMAT", "as_hexadecimal_string")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let config = Self {
            default_schema: cli.default_schema,
            polymorphic: !cli.no_polymorphic,
            qualify_class_names: !cli.unqualified_class_names,
            statement_cache_max_entries: cli.statement_cache_max_entries,
            expand_related_items: cli.expand_related_items,
            member_name_casing: cli.member_name_casing,
            int64_format: cli.int64_format,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Merge with another configuration (CLI overrides environment).
    /// An unset default schema keeps the current one.
    pub fn merge(&mut self, other: Self) {
        if other.default_schema.is_some() {
            self.default_schema = other.default_schema;
        }
        self.polymorphic = other.polymorphic;
        self.qualify_class_names = other.qualify_class_names;
        self.statement_cache_max_entries = other.statement_cache_max_entries;
        self.expand_related_items = other.expand_related_items;
        self.member_name_casing = other.member_name_casing;
        self.int64_format = other.int64_format;
    }

    pub fn ecsql_options(&self) -> EcSqlOptions {
        EcSqlOptions {
            polymorphic: self.polymorphic,
            qualify_class_names: self.qualify_class_names,
        }
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            member_name_casing: self.member_name_casing,
            int64_format: self.int64_format,
        }
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub default_schema: Option<String>,
    pub no_polymorphic: bool,
    pub unqualified_class_names: bool,
    pub statement_cache_max_entries: usize,
    pub expand_related_items: bool,
    pub member_name_casing: MemberNameCasing,
    pub int64_format: Int64Format,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
