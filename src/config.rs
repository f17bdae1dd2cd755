//! Configuration management for docsieve.
//!
//! The configuration is loaded once at startup from a TOML, YAML, JSON or
//! `.properties` file, optionally overlaid with `key=value` overrides, and
//! then handed by reference to the component builders
//! (`DocumentFilter::from_config`, `AnnotationFilter::from_config`,
//! `FieldProjector::from_config`). Nothing mutates it afterwards.
//!
//! Flat keys follow the dotted naming used on the command line:
//! `keep.<field>`, `skip.<field>`, `annotation.types`, `annotation.features`,
//! `annotation.outputset`, `field.<name>`, `projector.includeAnnotations`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::processors::ProcessorSpec;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value '{value}' for '{key}': {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("invalid override '{0}', expected key=value")]
    InvalidOverride(String),

    #[error("processor '{name}': {message}")]
    Processor { name: String, message: String },
}

/// A list given either as a comma-separated string or as an array.
///
/// Examples:
/// - `"Person, Location"`
/// - `["Person", "Location"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    Csv(String),
    List(Vec<String>),
}

impl Default for StringList {
    fn default() -> Self {
        StringList::List(Vec::new())
    }
}

impl StringList {
    /// Trimmed, non-empty items in declaration order.
    pub fn items(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            StringList::Csv(s) => s.split(',').collect(),
            StringList::List(v) => v.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

impl From<Vec<&str>> for StringList {
    fn from(items: Vec<&str>) -> Self {
        StringList::List(items.into_iter().map(str::to_string).collect())
    }
}

/// Annotation filter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationConfig {
    /// Accepted annotation type names.
    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub types: StringList,
    /// `Type.feature` entries naming the features to retain.
    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub features: StringList,
    /// Label attached to filtered annotation output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub outputset: String,
}

/// Field projector switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectorConfig {
    /// Produce annotation-derived fields. When false only base fields are copied.
    #[serde(default = "default_true", alias = "include_annotations")]
    pub include_annotations: bool,
    /// Output field receiving the document url.
    #[serde(default = "default_url_field", alias = "url_field")]
    pub url_field: String,
    /// Output field receiving the extracted text.
    #[serde(default = "default_text_field", alias = "text_field")]
    pub text_field: String,
    /// Metadata keys copied verbatim into same-named output fields.
    #[serde(default, alias = "metadata_fields", skip_serializing_if = "StringList::is_empty")]
    pub metadata_fields: StringList,
}

fn default_true() -> bool {
    true
}

fn default_url_field() -> String {
    "url".to_string()
}

fn default_text_field() -> String {
    "text".to_string()
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            include_annotations: true,
            url_field: default_url_field(),
            text_field: default_text_field(),
            metadata_fields: StringList::default(),
        }
    }
}

/// Worker pool settings for `run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Number of blocking workers (default: available parallelism).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Capacity of the bounded channels between reader, workers and sink.
    #[serde(default = "default_channel_capacity", alias = "channel_capacity")]
    pub channel_capacity: usize,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// `keep.<field> = <regex>` rules.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keep: BTreeMap<String, String>,
    /// `skip.<field> = <regex>` rules.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub skip: BTreeMap<String, String>,
    #[serde(default)]
    pub annotation: AnnotationConfig,
    /// `field.<output> = <Type>[.<feature>|.*]` mappings.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field: BTreeMap<String, String>,
    #[serde(default)]
    pub projector: ProjectorConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Processor stages, run in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processors: Vec<ProcessorSpec>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover a `docsieve` config file in the standard locations.
    /// Falls back to defaults when nothing is found.
    pub async fn load() -> Result<Self, ConfigError> {
        match prefer::load("docsieve").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(_) => {
                // No config file found, use defaults
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path.
    /// The format is chosen by extension: toml, yaml/yml, properties, else JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?
            }
            "properties" | "props" => Self::from_properties_str(&contents)?,
            _ => serde_json::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
        };

        tracing::debug!("Loaded configuration from {}", path.display());
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse a `.properties` document (`key = value` or `key: value` lines).
    pub fn from_properties_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        for (key, value) in parse_properties(contents) {
            config.apply_property(&key, &value)?;
        }
        Ok(config)
    }

    /// Build a configuration from flat `(key, value)` pairs.
    pub fn from_properties<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Config::default();
        for (key, value) in pairs {
            config.apply_property(key.as_ref(), value.as_ref())?;
        }
        Ok(config)
    }

    /// Apply a single flat option. Unknown keys are logged and ignored.
    pub fn apply_property(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let key = key.trim();
        let value = value.trim();

        let Some((section, name)) = key.split_once('.') else {
            tracing::warn!("Ignoring unrecognized configuration key '{}'", key);
            return Ok(());
        };

        match (section, name) {
            ("keep", field) if !field.is_empty() => {
                self.keep.insert(field.to_string(), value.to_string());
            }
            ("skip", field) if !field.is_empty() => {
                self.skip.insert(field.to_string(), value.to_string());
            }
            ("field", output) if !output.is_empty() => {
                self.field.insert(output.to_string(), value.to_string());
            }
            ("annotation", "types") => self.annotation.types = StringList::Csv(value.into()),
            ("annotation", "features") => {
                self.annotation.features = StringList::Csv(value.into())
            }
            ("annotation", "outputset") => self.annotation.outputset = value.to_string(),
            ("projector", "includeAnnotations") | ("projector", "include_annotations") => {
                self.projector.include_annotations = parse_bool(key, value)?;
            }
            ("projector", "urlField") | ("projector", "url_field") => {
                self.projector.url_field = value.to_string();
            }
            ("projector", "textField") | ("projector", "text_field") => {
                self.projector.text_field = value.to_string();
            }
            ("projector", "metadataFields") | ("projector", "metadata_fields") => {
                self.projector.metadata_fields = StringList::Csv(value.into());
            }
            ("pipeline", "workers") => self.pipeline.workers = parse_usize(key, value)?,
            ("pipeline", "channelCapacity") | ("pipeline", "channel_capacity") => {
                self.pipeline.channel_capacity = parse_usize(key, value)?;
            }
            _ => tracing::warn!("Ignoring unrecognized configuration key '{}'", key),
        }
        Ok(())
    }

    /// Apply `key=value` overrides (from `--set`), in order.
    pub fn apply_overrides(&mut self, overrides: &[String]) -> Result<(), ConfigError> {
        for item in overrides {
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidOverride(item.clone()))?;
            self.apply_property(key, value)?;
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            message: "expected a boolean".to_string(),
        }),
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

/// Split a properties document into `(key, value)` pairs.
/// Blank lines and lines starting with `#` or `!` are skipped.
fn parse_properties(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let sep = line.find(['=', ':'])?;
            let (key, value) = line.split_at(sep);
            Some((key.trim().to_string(), value[1..].trim().to_string()))
        })
        .collect()
}

/// Options for loading configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// `key=value` overrides applied after the file.
    pub overrides: Vec<String>,
}

/// Load configuration with explicit options.
pub async fn load_config(options: &LoadOptions) -> Result<Config, ConfigError> {
    let mut config = match options.config_path {
        Some(ref path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            Config::load_from_path(Path::new(&expanded)).await?
        }
        None => Config::load().await?,
    };
    config.apply_overrides(&options.overrides)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_surface() {
        let config = Config::from_properties_str(
            "# filter\n\
             keep.lang = en\n\
             skip.status: error|failed\n\
             annotation.types = Person, Location\n\
             annotation.features = Person.gender,Location.country\n\
             annotation.outputset = filtered\n\
             field.person = Person.*\n\
             projector.includeAnnotations = false\n",
        )
        .unwrap();

        assert_eq!(config.keep.get("lang").unwrap(), "en");
        assert_eq!(config.skip.get("status").unwrap(), "error|failed");
        assert_eq!(config.annotation.types.items(), vec!["Person", "Location"]);
        assert_eq!(
            config.annotation.features.items(),
            vec!["Person.gender", "Location.country"]
        );
        assert_eq!(config.annotation.outputset, "filtered");
        assert_eq!(config.field.get("person").unwrap(), "Person.*");
        assert!(!config.projector.include_annotations);
    }

    #[test]
    fn test_field_key_keeps_dots_in_name() {
        let config = Config::from_properties([("field.entity.person", "Person")]).unwrap();
        assert_eq!(config.field.get("entity.person").unwrap(), "Person");
    }

    #[test]
    fn test_invalid_bool_is_rejected() {
        let err = Config::from_properties([("projector.includeAnnotations", "maybe")]);
        assert!(matches!(err, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = Config::from_properties([("nonsense", "1"), ("foo.bar", "2")]).unwrap();
        assert!(config.keep.is_empty());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(&["keep.lang=en".to_string(), "skip.url=.*\\.pdf".to_string()])
            .unwrap();
        assert_eq!(config.keep.get("lang").unwrap(), "en");
        assert_eq!(config.skip.get("url").unwrap(), ".*\\.pdf");

        assert!(matches!(
            config.apply_overrides(&["novalue".to_string()]),
            Err(ConfigError::InvalidOverride(_))
        ));
    }

    #[test]
    fn test_toml_structure() {
        let config: Config = toml::from_str(
            r#"
            [keep]
            lang = "en"

            [annotation]
            types = ["Person", "Location"]
            features = "Person.gender"

            [field]
            person = "Person.*"

            [projector]
            includeAnnotations = true
            textField = "body"
            "#,
        )
        .unwrap();

        assert_eq!(config.annotation.types.items(), vec!["Person", "Location"]);
        assert_eq!(config.annotation.features.items(), vec!["Person.gender"]);
        assert_eq!(config.projector.text_field, "body");
        assert_eq!(config.projector.url_field, "url");
        assert!(config.processors.is_empty());
    }

    #[tokio::test]
    async fn test_load_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("docsieve.yaml");
        std::fs::write(&yaml, "keep:\n  lang: en\nannotation:\n  types: Person\n").unwrap();
        let config = Config::load_from_path(&yaml).await.unwrap();
        assert_eq!(config.keep.get("lang").unwrap(), "en");
        assert_eq!(config.source_path.as_deref(), Some(yaml.as_path()));

        let props = dir.path().join("docsieve.properties");
        std::fs::write(&props, "skip.lang=.+\n").unwrap();
        let config = Config::load_from_path(&props).await.unwrap();
        assert_eq!(config.skip.get("lang").unwrap(), ".+");

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::load_from_path(&missing).await,
            Err(ConfigError::Io { .. })
        ));
    }
}
