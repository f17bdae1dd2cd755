//! Built-in document processors.
//!
//! Each `[[processors]]` entry in the configuration names a `kind`; [`build`]
//! maps it to a constructor. Unknown kinds fail when the configuration is
//! deserialized.
//!
//! ```toml
//! [[processors]]
//! kind = "text"
//! drop_unsupported = true
//!
//! [[processors]]
//! kind = "regex"
//! type = "Email"
//! pattern = '(?P<user>[\w.]+)@(?P<domain>[\w.]+)'
//! ```

mod command;
mod metadata;
mod pattern;
mod split;
mod text;

pub use command::{CommandConfig, CommandProcessor};
pub use metadata::{MetadataConfig, MetadataProcessor};
pub use pattern::{RegexAnnotator, RegexConfig};
pub use split::{SplitConfig, SplitProcessor};
pub use text::{TextConfig, TextExtractor};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::pipeline::DocumentProcessor;

/// One configured processor stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessorSpec {
    Text(TextConfig),
    Regex(RegexConfig),
    Command(CommandConfig),
    Metadata(MetadataConfig),
    Split(SplitConfig),
}

impl ProcessorSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Regex(_) => "regex",
            Self::Command(_) => "command",
            Self::Metadata(_) => "metadata",
            Self::Split(_) => "split",
        }
    }

    /// Configured name, defaulting to the kind.
    pub fn name(&self) -> &str {
        let name = match self {
            Self::Text(c) => c.name.as_deref(),
            Self::Regex(c) => c.name.as_deref(),
            Self::Command(c) => c.name.as_deref(),
            Self::Metadata(c) => c.name.as_deref(),
            Self::Split(c) => c.name.as_deref(),
        };
        name.unwrap_or_else(|| self.kind())
    }
}

/// Construct a fresh processor instance for `spec`.
pub fn build(spec: &ProcessorSpec) -> Result<Box<dyn DocumentProcessor>, ConfigError> {
    let name = spec.name().to_string();
    let processor: Box<dyn DocumentProcessor> = match spec {
        ProcessorSpec::Text(config) => Box::new(TextExtractor::new(name, config.clone())),
        ProcessorSpec::Regex(config) => Box::new(RegexAnnotator::new(name, config)?),
        ProcessorSpec::Command(config) => Box::new(CommandProcessor::new(name, config.clone())?),
        ProcessorSpec::Metadata(config) => {
            Box::new(MetadataProcessor::new(name, config.clone()))
        }
        ProcessorSpec::Split(config) => Box::new(SplitProcessor::new(name, config)?),
    };
    Ok(processor)
}

/// Match a content type against a pattern such as `text/*` or `*/*`.
pub fn mimetype_matches(pattern: &str, mimetype: &str) -> bool {
    if pattern == "*" || pattern == "*/*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix("/*") {
        mimetype
            .split_once('/')
            .is_some_and(|(top, _)| top.eq_ignore_ascii_case(prefix))
    } else {
        pattern.eq_ignore_ascii_case(mimetype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_mimetype_matching() {
        assert!(mimetype_matches("text/*", "text/html"));
        assert!(mimetype_matches("*/*", "application/pdf"));
        assert!(mimetype_matches("application/pdf", "application/pdf"));
        assert!(!mimetype_matches("text/*", "textual/html"));
        assert!(!mimetype_matches("video/mp4", "video/webm"));
    }

    #[test]
    fn test_specs_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [[processors]]
            kind = "text"
            drop_unsupported = true

            [[processors]]
            kind = "regex"
            name = "emails"
            type = "Email"
            pattern = '(?P<user>\w+)@example\.com'

            [[processors]]
            kind = "metadata"
            set = { batch = "b1" }
            "#,
        )
        .unwrap();

        assert_eq!(config.processors.len(), 3);
        assert_eq!(config.processors[0].name(), "text");
        assert_eq!(config.processors[1].name(), "emails");
        assert_eq!(config.processors[2].kind(), "metadata");
        for spec in &config.processors {
            assert!(build(spec).is_ok());
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [[processors]]
            kind = "tokenizer"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let spec = ProcessorSpec::Regex(RegexConfig {
            name: None,
            annotation_type: "Bad".to_string(),
            pattern: "(unclosed".to_string(),
            case_insensitive: false,
        });
        assert!(matches!(build(&spec), Err(ConfigError::Processor { .. })));
    }
}
