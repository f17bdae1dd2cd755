//! Metadata-based accept/reject predicate.
//!
//! Built once from `keep.<field> = <regex>` and `skip.<field> = <regex>`
//! rules. Every keep rule must find a value of its field that fully matches;
//! no skip rule may find one. Multi-valued fields satisfy a rule when any
//! value matches.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use crate::config::Config;
use crate::models::Document;

/// A compiled rule on a single metadata field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    field: String,
    pattern: String,
    regex: Regex,
}

impl FieldRule {
    /// Compile a rule. The pattern must match a value in full.
    pub fn new(field: &str, pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(Self {
            field: field.to_string(),
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// First value of the rule's field that fully matches.
    fn matching_value<'a>(&self, doc: &'a Document) -> Option<&'a str> {
        doc.metadata
            .get(&self.field)?
            .iter()
            .map(String::as_str)
            .find(|value| self.regex.is_match(value))
    }
}

/// Why a document was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A keep rule's field has no value.
    MissingField { field: String },
    /// No value of a keep rule's field matches.
    KeepMismatch { field: String, pattern: String },
    /// A value matches a skip rule.
    SkipMatch { field: String, value: String },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingField { field } => write!(f, "keep.{}: field missing", field),
            Rejection::KeepMismatch { field, pattern } => {
                write!(f, "keep.{}: no value matches '{}'", field, pattern)
            }
            Rejection::SkipMatch { field, value } => {
                write!(f, "skip.{}: value '{}' matches", field, value)
            }
        }
    }
}

/// Configuration-built document predicate.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    keep: Vec<FieldRule>,
    skip: Vec<FieldRule>,
}

impl DocumentFilter {
    /// Build from rule maps. Rules whose regex does not compile are logged and dropped.
    pub fn new(keep: &BTreeMap<String, String>, skip: &BTreeMap<String, String>) -> Self {
        Self {
            keep: compile_rules("keep", keep),
            skip: compile_rules("skip", skip),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.keep, &config.skip)
    }

    /// True when no rules are configured; every document is accepted.
    pub fn is_empty(&self) -> bool {
        self.keep.is_empty() && self.skip.is_empty()
    }

    pub fn keep_rules(&self) -> &[FieldRule] {
        &self.keep
    }

    pub fn skip_rules(&self) -> &[FieldRule] {
        &self.skip
    }

    /// Whether `doc` survives the filter.
    pub fn filter(&self, doc: &Document) -> bool {
        self.check(doc).is_ok()
    }

    /// Evaluate the rules, keep rules first, stopping at the first rejection.
    pub fn check(&self, doc: &Document) -> Result<(), Rejection> {
        for rule in &self.keep {
            if !doc.metadata.contains_key(&rule.field) {
                return Err(Rejection::MissingField {
                    field: rule.field.clone(),
                });
            }
            if rule.matching_value(doc).is_none() {
                return Err(Rejection::KeepMismatch {
                    field: rule.field.clone(),
                    pattern: rule.pattern.clone(),
                });
            }
        }

        for rule in &self.skip {
            if let Some(value) = rule.matching_value(doc) {
                return Err(Rejection::SkipMatch {
                    field: rule.field.clone(),
                    value: value.to_string(),
                });
            }
        }

        Ok(())
    }
}

fn compile_rules(kind: &str, rules: &BTreeMap<String, String>) -> Vec<FieldRule> {
    rules
        .iter()
        .filter_map(|(field, pattern)| match FieldRule::new(field, pattern) {
            Ok(rule) => Some(rule),
            Err(e) => {
                tracing::warn!("Dropping {}.{} rule '{}': {}", kind, field, pattern, e);
                None
            }
        })
        .collect()
}
