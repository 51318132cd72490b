//! TOML configuration file support.
//!
//! Settings that would otherwise be repeated on every invocation can live in
//! a config file; command-line flags override them:
//!
//! ```toml
//! # votlint.toml
//! [lint]
//! votable = "1.4"
//! validate = true
//! error_limit = 100
//! doctype = false
//! unused_ids = true
//! repeat = 4
//! format = "text"
//!
//! [services]
//! ucd_words = "/data/ivoa/ucd-list.txt"
//! ucd_deprecated = "/data/ivoa/ucd-list-deprecated.txt"
//! vocab_dir = "/data/ivoa/vocabularies"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::OutputFormat;

/// Root configuration structure for votlint.toml files.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Checking and reporting settings.
    #[serde(default)]
    pub lint: LintSection,

    /// External vocabulary files.
    #[serde(default)]
    pub services: ServicesSection,
}

/// The `[lint]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LintSection {
    /// VOTable version to check against.
    pub votable: Option<String>,

    /// Strict mode; unknown elements are errors.
    pub validate: Option<bool>,

    /// Stop after this many errors.
    pub error_limit: Option<usize>,

    /// Insert a DOCTYPE when the document has none.
    pub doctype: Option<bool>,

    /// Report IDs nothing refers to.
    pub unused_ids: Option<bool>,

    /// Messages printed per code before suppression.
    pub repeat: Option<usize>,

    /// Output format.
    pub format: Option<OutputFormat>,
}

/// The `[services]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicesSection {
    /// UCD1+ word list.
    pub ucd_words: Option<PathBuf>,

    /// Deprecated UCD1+ word list.
    pub ucd_deprecated: Option<PathBuf>,

    /// Directory of `<vocabulary>.desise.json` files.
    pub vocab_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [lint]
            votable = "1.3"
            validate = false
            error_limit = 50
            doctype = true
            repeat = 10
            format = "json"

            [services]
            vocab_dir = "/opt/vocab"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.lint.votable.as_deref(), Some("1.3"));
        assert_eq!(config.lint.validate, Some(false));
        assert_eq!(config.lint.error_limit, Some(50));
        assert_eq!(config.lint.doctype, Some(true));
        assert_eq!(config.lint.repeat, Some(10));
        assert_eq!(config.lint.format, Some(OutputFormat::Json));
        assert_eq!(config.services.vocab_dir, Some(PathBuf::from("/opt/vocab")));
        assert_eq!(config.services.ucd_words, None);
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [lint]
            error_limit = 10
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.lint.error_limit, Some(10));
        assert_eq!(config.lint.votable, None);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.lint.error_limit, None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_str("[lint]\ncompression_level = 3\n").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votlint.toml");
        std::fs::write(&path, "[lint]\nunused_ids = true\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.lint.unused_ids, Some(true));

        assert!(Config::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
