//! Linter configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::version::VotableVersion;

/// The VOTable version a document is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetVersion {
    /// A supported version
    Known(VotableVersion),
    /// A version string the linter has no rules for; checking falls back to
    /// a permissive mode that accepts every element
    Unknown(String),
}

impl TargetVersion {
    /// The supported version, if any.
    pub fn known(&self) -> Option<VotableVersion> {
        match self {
            TargetVersion::Known(v) => Some(*v),
            TargetVersion::Unknown(_) => None,
        }
    }
}

impl FromStr for TargetVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<VotableVersion>() {
            Ok(v) => TargetVersion::Known(v),
            Err(_) => TargetVersion::Unknown(s.trim().to_string()),
        })
    }
}

impl From<VotableVersion> for TargetVersion {
    fn from(v: VotableVersion) -> Self {
        TargetVersion::Known(v)
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetVersion::Known(v) => write!(f, "{}", v),
            TargetVersion::Unknown(s) => f.write_str(s),
        }
    }
}

/// Locations of the external vocabularies the attribute checkers consult.
///
/// Every entry is optional; without them the built-in seed lists are used.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// IVOA UCD1+ word list (`FLAG | word | description` lines)
    pub ucd_word_list: Option<PathBuf>,
    /// List of deprecated UCD1+ words, one per line (first token)
    pub ucd_deprecated_list: Option<PathBuf>,
    /// Directory holding `<vocabulary>.desise.json` files
    pub vocabulary_dir: Option<PathBuf>,
}

/// Configuration for one [`VotLinter`](crate::VotLinter).
#[derive(Debug, Clone)]
pub struct LintConfig {
    /// Version to check against; `None` detects it from the document
    pub version: Option<TargetVersion>,

    /// Strict mode: elements unknown at the target version are errors.
    /// Otherwise they are skipped silently.
    pub validate: bool,

    /// Stop after this many errors
    pub error_limit: Option<usize>,

    /// Insert a DOCTYPE before parsing when the document has none
    pub interpolate_doctype: bool,

    /// Report IDs that are defined but never referenced
    pub report_unused_ids: bool,

    /// Directory against which relative STREAM `href`s are resolved
    pub base_dir: Option<PathBuf>,

    /// External vocabulary locations
    pub services: ServiceConfig,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            version: None,
            validate: true,
            error_limit: None,
            interpolate_doctype: false,
            report_unused_ids: false,
            base_dir: None,
            services: ServiceConfig::default(),
        }
    }
}

impl LintConfig {
    /// Checks against a fixed version instead of detecting one.
    pub fn with_version(mut self, version: impl Into<TargetVersion>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Enables or disables strict mode.
    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Sets the fail-fast error limit.
    pub fn with_error_limit(mut self, limit: usize) -> Self {
        self.error_limit = Some(limit);
        self
    }

    /// Enables DOCTYPE interpolation.
    pub fn with_doctype_interpolation(mut self, enabled: bool) -> Self {
        self.interpolate_doctype = enabled;
        self
    }

    /// Enables the unused-ID report.
    pub fn with_unused_ids(mut self, enabled: bool) -> Self {
        self.report_unused_ids = enabled;
        self
    }

    /// Sets the base directory for relative `href`s.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}
