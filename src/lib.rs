//! # votlint - Streaming VOTable Validator
//!
//! `votlint` checks VOTable XML documents against the rules of the VOTable
//! version they declare (1.0 to 1.5) in a single streaming pass, without
//! building a document tree.
//!
//! ## What Gets Checked
//!
//! - **Structure**: every element must exist at the version in effect;
//!   deprecated elements and attributes are flagged.
//!
//! - **Attributes**: ID syntax and uniqueness, IDREF targets, FIELD name
//!   uniqueness, UCD and VOUnits syntax, IVOA vocabulary terms, `width`,
//!   `precision` and `version`.
//!
//! - **Data**: TABLEDATA cells, BINARY and BINARY2 streams and FITS
//!   tables are checked against the FIELD declarations, and row counts
//!   against `nrows`.
//!
//! - **References**: IDREFs may precede their IDs; anything still unresolved
//!   at the end of the document is an error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use votlint::{LintConfig, PrintSaxMessager, VotLinter, VotableVersion};
//!
//! let config = LintConfig::default()
//!     .with_version(VotableVersion::V1_4)
//!     .with_error_limit(100);
//! let linter = VotLinter::new(config)?;
//!
//! let mut sink = PrintSaxMessager::new(std::io::stdout());
//! let summary = linter.lint_path("catalogue.vot", &mut sink)?;
//! if !summary.is_valid() {
//!     std::process::exit(1);
//! }
//! # Ok::<(), votlint::LintError>(())
//! ```
//!
//! ## Diagnostics
//!
//! Findings are [`Message`]s with a level (INFO, WARNING or ERROR), a stable
//! three-character code and an optional line/column position. They are
//! delivered to a [`MessageSink`]:
//!
//! | Sink | Output |
//! |------|--------|
//! | [`PrintSaxMessager`] | text lines, repeated codes capped |
//! | [`JsonLinesSink`] | one JSON object per message |
//! | [`CollectingSink`] | kept in memory |
//!
//! ## Architecture
//!
//! - [`sax`]: push-style event layer over quick-xml
//! - [`content`]: the SAX handler that drives the element stack
//! - [`detail`]: per-version element and attribute tables
//! - [`handler`]: per-element behaviour (tables, fields, data, streams)
//! - [`values`]: datatype parsers for text and binary cells
//! - [`attribute`]: attribute checkers
//! - [`prescan`]: version detection and DOCTYPE insertion
//! - [`lint`]: the [`VotLinter`] façade

#![warn(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod attribute;
pub mod cache;
pub mod code;
pub mod config;
pub mod content;
pub mod context;
pub mod decode;
pub mod detail;
pub mod error;
pub mod fits;
pub mod handler;
pub mod lint;
pub mod message;
pub mod prescan;
pub mod sax;
pub mod services;
pub mod stack;
pub mod values;
pub mod version;

pub use crate::code::{codes, Level, Message, Position, VotLintCode};
pub use crate::config::{LintConfig, ServiceConfig, TargetVersion};
pub use crate::error::LintError;
pub use crate::lint::{LintSummary, VotLinter};
pub use crate::message::{CollectingSink, JsonLinesSink, MessageSink, PrintSaxMessager};
pub use crate::services::LintServices;
pub use crate::version::VotableVersion;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::code::{codes, Level, Message, Position, VotLintCode};
    pub use crate::config::{LintConfig, ServiceConfig, TargetVersion};
    pub use crate::context::{Reporter, VotLintContext};
    pub use crate::detail::VersionDetail;
    pub use crate::error::LintError;
    pub use crate::lint::{LintSummary, VotLinter};
    pub use crate::message::{CollectingSink, JsonLinesSink, MessageSink, PrintSaxMessager};
    pub use crate::prescan::{detect_version, DoctypeInterpolator, DoctypeOutcome};
    pub use crate::services::LintServices;
    pub use crate::values::{ContentClass, Declaration, ParseOptions, ValueParser};
    pub use crate::version::VotableVersion;
}
