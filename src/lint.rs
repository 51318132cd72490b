//! # Linter façade
//!
//! [`VotLinter`] runs the whole pipeline over one document:
//!
//! 1. pick the version: configured, or detected from the first element,
//!    falling back to the latest supported version
//! 2. optionally insert a DOCTYPE
//! 3. parse, driving a [`VotLintContentHandler`]
//! 4. report unresolved references and summarize
//!
//! A linter holds only configuration and shared services, so one instance
//! can check any number of documents, from any number of threads.
//!
//! ```rust,no_run
//! use votlint::{CollectingSink, LintConfig, VotLinter};
//!
//! let linter = VotLinter::new(LintConfig::default())?;
//! let mut sink = CollectingSink::new();
//! let summary = linter.lint_path("table.vot", &mut sink)?;
//! println!("{} errors", summary.errors);
//! # Ok::<(), votlint::LintError>(())
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::code::{codes, Level};
use crate::config::{LintConfig, TargetVersion};
use crate::content::VotLintContentHandler;
use crate::context::VotLintContext;
use crate::error::LintError;
use crate::message::MessageSink;
use crate::prescan::{detect_version, DoctypeInterpolator, DoctypeOutcome};
use crate::sax::{ParseEnd, SaxParser};
use crate::services::LintServices;
use crate::version::VotableVersion;

/// Outcome of linting one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LintSummary {
    /// Version the document was checked against; `None` in permissive mode
    pub version: Option<VotableVersion>,
    /// ERROR messages reported
    pub errors: usize,
    /// WARNING messages reported
    pub warnings: usize,
    /// INFO messages reported
    pub infos: usize,
    /// True if the parser reached the end of the document
    pub completed: bool,
    /// True if the error limit stopped the parse
    pub aborted: bool,
}

impl LintSummary {
    /// True if the whole document was read and no error was found.
    pub fn is_valid(&self) -> bool {
        self.completed && self.errors == 0
    }
}

/// Validates VOTable documents.
pub struct VotLinter {
    config: LintConfig,
    services: Arc<LintServices>,
}

impl VotLinter {
    /// Creates a linter, loading the service files named by the
    /// configuration.
    pub fn new(config: LintConfig) -> Result<Self, LintError> {
        let services = LintServices::from_config(&config.services)?;
        Ok(Self::with_services(config, Arc::new(services)))
    }

    /// Creates a linter sharing existing services.
    pub fn with_services(config: LintConfig, services: Arc<LintServices>) -> Self {
        Self { config, services }
    }

    /// The configuration in use.
    pub fn config(&self) -> &LintConfig {
        &self.config
    }

    /// The shared services.
    pub fn services(&self) -> &Arc<LintServices> {
        &self.services
    }

    /// Lints a file. Relative STREAM `href`s resolve against the file's
    /// directory unless a base directory is configured.
    pub fn lint_path(
        &self,
        path: impl AsRef<Path>,
        sink: &mut dyn MessageSink,
    ) -> Result<LintSummary, LintError> {
        let path = path.as_ref();
        log::info!("Linting {}", path.display());
        let file = File::open(path)?;
        let base_dir = self
            .config
            .base_dir
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf));
        self.run(BufReader::new(file), base_dir, sink)
    }

    /// Lints a document read from `reader`.
    pub fn lint<'r, R: Read + 'r>(
        &self,
        reader: R,
        sink: &mut dyn MessageSink,
    ) -> Result<LintSummary, LintError> {
        self.run(reader, self.config.base_dir.clone(), sink)
    }

    fn run<'r, R: Read + 'r>(
        &self,
        reader: R,
        base_dir: Option<std::path::PathBuf>,
        sink: &mut dyn MessageSink,
    ) -> Result<LintSummary, LintError> {
        let mut input: Box<dyn Read + 'r> = Box::new(reader);

        let version = match &self.config.version {
            Some(TargetVersion::Known(v)) => Some(*v),
            Some(TargetVersion::Unknown(name)) => {
                log::warn!(
                    "No rules for VOTable version {}, checking permissively",
                    name
                );
                None
            }
            None => {
                let sniffed = detect_version(input)?;
                input = Box::new(sniffed.reader);
                let version = sniffed.version.unwrap_or_else(|| {
                    let latest = VotableVersion::latest();
                    log::info!("No usable version declared, checking against {}", latest);
                    latest
                });
                Some(version)
            }
        };

        let mut ctx = VotLintContext::new(version, sink, Arc::clone(&self.services));
        ctx.set_validate(self.config.validate);
        ctx.set_error_limit(self.config.error_limit);
        ctx.set_base_dir(base_dir);

        if self.config.interpolate_doctype {
            let interpolator =
                DoctypeInterpolator::for_version(version.unwrap_or_else(VotableVersion::latest));
            let interpolated = interpolator.interpolate(input)?;
            if interpolated.outcome == DoctypeOutcome::Inconclusive {
                ctx.report_at(
                    Level::Info,
                    codes::DTI,
                    "Could not tell whether a DOCTYPE is needed, document left unchanged"
                        .to_string(),
                    None,
                );
            }
            input = Box::new(interpolated.reader);
        }

        let mut handler =
            VotLintContentHandler::new(ctx).with_unused_ids(self.config.report_unused_ids);
        let end = SaxParser::new().parse(input, &mut handler)?;
        let ctx = handler.into_context();

        let summary = LintSummary {
            version,
            errors: ctx.count(Level::Error),
            warnings: ctx.count(Level::Warning),
            infos: ctx.count(Level::Info),
            completed: end == ParseEnd::Completed,
            aborted: ctx.is_aborted(),
        };
        log::info!(
            "Lint finished: {} errors, {} warnings, {} infos ({:?})",
            summary.errors,
            summary.warnings,
            summary.infos,
            end
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CollectingSink;

    fn lint(config: LintConfig, doc: &str) -> (LintSummary, CollectingSink) {
        let linter = VotLinter::with_services(config, Arc::new(LintServices::default()));
        let mut sink = CollectingSink::new();
        let summary = linter.lint(doc.as_bytes(), &mut sink).unwrap();
        (summary, sink)
    }

    #[test]
    fn test_detected_version() {
        let doc = r#"<VOTABLE version="1.2" xmlns="http://www.ivoa.net/xml/VOTable/v1.2"><RESOURCE/></VOTABLE>"#;
        let (summary, sink) = lint(LintConfig::default(), doc);
        assert_eq!(summary.version, Some(VotableVersion::V1_2));
        assert!(summary.is_valid(), "{:?}", sink.messages());
    }

    #[test]
    fn test_fallback_to_latest() {
        let doc = r#"<VOTABLE xmlns="http://www.ivoa.net/xml/VOTable/v1.3"><RESOURCE/></VOTABLE>"#;
        let (summary, _) = lint(LintConfig::default(), doc);
        assert_eq!(summary.version, Some(VotableVersion::V1_3));

        let (summary, sink) = lint(LintConfig::default(), "<VOTABLE/>");
        assert_eq!(summary.version, Some(VotableVersion::latest()));
        assert_eq!(sink.with_code(codes::NS0).len(), 1);
    }

    #[test]
    fn test_unknown_target_is_permissive() {
        let config = LintConfig::default().with_version("9.9".parse::<TargetVersion>().unwrap());
        let (summary, sink) = lint(config, "<VOTABLE><ANYTHING/></VOTABLE>");
        assert_eq!(summary.version, None);
        assert!(sink.messages().is_empty(), "{:?}", sink.messages());
    }

    #[test]
    fn test_doctype_interpolation_notes() {
        let config = LintConfig::default()
            .with_version(VotableVersion::V1_0)
            .with_doctype_interpolation(true);
        let (summary, sink) = lint(config.clone(), "<?xml version=\"1.0\"?>\n<VOTABLE/>");
        assert!(summary.is_valid(), "{:?}", sink.messages());
        assert!(sink.with_code(codes::DTI).is_empty());

        let padded = format!("<!--{}", " ".repeat(300_000));
        let (summary, sink) = lint(config, &padded);
        assert!(!summary.completed);
        assert_eq!(sink.with_code(codes::DTI).len(), 1);
    }

    #[test]
    fn test_error_limit() {
        let config = LintConfig::default()
            .with_version(VotableVersion::V1_0)
            .with_error_limit(2);
        let (summary, _) = lint(config, "<VOTABLE><A/><B/><C/><D/></VOTABLE>");
        assert!(summary.aborted);
        assert!(!summary.completed);
        assert_eq!(summary.errors, 2);
    }
}
