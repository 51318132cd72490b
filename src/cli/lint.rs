use anyhow::{Context, Result};
use log::info;
use std::io::{self, Write};
use std::path::Path;

use votlint::message::DEFAULT_MAX_REPEAT;
use votlint::{
    JsonLinesSink, LintConfig, LintSummary, MessageSink, PrintSaxMessager, TargetVersion,
    VotLinter,
};

use super::config::Config;
use super::{Cli, OutputFormat};

/// Merges the config file (if any) with the command line; flags win.
fn lint_config(cli: &Cli, file: &Config) -> Result<LintConfig> {
    let mut config = LintConfig::default();

    if let Some(version) = cli.votable.as_deref().or(file.lint.votable.as_deref()) {
        let target: TargetVersion = version.parse()?;
        if let TargetVersion::Unknown(name) = &target {
            eprintln!("Warning: no rules for VOTable version {}, checking permissively", name);
        }
        config = config.with_version(target);
    }
    config.validate = !cli.no_validate && file.lint.validate.unwrap_or(true);
    config.error_limit = cli.error_limit.or(file.lint.error_limit);
    config.interpolate_doctype = cli.doctype || file.lint.doctype.unwrap_or(false);
    config.report_unused_ids = cli.unused_ids || file.lint.unused_ids.unwrap_or(false);

    config.services.ucd_word_list = cli.ucd_words.clone().or_else(|| file.services.ucd_words.clone());
    config.services.ucd_deprecated_list = file.services.ucd_deprecated.clone();
    config.services.vocabulary_dir = cli.vocab_dir.clone().or_else(|| file.services.vocab_dir.clone());
    Ok(config)
}

fn lint_input(
    linter: &VotLinter,
    file: Option<&Path>,
    sink: &mut dyn MessageSink,
) -> Result<LintSummary> {
    match file {
        Some(path) => linter
            .lint_path(path, sink)
            .with_context(|| format!("Failed to lint {}", path.display())),
        None => linter
            .lint(io::stdin().lock(), sink)
            .context("Failed to lint standard input"),
    }
}

/// Lints the document named on the command line.
pub fn run(cli: &Cli) -> Result<LintSummary> {
    let file_config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = lint_config(cli, &file_config)?;
    let linter = VotLinter::new(config).context("Failed to load lint services")?;

    let format = cli.format.or(file_config.lint.format).unwrap_or_default();
    let stdout = io::stdout();
    let summary = match format {
        OutputFormat::Text => {
            #[cfg(feature = "colorized_output")]
            let colored = console::colors_enabled();
            #[cfg(not(feature = "colorized_output"))]
            let colored = false;

            let repeat = cli
                .repeat
                .or(file_config.lint.repeat)
                .unwrap_or(DEFAULT_MAX_REPEAT);
            let mut sink = PrintSaxMessager::new(stdout.lock())
                .with_max_repeat(repeat)
                .with_debug(cli.debug)
                .with_color(colored);
            let summary = lint_input(&linter, cli.file.as_deref(), &mut sink)?;
            if sink.suppressed() > 0 {
                info!("{} repeated messages suppressed", sink.suppressed());
            }
            sink.into_inner().flush()?;
            summary
        }
        OutputFormat::Json => {
            let mut sink = JsonLinesSink::new(stdout.lock());
            lint_input(&linter, cli.file.as_deref(), &mut sink)?
        }
    };

    info!(
        "{}: {} errors, {} warnings",
        cli.file
            .as_deref()
            .map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string()),
        summary.errors,
        summary.warnings
    );
    Ok(summary)
}
