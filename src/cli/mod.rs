use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

mod config;
mod lint;

/// votlint - Streaming VOTable Validator
#[derive(Parser)]
#[command(name = "votlint")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// VOTable document to check (standard input if omitted)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// VOTable version to check against (detected from the document if omitted)
    #[arg(long, value_name = "VERSION")]
    votable: Option<String>,

    /// Don't report elements unknown at the checked version
    #[arg(long)]
    no_validate: bool,

    /// Messages printed per code before further ones are suppressed
    #[arg(long, value_name = "N")]
    repeat: Option<usize>,

    /// Stop checking after this many errors
    #[arg(long, value_name = "N")]
    error_limit: Option<usize>,

    /// Print a backtrace with each message
    #[arg(long)]
    debug: bool,

    /// Insert a VOTable DOCTYPE when the document has none
    #[arg(long)]
    doctype: bool,

    /// Report IDs that are never referenced
    #[arg(long)]
    unused_ids: bool,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// UCD1+ word list used for UCD checks
    #[arg(long, value_name = "FILE")]
    ucd_words: Option<PathBuf>,

    /// Directory of IVOA vocabulary files (<name>.desise.json)
    #[arg(long, value_name = "DIR")]
    vocab_dir: Option<PathBuf>,
}

/// How messages are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line of text per message
    #[default]
    Text,
    /// One JSON object per message
    Json,
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    let summary = lint::run(&cli)?;
    if summary.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "votlint",
            "--votable",
            "1.2",
            "--no-validate",
            "--error-limit",
            "20",
            "--format",
            "json",
            "-vv",
            "table.vot",
        ])
        .unwrap();
        assert_eq!(cli.votable.as_deref(), Some("1.2"));
        assert!(cli.no_validate);
        assert_eq!(cli.error_limit, Some(20));
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert_eq!(cli.verbosity(), 2);
        assert_eq!(cli.file, Some(PathBuf::from("table.vot")));
    }
}
