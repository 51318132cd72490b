//! # votlint
//!
//! Command-line VOTable validator.
//!
//! ## Usage
//!
//! ```bash
//! # Check a file against the version it declares
//! votlint table.vot
//!
//! # Check standard input against VOTable 1.3, stopping after 50 errors
//! votlint --votable 1.3 --error-limit 50 < table.vot
//!
//! # Machine-readable output
//! votlint --format json table.vot
//! ```
//!
//! The exit status is 1 when any ERROR was reported.

use anyhow::Result;
use clap::Parser;

mod cli;

use cli::{dispatch, init_logging, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbosity());
    dispatch(cli)
}
