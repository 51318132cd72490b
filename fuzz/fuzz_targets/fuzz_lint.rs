#![no_main]

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use votlint::{CollectingSink, LintConfig, LintServices, VotLinter};

fuzz_target!(|data: &[u8]| {
    // Any byte sequence must lint to a summary or an error, never a panic.
    let linter = VotLinter::with_services(
        LintConfig::default().with_doctype_interpolation(true),
        Arc::new(LintServices::default()),
    );
    let mut sink = CollectingSink::new();
    let _ = linter.lint(data, &mut sink);
});
