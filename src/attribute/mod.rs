//! # Attribute checkers
//!
//! Each attribute of an element may have a checker attached by the version
//! tables ([`crate::detail`]). A checker looks at one attribute value in the
//! context of its element and reports zero or more diagnostics. Only the ID
//! and reference checkers touch context state; all others are pure.
//!
//! The UCD, unit and vocabulary checkers delegate to the classifiers in the
//! submodules, reached through the shared [`LintServices`](crate::LintServices)
//! so their results are cached across documents.

pub mod ucd;
pub mod units;
pub mod vocab;

use crate::code::{codes, Level};
use crate::context::{Reporter, VotLintContext};
use crate::stack::ElementRef;
use crate::version::VotableVersion;

use self::vocab::{TermStatus, Vocabulary};

/// What a checker knows about the attribute it is checking.
#[derive(Debug, Clone, Copy)]
pub struct CheckerArgs<'a> {
    /// Attribute name
    pub attribute: &'a str,
    /// The element carrying the attribute
    pub element: &'a ElementRef,
    /// Its parent, if any
    pub parent: Option<&'a ElementRef>,
}

/// Constrains the element types an IDREF attribute may sensibly point to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefChecker {
    targets: &'static [&'static str],
}

impl RefChecker {
    /// Plain IDREF: any target element is acceptable.
    pub const ANY: RefChecker = RefChecker { targets: &[] };

    /// Checker accepting references to the given element names.
    pub const fn new(targets: &'static [&'static str]) -> Self {
        Self { targets }
    }

    /// Element names this reference may point to.
    pub fn targets(&self) -> &'static [&'static str] {
        self.targets
    }

    /// Checks a resolved reference. Pointing at an unexpected element type
    /// is questionable, not illegal, so it is only a warning.
    pub fn check_link(
        &self,
        attribute: &str,
        from: &ElementRef,
        id: &str,
        target: &ElementRef,
        reporter: &mut dyn Reporter,
    ) {
        if !self.targets.is_empty() && !self.targets.contains(&target.name()) {
            reporter.warning(
                codes::RFT,
                format!(
                    "{} attribute of {} references {} (\"{}\"), expected {}",
                    attribute,
                    from,
                    target,
                    id,
                    self.targets.join("/")
                ),
            );
        }
    }
}

/// An attribute check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeChecker {
    /// XML ID syntax and uniqueness
    Id,
    /// Name uniqueness among the parent's children
    UniqueName,
    /// IDREF target type
    Ref(RefChecker),
    /// UCD syntax and vocabulary
    Ucd,
    /// VOUnits syntax
    Unit,
    /// `arraysize="1"` is deprecated
    ArraysizeDeprecation,
    /// `width` is a non-negative integer
    Width,
    /// `precision` is `[EF]?digits`
    Precision,
    /// `version` matches the version being checked
    Version,
    /// The attribute itself is deprecated
    Deprecated,
    /// Value must be a term of an IVOA vocabulary
    Vocabulary(Vocabulary),
}

impl AttributeChecker {
    /// Runs the check on one attribute value.
    pub fn check(&self, value: &str, args: &CheckerArgs<'_>, ctx: &mut VotLintContext<'_>) {
        match self {
            AttributeChecker::Id => check_id(value, args, ctx),
            AttributeChecker::UniqueName => {
                if let Some(parent) = args.parent {
                    ctx.check_unique_name(parent, value, args.element);
                }
            }
            AttributeChecker::Ref(checker) => {
                ctx.register_ref(value.trim(), args.element, args.attribute, *checker);
            }
            AttributeChecker::Ucd => {
                let status = ctx.services().ucd_status(value);
                if let Some(level) = status.level() {
                    let code = if level == Level::Error {
                        codes::UCD
                    } else {
                        codes::UCW
                    };
                    ctx.report(level, code, status.describe(value));
                }
            }
            AttributeChecker::Unit => {
                let status = ctx.services().unit_status(value);
                if let Some(level) = status.level() {
                    ctx.report(level, codes::VOU, status.describe(value));
                }
            }
            AttributeChecker::ArraysizeDeprecation => {
                if value.trim() == "1" {
                    ctx.warning(
                        codes::AS1,
                        format!(
                            "arraysize=\"1\" on {} is deprecated; omit arraysize for scalars",
                            args.element
                        ),
                    );
                }
            }
            AttributeChecker::Width => {
                let trimmed = value.trim();
                if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
                    ctx.error(
                        codes::WID,
                        format!("Bad width \"{}\" on {}", value, args.element),
                    );
                }
            }
            AttributeChecker::Precision => {
                let trimmed = value.trim();
                let digits = trimmed
                    .strip_prefix(|c: char| c == 'E' || c == 'F')
                    .unwrap_or(trimmed);
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    ctx.error(
                        codes::PRC,
                        format!("Bad precision \"{}\" on {}", value, args.element),
                    );
                }
            }
            AttributeChecker::Version => check_version(value, ctx),
            AttributeChecker::Deprecated => {
                ctx.warning(
                    codes::DPA,
                    format!(
                        "Attribute {} on {} is deprecated",
                        args.attribute, args.element
                    ),
                );
            }
            AttributeChecker::Vocabulary(vocabulary) => {
                check_vocabulary(*vocabulary, value, args, ctx)
            }
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn check_id(value: &str, args: &CheckerArgs<'_>, ctx: &mut VotLintContext<'_>) {
    let mut chars = value.chars();
    let legal = chars.next().is_some_and(is_name_start) && chars.all(is_name_char);
    if !legal {
        ctx.error(
            codes::IDS,
            format!("ID \"{}\" on {} is not a legal XML ID", value, args.element),
        );
    }
    ctx.register_id(value, args.element);
}

fn check_version(value: &str, ctx: &mut VotLintContext<'_>) {
    match value.parse::<VotableVersion>() {
        Ok(declared) => {
            if let Some(checking) = ctx.version() {
                if declared != checking {
                    ctx.warning(
                        codes::VRM,
                        format!(
                            "Declared version ({}) differs from version being checked ({})",
                            declared, checking
                        ),
                    );
                }
            }
        }
        Err(_) => {
            ctx.warning(
                codes::VRU,
                format!("Unknown VOTable version \"{}\" declared", value),
            );
        }
    }
}

fn check_vocabulary(
    vocabulary: Vocabulary,
    value: &str,
    args: &CheckerArgs<'_>,
    ctx: &mut VotLintContext<'_>,
) {
    let status = ctx.services().vocabulary(vocabulary).check(value);
    let context = format!("{} {}=\"{}\"", args.element, args.attribute, value);
    match status {
        TermStatus::Known => {}
        TermStatus::Deprecated => ctx.warning(
            codes::VCD,
            format!("{}: deprecated term in {}", context, vocabulary.uri()),
        ),
        TermStatus::Preliminary => ctx.info(
            codes::VCP,
            format!("{}: preliminary term in {}", context, vocabulary.uri()),
        ),
        TermStatus::Unknown => ctx.warning(
            codes::VCU,
            format!("{}: not a term in {}", context, vocabulary.uri()),
        ),
        TermStatus::Unavailable(why) => ctx.info(
            codes::VCX,
            format!("{}: term not in built-in list and {} unavailable ({})", context, vocabulary.uri(), why),
        ),
    }
}
