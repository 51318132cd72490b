//! IVOA vocabulary term checking.
//!
//! Some attributes (COOSYS `system`, TIMESYS `timescale`, `refposition`)
//! take values from IVOA RDF vocabularies. Each vocabulary ships with a small
//! seed set of well-known terms that answers almost every lookup. Only on a
//! miss is the full term list consulted, fetched once per process through a
//! [`VocabularySource`].

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;

/// An IVOA vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vocabulary {
    /// Reference frames (COOSYS `system`)
    RefFrame,
    /// Reference positions (COOSYS/TIMESYS `refposition`)
    RefPosition,
    /// Time scales (TIMESYS `timescale`)
    TimeScale,
}

impl Vocabulary {
    /// Short vocabulary name, as used in its URI.
    pub fn name(&self) -> &'static str {
        match self {
            Vocabulary::RefFrame => "refframe",
            Vocabulary::RefPosition => "refposition",
            Vocabulary::TimeScale => "timescale",
        }
    }

    /// Vocabulary URI.
    pub fn uri(&self) -> String {
        format!("http://www.ivoa.net/rdf/{}", self.name())
    }

    fn seed(&self) -> (&'static [&'static str], &'static [&'static str]) {
        match self {
            Vocabulary::RefFrame => (
                &[
                    "AZ_EL", "BODY", "ECLIPTIC", "EQUATORIAL", "FK4", "FK5", "GALACTIC",
                    "GALACTIC_I", "GALACTIC_II", "GEO_C", "GEO_D", "ICRS", "SUPER_GALACTIC",
                    "UNKNOWN",
                ],
                &[
                    "barycentric", "ecl_FK4", "ecl_FK5", "eq_FK4", "eq_FK5", "galactic",
                    "geo_app", "supergalactic", "xy",
                ],
            ),
            Vocabulary::RefPosition => (
                &[
                    "BARYCENTER", "EMBARYCENTER", "GALACTIC_CENTER", "GEOCENTER", "HELIOCENTER",
                    "LOCAL_GROUP_CENTER", "LSRD", "LSRK", "MOON", "RELOCATABLE", "TOPOCENTER",
                    "UNKNOWN",
                ],
                &[],
            ),
            Vocabulary::TimeScale => (
                &[
                    "GPS", "LOCAL", "TAI", "TCB", "TCG", "TDB", "TT", "UNKNOWN", "UT", "UT1", "UTC",
                ],
                &["ET", "GMT", "IAT", "TDT"],
            ),
        }
    }
}

/// Status of one term in a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermStatus {
    /// Current term
    Known,
    /// Term exists but is deprecated
    Deprecated,
    /// Term exists but is only preliminary
    Preliminary,
    /// Term is not in the vocabulary
    Unknown,
    /// The full vocabulary could not be consulted
    Unavailable(String),
}

/// Flags attached to a term in a full vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermFlags {
    /// Term is deprecated
    pub deprecated: bool,
    /// Term is preliminary
    pub preliminary: bool,
}

/// The full term list of one vocabulary.
#[derive(Debug, Clone, Default)]
pub struct VocabularyTerms {
    terms: HashMap<String, TermFlags>,
}

impl VocabularyTerms {
    /// Looks up a term.
    pub fn get(&self, term: &str) -> Option<TermFlags> {
        self.terms.get(term).copied()
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True if there are no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Parses an IVOA "desise" JSON document.
    pub fn from_desise(json: &str) -> Result<Self, VocabularyError> {
        #[derive(Deserialize)]
        struct Desise {
            terms: HashMap<String, DesiseTerm>,
        }
        #[derive(Deserialize)]
        struct DesiseTerm {
            #[serde(default)]
            deprecated: Option<serde_json::Value>,
            #[serde(default)]
            preliminary: Option<serde_json::Value>,
        }

        let doc: Desise = serde_json::from_str(json)?;
        let terms = doc
            .terms
            .into_iter()
            .map(|(name, term)| {
                let flags = TermFlags {
                    deprecated: term.deprecated.is_some(),
                    preliminary: term.preliminary.is_some(),
                };
                (name, flags)
            })
            .collect();
        Ok(Self { terms })
    }
}

/// Errors loading a vocabulary.
#[derive(Debug, thiserror::Error)]
pub enum VocabularyError {
    /// No source is configured for this vocabulary
    #[error("Vocabulary {0} not available offline")]
    Unavailable(String),

    /// The vocabulary file could not be read
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The vocabulary file is not valid desise JSON
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Where full vocabularies come from.
pub trait VocabularySource: Send + Sync {
    /// Loads the full term list of a vocabulary.
    fn load(&self, vocabulary: Vocabulary) -> Result<VocabularyTerms, VocabularyError>;
}

/// Source that has no vocabularies; lookups rely on the seed sets alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineSource;

impl VocabularySource for OfflineSource {
    fn load(&self, vocabulary: Vocabulary) -> Result<VocabularyTerms, VocabularyError> {
        Err(VocabularyError::Unavailable(vocabulary.uri()))
    }
}

/// Source reading `<dir>/<name>.desise.json` files.
#[derive(Debug, Clone)]
pub struct DesiseFileSource {
    dir: PathBuf,
}

impl DesiseFileSource {
    /// Creates a source reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl VocabularySource for DesiseFileSource {
    fn load(&self, vocabulary: Vocabulary) -> Result<VocabularyTerms, VocabularyError> {
        let path = self.dir.join(format!("{}.desise.json", vocabulary.name()));
        let json = fs::read_to_string(&path)?;
        let terms = VocabularyTerms::from_desise(&json)?;
        log::info!(
            "Loaded {} terms for {} from {}",
            terms.len(),
            vocabulary.uri(),
            path.display()
        );
        Ok(terms)
    }
}

/// Term checker for one vocabulary.
pub struct VocabularyChecker {
    vocabulary: Vocabulary,
    source: Arc<dyn VocabularySource>,
    full: OnceLock<Result<VocabularyTerms, String>>,
}

impl VocabularyChecker {
    /// Creates a checker that falls back to `source` on seed misses.
    pub fn new(vocabulary: Vocabulary, source: Arc<dyn VocabularySource>) -> Self {
        Self {
            vocabulary,
            source,
            full: OnceLock::new(),
        }
    }

    /// The vocabulary being checked.
    pub fn vocabulary(&self) -> Vocabulary {
        self.vocabulary
    }

    /// Checks one term.
    pub fn check(&self, term: &str) -> TermStatus {
        let (current, deprecated) = self.vocabulary.seed();
        if current.contains(&term) {
            return TermStatus::Known;
        }
        if deprecated.contains(&term) {
            return TermStatus::Deprecated;
        }

        let full = self.full.get_or_init(|| {
            self.source.load(self.vocabulary).map_err(|e| {
                log::warn!("Cannot load vocabulary {}: {}", self.vocabulary.uri(), e);
                e.to_string()
            })
        });
        match full {
            Ok(terms) => match terms.get(term) {
                Some(flags) if flags.deprecated => TermStatus::Deprecated,
                Some(flags) if flags.preliminary => TermStatus::Preliminary,
                Some(_) => TermStatus::Known,
                None => TermStatus::Unknown,
            },
            Err(e) => TermStatus::Unavailable(e.clone()),
        }
    }
}
