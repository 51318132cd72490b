//! UCD classification.
//!
//! A UCD1+ string is a `;`-separated list of words, each word a `.`-separated
//! list of atoms. Words carry a syntax flag in the IVOA word list that says
//! where in the list they may appear:
//!
//! - `P`: primary only, must be the first word
//! - `S`: secondary only, must not be first
//! - `Q`, `E`, `C`, `V`: either position
//!
//! Strings from the legacy UCD1 standard (`POS_EQ_RA_MAIN`) are recognised
//! from a list and classified separately, before UCD1+ syntax is applied.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::code::Level;
use crate::error::LintError;

/// Classification of a UCD string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UcdStatus {
    /// Legal UCD1+
    Ok,
    /// A UCD1 string, not UCD1+
    Ucd1,
    /// Contains a deprecated word, with its replacement if known
    Deprecated {
        /// The deprecated word
        word: String,
        /// Suggested replacement
        replacement: Option<String>,
    },
    /// Contains a word that is not in the word list
    UnknownWord(String),
    /// Not UCD syntax at all
    BadSyntax(String),
    /// Words in an illegal order
    BadSequence(String),
}

impl UcdStatus {
    /// Severity with which this status is reported; `None` for [`UcdStatus::Ok`].
    pub fn level(&self) -> Option<Level> {
        match self {
            UcdStatus::Ok => None,
            UcdStatus::Ucd1 | UcdStatus::Deprecated { .. } | UcdStatus::UnknownWord(_) => {
                Some(Level::Warning)
            }
            UcdStatus::BadSyntax(_) | UcdStatus::BadSequence(_) => Some(Level::Error),
        }
    }

    /// Human-readable description of the problem.
    pub fn describe(&self, ucd: &str) -> String {
        match self {
            UcdStatus::Ok => format!("UCD \"{}\" is legal", ucd),
            UcdStatus::Ucd1 => format!("UCD \"{}\" is UCD1, not UCD1+", ucd),
            UcdStatus::Deprecated { word, replacement } => match replacement {
                Some(new) => format!(
                    "UCD \"{}\" uses deprecated word \"{}\" (use \"{}\")",
                    ucd, word, new
                ),
                None => format!("UCD \"{}\" uses deprecated word \"{}\"", ucd, word),
            },
            UcdStatus::UnknownWord(word) => {
                format!("UCD \"{}\" contains unknown word \"{}\"", ucd, word)
            }
            UcdStatus::BadSyntax(why) => format!("Bad UCD syntax \"{}\": {}", ucd, why),
            UcdStatus::BadSequence(why) => format!("Bad UCD word sequence \"{}\": {}", ucd, why),
        }
    }
}

/// Something that can classify UCD strings.
pub trait UcdClassifier: Send + Sync {
    /// Classifies one UCD.
    fn classify(&self, ucd: &str) -> UcdStatus;
}

/// Position rule for a UCD1+ word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordFlag {
    /// May only be the first word
    Primary,
    /// May not be the first word
    Secondary,
    /// May appear anywhere
    Either,
}

impl WordFlag {
    fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'P' => Some(WordFlag::Primary),
            'S' => Some(WordFlag::Secondary),
            'Q' | 'E' | 'C' | 'V' => Some(WordFlag::Either),
            _ => None,
        }
    }
}

const SEED_WORDS: &[(&str, char)] = &[
    ("arith.diff", 'P'),
    ("arith.ratio", 'P'),
    ("arith.sum", 'P'),
    ("em.energy", 'Q'),
    ("em.freq", 'Q'),
    ("em.wl", 'Q'),
    ("em.wl.central", 'Q'),
    ("em.opt", 'S'),
    ("em.opt.U", 'S'),
    ("em.opt.B", 'S'),
    ("em.opt.V", 'S'),
    ("em.opt.R", 'S'),
    ("em.opt.I", 'S'),
    ("em.IR", 'S'),
    ("em.IR.J", 'S'),
    ("em.IR.H", 'S'),
    ("em.IR.K", 'S'),
    ("em.radio", 'S'),
    ("em.X-ray", 'S'),
    ("instr.filter", 'Q'),
    ("instr.setup", 'Q'),
    ("meta.bib.bibcode", 'Q'),
    ("meta.code", 'Q'),
    ("meta.code.class", 'Q'),
    ("meta.code.error", 'Q'),
    ("meta.code.qual", 'Q'),
    ("meta.id", 'Q'),
    ("meta.id.cross", 'Q'),
    ("meta.main", 'S'),
    ("meta.note", 'Q'),
    ("meta.number", 'Q'),
    ("meta.record", 'Q'),
    ("meta.ref", 'Q'),
    ("meta.ref.uri", 'Q'),
    ("meta.ref.url", 'Q'),
    ("meta.title", 'Q'),
    ("meta.ucd", 'Q'),
    ("meta.unit", 'Q'),
    ("obs.field", 'S'),
    ("obs.exposure", 'Q'),
    ("phot.color", 'C'),
    ("phot.count", 'Q'),
    ("phot.flux", 'Q'),
    ("phot.flux.density", 'Q'),
    ("phot.mag", 'E'),
    ("phys.temperature", 'Q'),
    ("phys.mass", 'Q'),
    ("pos.angDistance", 'Q'),
    ("pos.distance", 'Q'),
    ("pos.eq", 'Q'),
    ("pos.eq.dec", 'Q'),
    ("pos.eq.ra", 'Q'),
    ("pos.errorEllipse", 'Q'),
    ("pos.frame", 'Q'),
    ("pos.galactic.lat", 'Q'),
    ("pos.galactic.lon", 'Q'),
    ("pos.parallax", 'Q'),
    ("pos.parallax.trig", 'Q'),
    ("pos.pm", 'Q'),
    ("pos.posAng", 'Q'),
    ("spect.dopplerVeloc", 'Q'),
    ("spect.dopplerVeloc.opt", 'Q'),
    ("src.class", 'Q'),
    ("src.morph.type", 'Q'),
    ("src.redshift", 'Q'),
    ("src.spType", 'Q'),
    ("stat.error", 'P'),
    ("stat.error.sys", 'P'),
    ("stat.max", 'P'),
    ("stat.mean", 'P'),
    ("stat.median", 'P'),
    ("stat.min", 'P'),
    ("stat.stdev", 'P'),
    ("stat.value", 'Q'),
    ("time.end", 'Q'),
    ("time.epoch", 'Q'),
    ("time.start", 'Q'),
];

const UCD1_WORDS: &[&str] = &[
    "CODE_MISC",
    "CODE_QUALITY",
    "DATA_LINK",
    "ERROR",
    "ID_ALTERNATIVE",
    "ID_CATALOG",
    "ID_IDENTIFIER",
    "ID_MAIN",
    "INST_ID",
    "NOTE",
    "OBS_ID",
    "PHOT_FLUX_DENSITY",
    "PHOT_JHN_B",
    "PHOT_JHN_V",
    "PHOT_MAG_B",
    "PHOT_MAG_V",
    "POS_EQ_DEC_MAIN",
    "POS_EQ_PMDEC",
    "POS_EQ_PMRA",
    "POS_EQ_RA_MAIN",
    "POS_GAL_LAT",
    "POS_GAL_LON",
    "POS_PARLX_TRIG",
    "RECORD",
    "REDSHIFT_HC",
    "SPECT_TYPE_MK",
    "TIME_EPOCH",
    "VELOC_HC",
];

/// UCD classifier backed by word lists.
///
/// Without a loaded word list only the seed vocabulary is known, and words
/// outside it are accepted unchecked. Once the full IVOA list is loaded,
/// unknown words are reported.
pub struct BuiltinUcdClassifier {
    words: HashMap<String, WordFlag>,
    deprecated: HashMap<String, Option<String>>,
    ucd1: HashSet<&'static str>,
    complete: bool,
}

impl Default for BuiltinUcdClassifier {
    fn default() -> Self {
        let words = SEED_WORDS
            .iter()
            .filter_map(|(word, code)| Some((word.to_ascii_lowercase(), WordFlag::from_code(*code)?)))
            .collect();
        Self {
            words,
            deprecated: HashMap::new(),
            ucd1: UCD1_WORDS.iter().copied().collect(),
            complete: false,
        }
    }
}

impl BuiltinUcdClassifier {
    /// Classifier using only the seed vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the word list with the contents of an IVOA `ucd-list.txt`.
    pub fn load_word_list(&mut self, path: &Path) -> Result<(), LintError> {
        let text = fs::read_to_string(path)?;
        self.set_word_list(&text)
            .map_err(|e| LintError::ServiceError(format!("{}: {}", path.display(), e)))
    }

    /// Replaces the word list from text in `FLAG | word | description` form.
    pub fn set_word_list(&mut self, text: &str) -> Result<(), String> {
        let mut words = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields: Vec<&str> = if line.contains('|') {
                line.split('|').map(str::trim).collect()
            } else {
                line.split_whitespace().collect()
            };
            fields.truncate(2);
            let [flag, word] = &fields[..] else {
                return Err(format!("line {}: expected flag and word", lineno + 1));
            };
            let flag = flag
                .chars()
                .next()
                .and_then(WordFlag::from_code)
                .ok_or_else(|| format!("line {}: bad syntax flag \"{}\"", lineno + 1, flag))?;
            words.insert(word.to_ascii_lowercase(), flag);
        }
        if words.is_empty() {
            return Err("no UCD words found".to_string());
        }
        self.words = words;
        self.complete = true;
        Ok(())
    }

    /// Adds deprecated words from a file: first token of each line is the
    /// deprecated word, an optional second token its replacement.
    pub fn load_deprecated_list(&mut self, path: &Path) -> Result<(), LintError> {
        let text = fs::read_to_string(path)?;
        self.add_deprecated(&text);
        Ok(())
    }

    /// Adds deprecated words from text.
    pub fn add_deprecated(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line
                .split(|c: char| c == '|' || c.is_whitespace())
                .filter(|t| !t.is_empty());
            if let Some(old) = tokens.next() {
                let new = tokens.next().map(str::to_string);
                self.deprecated.insert(old.to_ascii_lowercase(), new);
            }
        }
    }

    /// True if a full word list has been loaded.
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

impl UcdClassifier for BuiltinUcdClassifier {
    fn classify(&self, ucd: &str) -> UcdStatus {
        let ucd = ucd.trim();
        if ucd.is_empty() {
            return UcdStatus::BadSyntax("empty UCD".to_string());
        }
        if self.ucd1.contains(ucd.to_ascii_uppercase().as_str()) {
            return UcdStatus::Ucd1;
        }

        let words: Vec<&str> = ucd.split(';').map(str::trim).collect();
        for word in &words {
            if let Err(why) = check_word_syntax(word) {
                return UcdStatus::BadSyntax(why);
            }
        }

        let mut warning = None;
        for (index, word) in words.iter().enumerate() {
            if is_foreign_namespace(word) {
                continue;
            }
            let key = strip_ivoa_prefix(word).to_ascii_lowercase();
            match self.words.get(&key) {
                Some(WordFlag::Primary) if index > 0 => {
                    return UcdStatus::BadSequence(format!(
                        "primary word \"{}\" not in first position",
                        word
                    ));
                }
                Some(WordFlag::Secondary) if index == 0 => {
                    return UcdStatus::BadSequence(format!(
                        "secondary word \"{}\" in first position",
                        word
                    ));
                }
                Some(_) => {}
                None if self.complete && warning.is_none() && !self.deprecated.contains_key(&key) => {
                    warning = Some(UcdStatus::UnknownWord(word.to_string()));
                }
                None => {}
            }
            if warning.is_none() {
                if let Some(replacement) = self.deprecated.get(&key) {
                    warning = Some(UcdStatus::Deprecated {
                        word: word.to_string(),
                        replacement: replacement.clone(),
                    });
                }
            }
        }
        warning.unwrap_or(UcdStatus::Ok)
    }
}

fn check_word_syntax(word: &str) -> Result<(), String> {
    if word.is_empty() {
        return Err("empty word".to_string());
    }
    let body = match word.split_once(':') {
        Some((ns, body)) => {
            if ns.is_empty() || !ns.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(format!("bad namespace prefix in \"{}\"", word));
            }
            body
        }
        None => word,
    };
    for atom in body.split('.') {
        if atom.is_empty() {
            return Err(format!("empty atom in \"{}\"", word));
        }
        if let Some(c) = atom
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(format!("illegal character '{}' in \"{}\"", c, word));
        }
    }
    Ok(())
}

fn strip_ivoa_prefix(word: &str) -> &str {
    match word.split_once(':') {
        Some((ns, body)) if ns.eq_ignore_ascii_case("ivoa") => body,
        _ => word,
    }
}

fn is_foreign_namespace(word: &str) -> bool {
    matches!(word.split_once(':'), Some((ns, _)) if !ns.eq_ignore_ascii_case("ivoa"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_ucds() {
        let c = BuiltinUcdClassifier::new();
        assert_eq!(c.classify("pos.eq.ra;meta.main"), UcdStatus::Ok);
        assert_eq!(c.classify("stat.error;phot.mag;em.opt.V"), UcdStatus::Ok);
        assert_eq!(c.classify(" phot.mag "), UcdStatus::Ok);
        assert_eq!(c.classify("ivoa:pos.eq.ra"), UcdStatus::Ok);
        // unknown words pass without a full list
        assert_eq!(c.classify("custom.word"), UcdStatus::Ok);
    }

    #[test]
    fn test_ucd1_takes_precedence() {
        let c = BuiltinUcdClassifier::new();
        assert_eq!(c.classify("POS_EQ_RA_MAIN"), UcdStatus::Ucd1);
        assert_eq!(c.classify("id_main"), UcdStatus::Ucd1);
        assert_eq!(UcdStatus::Ucd1.level(), Some(Level::Warning));
    }

    #[test]
    fn test_bad_syntax() {
        let c = BuiltinUcdClassifier::new();
        assert!(matches!(c.classify(""), UcdStatus::BadSyntax(_)));
        assert!(matches!(c.classify("pos..ra"), UcdStatus::BadSyntax(_)));
        assert!(matches!(c.classify("pos.eq.ra;"), UcdStatus::BadSyntax(_)));
        assert!(matches!(c.classify("pos eq"), UcdStatus::BadSyntax(_)));
        assert_eq!(
            UcdStatus::BadSyntax(String::new()).level(),
            Some(Level::Error)
        );
    }

    #[test]
    fn test_bad_sequence() {
        let c = BuiltinUcdClassifier::new();
        assert!(matches!(c.classify("meta.main"), UcdStatus::BadSequence(_)));
        assert!(matches!(c.classify("phot.mag;stat.error"), UcdStatus::BadSequence(_)));
    }

    #[test]
    fn test_deprecated_word() {
        let mut c = BuiltinUcdClassifier::new();
        c.add_deprecated("old.word new.word\n# comment\n");
        assert_eq!(
            c.classify("old.word"),
            UcdStatus::Deprecated {
                word: "old.word".to_string(),
                replacement: Some("new.word".to_string()),
            }
        );
    }

    #[test]
    fn test_full_word_list() {
        let mut c = BuiltinUcdClassifier::new();
        c.set_word_list("Q | pos.eq.ra | Right ascension\nS | meta.main | Main value\n")
            .unwrap();
        assert!(c.is_complete());
        assert_eq!(c.classify("pos.eq.ra;meta.main"), UcdStatus::Ok);
        assert_eq!(
            c.classify("pos.eq.dec"),
            UcdStatus::UnknownWord("pos.eq.dec".to_string())
        );
        assert!(c.set_word_list("# nothing\n").is_err());
        assert!(c.set_word_list("X | foo | bad flag").is_err());
    }
}
