//! # Per-version dispatch tables
//!
//! A [`VersionDetail`] answers two questions for one VOTable version: which
//! handler an element gets, and which checkers its attributes get.
//!
//! The tables are built once per process. Each version starts as a copy of
//! the previous one and applies its own additions and overrides:
//!
//! | Version | Changes |
//! |---------|---------|
//! | 1.0 | base element set, ID/ref/ucd/unit/width/precision checks |
//! | 1.1 | GROUP, FIELDref, PARAMref; typed `ref` checks; DEFINITIONS deprecated |
//! | 1.2 | COOSYS deprecated; FIELD/PARAM `type` deprecated; INFO ucd/unit |
//! | 1.3 | BINARY2; COOSYS restored; `arraysize="1"` deprecated |
//! | 1.4 | TIMESYS with vocabulary checks |
//! | 1.5 | COOSYS `system`/`refposition` vocabulary checks |
//!
//! Attribute rules are either generic (any element) or bound to one tag; a
//! tag rule wins over a generic rule for the same attribute. The resulting
//! per-tag maps are memoized on first use.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::attribute::vocab::Vocabulary;
use crate::attribute::{AttributeChecker, RefChecker};
use crate::handler::Handler;
use crate::version::VotableVersion;

/// Attribute name to checker, for one element type.
pub type CheckerMap = HashMap<&'static str, AttributeChecker>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttributeRule {
    tag: Option<&'static str>,
    attribute: &'static str,
    checker: AttributeChecker,
}

const ELEMENTS_1_0: &[&str] = &[
    "VOTABLE",
    "RESOURCE",
    "DESCRIPTION",
    "DEFINITIONS",
    "COOSYS",
    "PARAM",
    "INFO",
    "LINK",
    "TABLE",
    "FIELD",
    "VALUES",
    "MIN",
    "MAX",
    "OPTION",
    "DATA",
    "TABLEDATA",
    "TR",
    "TD",
    "BINARY",
    "FITS",
    "STREAM",
];

const SYSTEM_TARGETS: RefChecker = RefChecker::new(&["COOSYS", "GROUP", "TIMESYS"]);

/// Mutable table set used while the versions are being derived.
#[derive(Debug, Clone, Default)]
struct Tables {
    elements: HashSet<&'static str>,
    deprecated: HashSet<&'static str>,
    rules: Vec<AttributeRule>,
}

impl Tables {
    fn add_elements(&mut self, names: &[&'static str]) -> &mut Self {
        self.elements.extend(names.iter().copied());
        self
    }

    fn deprecate(&mut self, name: &'static str) -> &mut Self {
        self.deprecated.insert(name);
        self
    }

    fn undeprecate(&mut self, name: &'static str) -> &mut Self {
        self.deprecated.remove(name);
        self
    }

    /// Adds a rule, replacing any rule for the same tag and attribute.
    fn rule(
        &mut self,
        tag: Option<&'static str>,
        attribute: &'static str,
        checker: AttributeChecker,
    ) -> &mut Self {
        self.rules
            .retain(|r| !(r.tag == tag && r.attribute == attribute));
        self.rules.push(AttributeRule {
            tag,
            attribute,
            checker,
        });
        self
    }

    fn tag_rule(
        &mut self,
        tags: &[&'static str],
        attribute: &'static str,
        checker: AttributeChecker,
    ) -> &mut Self {
        for tag in tags {
            self.rule(Some(*tag), attribute, checker);
        }
        self
    }
}

fn tables_1_0() -> Tables {
    let mut t = Tables::default();
    t.add_elements(ELEMENTS_1_0)
        .rule(None, "ID", AttributeChecker::Id)
        .rule(None, "ref", AttributeChecker::Ref(RefChecker::ANY))
        .tag_rule(&["FIELD", "PARAM"], "ucd", AttributeChecker::Ucd)
        .tag_rule(&["FIELD", "PARAM"], "unit", AttributeChecker::Unit)
        .tag_rule(&["FIELD", "PARAM"], "width", AttributeChecker::Width)
        .tag_rule(&["FIELD", "PARAM"], "precision", AttributeChecker::Precision)
        .tag_rule(&["FIELD"], "name", AttributeChecker::UniqueName)
        .tag_rule(&["TABLE"], "ref", AttributeChecker::Ref(RefChecker::new(&["TABLE"])))
        .tag_rule(&["VALUES"], "ref", AttributeChecker::Ref(RefChecker::new(&["VALUES"])))
        .tag_rule(&["VOTABLE"], "version", AttributeChecker::Version);
    t
}

fn patch_1_1(t: &mut Tables) {
    t.add_elements(&["GROUP", "FIELDref", "PARAMref"])
        .deprecate("DEFINITIONS")
        .tag_rule(&["FIELD", "PARAM"], "ref", AttributeChecker::Ref(SYSTEM_TARGETS))
        .tag_rule(&["GROUP"], "ref", AttributeChecker::Ref(SYSTEM_TARGETS))
        .tag_rule(&["GROUP"], "ucd", AttributeChecker::Ucd)
        .tag_rule(&["FIELDref"], "ref", AttributeChecker::Ref(RefChecker::new(&["FIELD"])))
        .tag_rule(&["PARAMref"], "ref", AttributeChecker::Ref(RefChecker::new(&["PARAM"])));
}

fn patch_1_2(t: &mut Tables) {
    t.deprecate("COOSYS")
        .tag_rule(&["FIELD", "PARAM"], "type", AttributeChecker::Deprecated)
        .tag_rule(&["INFO"], "ucd", AttributeChecker::Ucd)
        .tag_rule(&["INFO"], "unit", AttributeChecker::Unit);
}

fn patch_1_3(t: &mut Tables) {
    t.add_elements(&["BINARY2"])
        .undeprecate("COOSYS")
        .tag_rule(
            &["FIELD", "PARAM"],
            "arraysize",
            AttributeChecker::ArraysizeDeprecation,
        );
}

fn patch_1_4(t: &mut Tables) {
    t.add_elements(&["TIMESYS"])
        .tag_rule(
            &["TIMESYS"],
            "timescale",
            AttributeChecker::Vocabulary(Vocabulary::TimeScale),
        )
        .tag_rule(
            &["TIMESYS"],
            "refposition",
            AttributeChecker::Vocabulary(Vocabulary::RefPosition),
        );
}

fn patch_1_5(t: &mut Tables) {
    t.tag_rule(
        &["COOSYS"],
        "system",
        AttributeChecker::Vocabulary(Vocabulary::RefFrame),
    )
    .tag_rule(
        &["COOSYS"],
        "refposition",
        AttributeChecker::Vocabulary(Vocabulary::RefPosition),
    );
}

/// Element and attribute rules for one VOTable version.
#[derive(Debug)]
pub struct VersionDetail {
    version: Option<VotableVersion>,
    tables: Tables,
    memo: Mutex<HashMap<String, Arc<CheckerMap>>>,
}

static DETAILS: OnceLock<Vec<VersionDetail>> = OnceLock::new();
static PERMISSIVE: OnceLock<VersionDetail> = OnceLock::new();

impl VersionDetail {
    fn new(version: Option<VotableVersion>, tables: Tables) -> Self {
        Self {
            version,
            tables,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// The tables for a supported version.
    pub fn for_version(version: VotableVersion) -> &'static VersionDetail {
        let details = DETAILS.get_or_init(|| {
            let patches: [fn(&mut Tables); 5] =
                [patch_1_1, patch_1_2, patch_1_3, patch_1_4, patch_1_5];
            let mut tables = tables_1_0();
            let mut details = vec![VersionDetail::new(Some(VotableVersion::V1_0), tables.clone())];
            for (patch, version) in patches.iter().zip(&VotableVersion::ALL[1..]) {
                patch(&mut tables);
                details.push(VersionDetail::new(Some(*version), tables.clone()));
            }
            details
        });
        &details[version as usize]
    }

    /// Tables for a version the linter does not know: every element is
    /// accepted and no attribute is checked.
    pub fn permissive() -> &'static VersionDetail {
        PERMISSIVE.get_or_init(|| VersionDetail::new(None, Tables::default()))
    }

    /// The tables for `version`, or the permissive ones for `None`.
    pub fn for_target(version: Option<VotableVersion>) -> &'static VersionDetail {
        match version {
            Some(v) => Self::for_version(v),
            None => Self::permissive(),
        }
    }

    /// Version these tables describe; `None` when permissive.
    pub fn version(&self) -> Option<VotableVersion> {
        self.version
    }

    /// True if `tag` is an element of this version.
    pub fn is_known_element(&self, tag: &str) -> bool {
        self.version.is_none() || self.tables.elements.contains(tag)
    }

    /// True if `tag` is deprecated at this version.
    pub fn is_deprecated(&self, tag: &str) -> bool {
        self.tables.deprecated.contains(tag)
    }

    /// Handler for an element, or `None` if the element does not exist at
    /// this version.
    pub fn create_element_handler(&self, tag: &str) -> Option<Handler> {
        if self.is_known_element(tag) {
            Some(Handler::for_element(tag))
        } else {
            None
        }
    }

    /// Checkers for the attributes of `tag`, computed on first request.
    pub fn attribute_checkers(&self, tag: &str) -> Arc<CheckerMap> {
        let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(map) = memo.get(tag) {
            return Arc::clone(map);
        }
        let mut map = CheckerMap::new();
        for rule in self.tables.rules.iter().filter(|r| r.tag.is_none()) {
            map.insert(rule.attribute, rule.checker);
        }
        for rule in self.tables.rules.iter().filter(|r| r.tag == Some(tag)) {
            map.insert(rule.attribute, rule.checker);
        }
        log::debug!(
            "attribute checkers for {} at {:?}: {}",
            tag,
            self.version,
            map.len()
        );
        let map = Arc::new(map);
        memo.insert(tag.to_string(), Arc::clone(&map));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOT_VOTABLE: &[&str] = &["HTML", "COLUMN", "votable", "Field", ""];

    #[test]
    fn test_handlers_for_every_version() {
        for version in VotableVersion::ALL {
            let detail = VersionDetail::for_version(version);
            assert_eq!(detail.version(), Some(version));
            for tag in ELEMENTS_1_0 {
                assert!(detail.create_element_handler(tag).is_some(), "{} {}", version, tag);
            }
            for tag in NOT_VOTABLE {
                assert!(detail.create_element_handler(tag).is_none(), "{} {}", version, tag);
            }
        }
    }

    #[test]
    fn test_elements_added_by_version() {
        let at = |v, tag| VersionDetail::for_version(v).is_known_element(tag);
        assert!(!at(VotableVersion::V1_0, "GROUP"));
        assert!(at(VotableVersion::V1_1, "GROUP"));
        assert!(at(VotableVersion::V1_1, "PARAMref"));
        assert!(!at(VotableVersion::V1_2, "BINARY2"));
        assert!(at(VotableVersion::V1_3, "BINARY2"));
        assert!(!at(VotableVersion::V1_3, "TIMESYS"));
        assert!(at(VotableVersion::V1_5, "TIMESYS"));
        assert!(VersionDetail::permissive().is_known_element("ANYTHING"));
    }

    #[test]
    fn test_deprecations() {
        let v = VersionDetail::for_version;
        assert!(!v(VotableVersion::V1_0).is_deprecated("DEFINITIONS"));
        assert!(v(VotableVersion::V1_1).is_deprecated("DEFINITIONS"));
        assert!(v(VotableVersion::V1_2).is_deprecated("COOSYS"));
        assert!(!v(VotableVersion::V1_3).is_deprecated("COOSYS"));
    }

    #[test]
    fn test_attribute_rules() {
        let field_1_0 = VersionDetail::for_version(VotableVersion::V1_0).attribute_checkers("FIELD");
        assert_eq!(field_1_0.get("ref"), Some(&AttributeChecker::Ref(RefChecker::ANY)));
        assert!(field_1_0.get("arraysize").is_none());
        assert_eq!(field_1_0.get("ID"), Some(&AttributeChecker::Id));

        let field_1_3 = VersionDetail::for_version(VotableVersion::V1_3).attribute_checkers("FIELD");
        assert_eq!(field_1_3.get("ref"), Some(&AttributeChecker::Ref(SYSTEM_TARGETS)));
        assert_eq!(
            field_1_3.get("arraysize"),
            Some(&AttributeChecker::ArraysizeDeprecation)
        );

        let coosys = |v| VersionDetail::for_version(v).attribute_checkers("COOSYS");
        assert!(coosys(VotableVersion::V1_4).get("system").is_none());
        assert_eq!(
            coosys(VotableVersion::V1_5).get("system"),
            Some(&AttributeChecker::Vocabulary(Vocabulary::RefFrame))
        );

        assert!(VersionDetail::permissive().attribute_checkers("FIELD").is_empty());
    }

    #[test]
    fn test_checkers_memoized() {
        let detail = VersionDetail::for_version(VotableVersion::V1_4);
        let a = detail.attribute_checkers("PARAM");
        let b = detail.attribute_checkers("PARAM");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
