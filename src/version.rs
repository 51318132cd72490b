//! VOTable version identifiers and the per-version facts that do not
//! belong in the element dispatch tables.

use std::fmt;
use std::str::FromStr;

/// A supported VOTable version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum VotableVersion {
    /// VOTable 1.0
    V1_0,
    /// VOTable 1.1
    V1_1,
    /// VOTable 1.2
    V1_2,
    /// VOTable 1.3
    V1_3,
    /// VOTable 1.4
    V1_4,
    /// VOTable 1.5
    #[default]
    V1_5,
}

/// Error returned when a version string names no supported version.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown VOTable version: {0}")]
pub struct UnknownVersion(pub String);

const NAMESPACE_BASE: &str = "http://www.ivoa.net/xml/VOTable/";

impl VotableVersion {
    /// All supported versions, oldest first.
    pub const ALL: [VotableVersion; 6] = [
        VotableVersion::V1_0,
        VotableVersion::V1_1,
        VotableVersion::V1_2,
        VotableVersion::V1_3,
        VotableVersion::V1_4,
        VotableVersion::V1_5,
    ];

    /// Version number as it appears in the `version` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            VotableVersion::V1_0 => "1.0",
            VotableVersion::V1_1 => "1.1",
            VotableVersion::V1_2 => "1.2",
            VotableVersion::V1_3 => "1.3",
            VotableVersion::V1_4 => "1.4",
            VotableVersion::V1_5 => "1.5",
        }
    }

    /// XML namespace the VOTABLE element should carry; 1.0 has none.
    /// Versions after 1.3 reuse the 1.3 namespace.
    pub fn xml_namespace(&self) -> Option<&'static str> {
        match self {
            VotableVersion::V1_0 => None,
            VotableVersion::V1_1 => Some("http://www.ivoa.net/xml/VOTable/v1.1"),
            VotableVersion::V1_2 => Some("http://www.ivoa.net/xml/VOTable/v1.2"),
            VotableVersion::V1_3 | VotableVersion::V1_4 | VotableVersion::V1_5 => {
                Some("http://www.ivoa.net/xml/VOTable/v1.3")
            }
        }
    }

    /// True if `uri` is the namespace of some VOTable version.
    pub fn is_votable_namespace(uri: &str) -> bool {
        uri.starts_with(NAMESPACE_BASE) || uri == "http://www.ivoa.net/xml/VOTable"
    }

    /// Oldest version using the given namespace URI.
    pub fn from_namespace(uri: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.xml_namespace() == Some(uri))
    }

    /// Version named by a schemaLocation value such as
    /// `"http://www.ivoa.net/xml/VOTable/v1.3 http://www.ivoa.net/xml/VOTable/VOTable-1.4.xsd"`.
    ///
    /// An explicit schema file name wins over a namespace token.
    pub fn from_schema_location(location: &str) -> Option<Self> {
        let tokens: Vec<&str> = location.split_whitespace().collect();
        let from_xsd = tokens.iter().find_map(|token| {
            let start = token.rfind("VOTable-")? + "VOTable-".len();
            let rest = &token[start..];
            let end = rest.find(".xsd")?;
            rest[..end].parse().ok()
        });
        from_xsd.or_else(|| tokens.iter().find_map(|token| Self::from_namespace(token)))
    }

    /// System identifier of the DTD bundled for this version.
    pub fn dtd_system_id(&self) -> String {
        format!("http://www.ivoa.net/xml/VOTable/VOTable-{}.dtd", self.as_str())
    }

    /// Version whose bundled DTD has the given system identifier.
    pub fn from_dtd_system_id(system_id: &str) -> Option<Self> {
        if system_id == "http://us-vo.org/xml/VOTable.dtd" {
            return Some(VotableVersion::V1_0);
        }
        Self::ALL
            .into_iter()
            .find(|v| system_id.ends_with(&format!("VOTable-{}.dtd", v.as_str())))
    }

    /// Empty TD elements for integer columns were only legalised in 1.3.
    pub fn allow_empty_td(&self) -> bool {
        *self >= VotableVersion::V1_3
    }

    /// BINARY2 serialization exists from 1.3.
    pub fn supports_binary2(&self) -> bool {
        *self >= VotableVersion::V1_3
    }

    /// TD `encoding` attribute was removed in 1.3.
    pub fn allows_td_encoding(&self) -> bool {
        *self <= VotableVersion::V1_2
    }

    /// The newest supported version.
    pub fn latest() -> Self {
        VotableVersion::V1_5
    }
}

impl fmt::Display for VotableVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for VotableVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for VotableVersion {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == trimmed)
            .ok_or_else(|| UnknownVersion(trimmed.to_string()))
    }
}
