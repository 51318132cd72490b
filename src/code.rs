//! # Diagnostic codes and messages
//!
//! Every finding the linter makes is a [`Message`]: a severity [`Level`], a
//! stable three-character [`VotLintCode`], free text, and the document
//! position at which it was raised.
//!
//! The codes in [`codes`] are a versioned contract. Tools that filter or
//! count votlint output key on them, so the meaning of an existing code must
//! never change; new conditions get new codes.

use std::fmt;

use serde::Serialize;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// Purely advisory
    Info,
    /// Standards-questionable, but not a violation
    Warning,
    /// Standards violation
    Error,
}

impl Level {
    /// Upper-case label used in text output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable three-character identifier of a diagnostic condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct VotLintCode(&'static str);

impl VotLintCode {
    /// Creates a code. Fails to compile (in const context) unless the code
    /// is exactly three bytes long.
    pub const fn new(code: &'static str) -> Self {
        assert!(code.len() == 3, "votlint codes are three characters long");
        Self(code)
    }

    /// The code text.
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for VotLintCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Line/column location in the input document, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    /// Line number
    pub line: u64,
    /// Column number
    pub column: u64,
}

impl Position {
    /// Creates a position.
    pub fn new(line: u64, column: u64) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l.{}, c.{}", self.line, self.column)
    }
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Message {
    /// Severity
    pub level: Level,
    /// Stable condition code
    pub code: VotLintCode,
    /// Human-readable description
    pub text: String,
    /// Where in the document the condition was detected, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Message {
    /// Creates a message.
    pub fn new(
        level: Level,
        code: VotLintCode,
        text: impl Into<String>,
        position: Option<Position>,
    ) -> Self {
        Self {
            level,
            code,
            text: text.into(),
            position,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level)?;
        if let Some(position) = &self.position {
            write!(f, " ({})", position)?;
        }
        write!(f, ": {} [{}]", self.text, self.code)
    }
}

/// The stable code table.
pub mod codes {
    use super::VotLintCode;

    macro_rules! define_codes {
        ($($(#[$doc:meta])* $name:ident;)*) => {
            $(
                $(#[$doc])*
                pub const $name: VotLintCode = VotLintCode::new(stringify!($name));
            )*
        };
    }

    define_codes! {
        // XML layer
        /// XML parser warning, error or fatal error
        XML;
        /// Processing instruction ignored
        PIG;
        /// Entity reference that could not be resolved
        ENT;
        /// DOCTYPE names the DTD of another VOTable version
        DTV;
        /// DOCTYPE insertion heuristic was inconclusive
        DTI;

        // Document structure
        /// Element unknown at the VOTable version in effect
        ELU;
        /// Deprecated element
        DPE;
        /// Deprecated attribute
        DPA;
        /// Root element is not in a namespace
        NS0;
        /// Root element uses the namespace of another VOTable version
        NSV;
        /// Declared version differs from the version being checked
        VRM;
        /// Declared version is not a known VOTable version
        VRU;
        /// Validation abandoned after the error limit was reached
        ABT;

        // IDs and references
        /// ID value is not a legal XML ID
        IDS;
        /// Duplicate ID
        DID;
        /// ID defined but never referenced
        IDU;
        /// Reference to an element of a questionable type
        RFT;
        /// Reference to an ID that is never defined
        RFU;
        /// Duplicate FIELD name within a TABLE
        DNM;

        // Attribute syntax
        /// Bad UCD
        UCD;
        /// Questionable UCD
        UCW;
        /// Unit string problem
        VOU;
        /// Deprecated arraysize="1"
        AS1;
        /// Bad width attribute
        WID;
        /// Bad precision attribute
        PRC;
        /// Term not in the IVOA vocabulary
        VCU;
        /// Deprecated vocabulary term
        VCD;
        /// Preliminary vocabulary term
        VCP;
        /// Vocabulary could not be consulted
        VCX;

        // Column declarations
        /// No datatype
        DT0;
        /// Unknown datatype
        DTX;
        /// Character type without arraysize
        AR1;
        /// Bad arraysize
        ARB;
        /// Negative arraysize dimension
        DMN;
        /// Bad nrows attribute
        NRF;
        /// Declared nrows differs from rows seen
        NRM;
        /// TR cell count differs from FIELD count
        TRC;

        // xtype handling
        /// Non-DALI xtype
        XDL;
        /// Namespaced xtype, not checked
        XNI;
        /// timestamp xtype on a non-char column
        XTS;
        /// interval xtype with wrong arraysize
        XI2;
        /// interval xtype with wrong datatype
        XI9;
        /// point xtype with wrong arraysize
        XP2;
        /// point xtype with wrong datatype
        XP9;
        /// circle xtype with wrong arraysize
        XC3;
        /// circle xtype with wrong datatype
        XC9;
        /// polygon xtype on a non-vector arraysize
        XSV;
        /// polygon xtype with wrong datatype
        XS9;
        /// Bad timestamp value
        TSR;
        /// Some but not all geometry coordinates are NaN
        XIN;
        /// Infinite point coordinate
        XIZ;
        /// Odd number of polygon coordinates
        XSO;
        /// Too few polygon coordinates
        XSF;

        // Cell values
        /// Wrong element count in a fixed-size array
        E09;
        /// Variable array count not a multiple of the block size
        E08;
        /// Bad floating point value
        FP0;
        /// Bad integer value
        IT0;
        /// Bad hexadecimal integer value
        HX0;
        /// Integer value out of range
        BND;
        /// Empty integer cell not permitted at this version
        ETD;
        /// Bad boolean value
        TFX;
        /// Bad fixed-length bit vector
        BT0;
        /// Bad variable-length bit vector
        BV0;
        /// Wrong number of bits in a fixed-length bit vector
        CT9;
        /// Empty single-character value
        CH0;
        /// More than one character for a single-character column
        CH1;
        /// Non-ASCII character in char data
        CRU;
        /// Wrong number of characters in a character array
        C09;
        /// Negative element count in binary data
        MEL;
        /// End of stream inside a row
        EOF;

        // STREAM, BINARY, FITS
        /// STREAM in an element that does not accept one
        STP;
        /// Inline STREAM data not base64 encoded
        SEI;
        /// href could not be opened
        HRF;
        /// STREAM decoding failed
        SDE;
        /// STREAM consumer thread failure
        STH;
        /// Unknown STREAM encoding
        ENC;
        /// "dynamic" STREAM encoding, checks are weaker
        DYN;
        /// BINARY column without a usable parser
        BNP;
        /// TD encoding attribute problem
        TDE;
        /// Bad FITS extnum
        EXN;
        /// FITS read failure
        FTE;
        /// FITS column count differs from FIELD count
        FTC;
        /// FITS column type differs from FIELD declaration
        FTM;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_display() {
        let msg = Message::new(
            Level::Error,
            codes::DT0,
            "No datatype for FIELD",
            Some(Position::new(3, 5)),
        );
        assert_eq!(msg.to_string(), "ERROR (l.3, c.5): No datatype for FIELD [DT0]");

        let msg = Message::new(Level::Info, codes::PIG, "Ignoring PI", None);
        assert_eq!(msg.to_string(), "INFO: Ignoring PI [PIG]");
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Info < Level::Warning);
        assert!(Level::Warning < Level::Error);
    }

    #[test]
    fn test_message_json() {
        let msg = Message::new(Level::Warning, codes::UCW, "old UCD", Some(Position::new(1, 2)));
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"level":"WARNING","code":"UCW","text":"old UCD","position":{"line":1,"column":2}}"#
        );
    }
}
