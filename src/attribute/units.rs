//! VOUnits checking.
//!
//! Unit strings are parsed with a small recursive-descent parser for the
//! IVOA VOUnits syntax:
//!
//! ```text
//! input      := [scale] product
//! product    := expression ('.' expression)* ['/' expression]
//! expression := '(' product ')' [power]
//!             | function '(' product ')'
//!             | "'" name "'" [power]
//!             | unit [power]
//! power      := '**' (integer | '(' number ['/' integer] ')')
//! ```
//!
//! Each unit symbol is then looked up in the table of recognised units,
//! allowing SI prefixes on prefixable units and binary prefixes on bit/byte.

use crate::code::Level;

/// Classification of a unit string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// Recognised VOUnits string
    Ok,
    /// Contains whitespace
    Whitespace,
    /// Syntactically fine but uses a unit that is not recognised
    UnknownUnit(String),
    /// Uses a deprecated unit
    Deprecated(String),
    /// Uses a recognised unit illegally, e.g. a prefix on `deg`
    UsageViolation(String),
    /// Not VOUnits syntax
    BadSyntax(String),
}

impl UnitStatus {
    /// Severity with which this status is reported. VOUnits conformance
    /// is advisory, so every problem is a warning.
    pub fn level(&self) -> Option<Level> {
        match self {
            UnitStatus::Ok => None,
            _ => Some(Level::Warning),
        }
    }

    /// Human-readable description of the problem.
    pub fn describe(&self, unit: &str) -> String {
        match self {
            UnitStatus::Ok => format!("Unit \"{}\" is legal", unit),
            UnitStatus::Whitespace => format!("Unit \"{}\" contains whitespace", unit),
            UnitStatus::UnknownUnit(sym) => {
                format!("Unit \"{}\" uses unrecognised unit \"{}\"", unit, sym)
            }
            UnitStatus::Deprecated(sym) => {
                format!("Unit \"{}\" uses deprecated unit \"{}\"", unit, sym)
            }
            UnitStatus::UsageViolation(why) => format!("Unit \"{}\": {}", unit, why),
            UnitStatus::BadSyntax(why) => format!("Bad unit syntax \"{}\": {}", unit, why),
        }
    }
}

/// Something that can classify unit strings.
pub trait UnitClassifier: Send + Sync {
    /// Classifies one unit string.
    fn classify(&self, unit: &str) -> UnitStatus;
}

/// Built-in VOUnits classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct VoUnitsClassifier;

// (symbol, takes SI prefixes)
const KNOWN_UNITS: &[(&str, bool)] = &[
    ("m", true),
    ("s", true),
    ("g", true),
    ("rad", true),
    ("sr", true),
    ("K", true),
    ("A", true),
    ("mol", true),
    ("cd", true),
    ("Hz", true),
    ("J", true),
    ("W", true),
    ("V", true),
    ("N", true),
    ("Pa", true),
    ("C", true),
    ("Ohm", true),
    ("S", true),
    ("F", true),
    ("Wb", true),
    ("T", true),
    ("H", true),
    ("lm", true),
    ("lx", true),
    ("deg", false),
    ("arcmin", false),
    ("arcsec", true),
    ("mas", false),
    ("h", false),
    ("min", false),
    ("d", false),
    ("a", true),
    ("yr", true),
    ("eV", true),
    ("erg", true),
    ("Ry", true),
    ("solMass", true),
    ("solLum", true),
    ("solRad", true),
    ("AU", false),
    ("au", false),
    ("pc", true),
    ("lyr", true),
    ("ct", true),
    ("count", true),
    ("photon", true),
    ("ph", true),
    ("Jy", true),
    ("mag", true),
    ("R", true),
    ("G", true),
    ("D", true),
    ("Sun", true),
    ("chan", true),
    ("bin", true),
    ("voxel", true),
    ("pix", true),
    ("pixel", true),
    ("barn", true),
    ("beam", true),
    ("bit", true),
    ("byte", true),
    ("B", true),
    ("adu", true),
    ("u", true),
    ("Da", true),
    ("dB", false),
    ("%", false),
    ("Angstrom", false),
    ("angstrom", false),
];

const DEPRECATED_UNITS: &[&str] = &["Angstrom", "angstrom"];

const SI_PREFIXES: &[&str] = &[
    "da", "y", "z", "a", "f", "p", "n", "u", "m", "c", "d", "h", "k", "M", "G", "T", "P", "E",
    "Z", "Y",
];

const BINARY_PREFIXES: &[&str] = &["Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi", "Yi"];

const BINARY_UNITS: &[&str] = &["bit", "byte", "B"];

const FUNCTIONS: &[&str] = &[
    "log", "ln", "exp", "sqrt", "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh",
    "tanh",
];

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SymbolStatus {
    Known,
    Deprecated,
    Unknown,
    Misused(String),
}

fn lookup(symbol: &str) -> Option<bool> {
    KNOWN_UNITS
        .iter()
        .find(|(name, _)| *name == symbol)
        .map(|(_, prefixable)| *prefixable)
}

fn classify_symbol(symbol: &str) -> SymbolStatus {
    let base_status = |base: &str| {
        if DEPRECATED_UNITS.contains(&base) {
            SymbolStatus::Deprecated
        } else {
            SymbolStatus::Known
        }
    };

    if lookup(symbol).is_some() {
        return base_status(symbol);
    }

    for prefix in BINARY_PREFIXES {
        if let Some(rest) = symbol.strip_prefix(prefix) {
            if BINARY_UNITS.contains(&rest) {
                return SymbolStatus::Known;
            }
            if lookup(rest).is_some() {
                return SymbolStatus::Misused(format!(
                    "binary prefix \"{}\" only applies to bit and byte",
                    prefix
                ));
            }
        }
    }

    for prefix in SI_PREFIXES {
        if let Some(rest) = symbol.strip_prefix(prefix) {
            match lookup(rest) {
                Some(true) => return base_status(rest),
                Some(false) => {
                    return SymbolStatus::Misused(format!(
                        "unit \"{}\" does not take prefix \"{}\"",
                        rest, prefix
                    ))
                }
                None => {}
            }
        }
    }

    SymbolStatus::Unknown
}

struct UnitParser<'a> {
    input: &'a [u8],
    pos: usize,
    symbols: Vec<&'a str>,
}

impl<'a> UnitParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            symbols: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn expect(&mut self, c: u8) -> Result<(), String> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", c as char)))
        }
    }

    fn unexpected(&self, wanted: &str) -> String {
        match self.peek() {
            Some(c) => format!("expected {} at position {}, found '{}'", wanted, self.pos + 1, c as char),
            None => format!("expected {} at end", wanted),
        }
    }

    fn slice(&self, start: usize) -> &'a str {
        // only ASCII bytes are ever consumed
        std::str::from_utf8(&self.input[start..self.pos]).unwrap_or_default()
    }

    fn parse_input(&mut self) -> Result<(), String> {
        if self.peek().is_some_and(|c| c.is_ascii_digit() || c == b'.') {
            self.parse_number()?;
            if self.peek().is_none() {
                return Err("scale factor without unit".to_string());
            }
        }
        self.parse_product()?;
        if self.peek().is_some() {
            return Err(self.unexpected("end of unit"));
        }
        Ok(())
    }

    fn parse_product(&mut self) -> Result<(), String> {
        self.parse_expression()?;
        while self.peek() == Some(b'.') {
            self.pos += 1;
            self.parse_expression()?;
        }
        if self.peek() == Some(b'/') {
            self.pos += 1;
            self.parse_expression()?;
        }
        Ok(())
    }

    fn parse_expression(&mut self) -> Result<(), String> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                self.parse_product()?;
                self.expect(b')')?;
                self.parse_power()
            }
            Some(b'\'') => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err("empty quoted unit".to_string());
                }
                self.expect(b'\'')?;
                self.parse_power()
            }
            Some(b'%') => {
                self.pos += 1;
                self.symbols.push("%");
                Ok(())
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                    self.pos += 1;
                }
                let name = self.slice(start);
                if self.peek() == Some(b'(') {
                    if !FUNCTIONS.contains(&name) {
                        return Err(format!("unknown function \"{}\"", name));
                    }
                    self.pos += 1;
                    self.parse_product()?;
                    return self.expect(b')');
                }
                self.symbols.push(name);
                self.parse_power()
            }
            _ => Err(self.unexpected("unit")),
        }
    }

    fn parse_power(&mut self) -> Result<(), String> {
        if !(self.peek() == Some(b'*') && self.peek_at(1) == Some(b'*')) {
            return Ok(());
        }
        self.pos += 2;
        if self.peek() == Some(b'(') {
            self.pos += 1;
            self.parse_signed(true)?;
            if self.peek() == Some(b'/') {
                self.pos += 1;
                self.parse_signed(false)?;
            }
            self.expect(b')')
        } else {
            self.parse_signed(false)
        }
    }

    fn parse_signed(&mut self, allow_fraction: bool) -> Result<(), String> {
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if allow_fraction && self.peek() == Some(b'.') {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if self.pos == start {
            return Err(self.unexpected("number"));
        }
        Ok(())
    }

    fn parse_number(&mut self) -> Result<(), String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if self.pos == start || self.slice(start) == "." {
            return Err(self.unexpected("number"));
        }
        // an 'e' only starts an exponent when a digit follows
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let sign = matches!(self.peek_at(1), Some(b'+') | Some(b'-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += digit_at;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        Ok(())
    }
}

impl UnitClassifier for VoUnitsClassifier {
    fn classify(&self, unit: &str) -> UnitStatus {
        if unit.is_empty() {
            return UnitStatus::Ok;
        }
        if unit.chars().any(char::is_whitespace) {
            return UnitStatus::Whitespace;
        }
        if !unit.is_ascii() {
            return UnitStatus::BadSyntax("non-ASCII characters".to_string());
        }

        let mut parser = UnitParser::new(unit);
        if let Err(why) = parser.parse_input() {
            return UnitStatus::BadSyntax(why);
        }

        let worst = parser
            .symbols
            .iter()
            .map(|sym| (classify_symbol(sym), *sym))
            .max_by(|a, b| a.0.cmp(&b.0));
        match worst {
            None | Some((SymbolStatus::Known, _)) => UnitStatus::Ok,
            Some((SymbolStatus::Deprecated, sym)) => UnitStatus::Deprecated(sym.to_string()),
            Some((SymbolStatus::Unknown, sym)) => UnitStatus::UnknownUnit(sym.to_string()),
            Some((SymbolStatus::Misused(why), _)) => UnitStatus::UsageViolation(why),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(unit: &str) -> UnitStatus {
        VoUnitsClassifier.classify(unit)
    }

    #[test]
    fn test_legal_units() {
        for unit in [
            "m", "km/s", "mJy", "deg", "arcsec", "mas", "erg.s**-1.cm**-2", "Gyr", "kpc",
            "m**(1/2)", "log(Hz)", "1e-3m", "10km", "(m/s)**2", "KiB", "%", "'furlong'", "Pa",
            "cd", "solMass", "dam",
        ] {
            assert_eq!(classify(unit), UnitStatus::Ok, "unit {}", unit);
        }
        assert_eq!(classify(""), UnitStatus::Ok);
    }

    #[test]
    fn test_whitespace() {
        assert_eq!(classify("km / s"), UnitStatus::Whitespace);
        assert_eq!(classify(" m"), UnitStatus::Whitespace);
    }

    #[test]
    fn test_bad_syntax() {
        for unit in ["m/", "km//s", "m**", "(m", "m2", "foo(m)", "1.5", "m**x", "m/s/s"] {
            assert!(
                matches!(classify(unit), UnitStatus::BadSyntax(_)),
                "unit {} -> {:?}",
                unit,
                classify(unit)
            );
        }
    }

    #[test]
    fn test_unknown_and_misused() {
        assert_eq!(classify("furlong"), UnitStatus::UnknownUnit("furlong".to_string()));
        assert!(matches!(classify("kdeg"), UnitStatus::UsageViolation(_)));
        assert!(matches!(classify("Kim"), UnitStatus::UsageViolation(_)));
        assert!(matches!(classify("furlong.kdeg"), UnitStatus::UsageViolation(_)));
    }

    #[test]
    fn test_deprecated() {
        assert_eq!(classify("Angstrom"), UnitStatus::Deprecated("Angstrom".to_string()));
        assert_eq!(
            UnitStatus::Deprecated(String::new()).level(),
            Some(Level::Warning)
        );
    }
}
