//! Scalar literal grammars and binary widths.

use crate::code::{codes, VotLintCode};

/// Integer type facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntSpec {
    /// Datatype name
    pub name: &'static str,
    /// Binary width in bytes
    pub nbyte: usize,
    /// Smallest legal value
    pub min: i64,
    /// Largest legal value
    pub max: i64,
}

pub(crate) const UNSIGNED_BYTE: IntSpec = IntSpec {
    name: "unsignedByte",
    nbyte: 1,
    min: 0,
    max: u8::MAX as i64,
};
pub(crate) const SHORT: IntSpec = IntSpec {
    name: "short",
    nbyte: 2,
    min: i16::MIN as i64,
    max: i16::MAX as i64,
};
pub(crate) const INT: IntSpec = IntSpec {
    name: "int",
    nbyte: 4,
    min: i32::MIN as i64,
    max: i32::MAX as i64,
};
pub(crate) const LONG: IntSpec = IntSpec {
    name: "long",
    nbyte: 8,
    min: i64::MIN,
    max: i64::MAX,
};

/// A scalar element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    /// `boolean`
    Boolean,
    /// One of the integer types
    Integer(IntSpec),
    /// `float`
    Float,
    /// `double`
    Double,
}

impl Scalar {
    /// Datatype name.
    pub fn name(&self) -> &'static str {
        match self {
            Scalar::Boolean => "boolean",
            Scalar::Integer(spec) => spec.name,
            Scalar::Float => "float",
            Scalar::Double => "double",
        }
    }

    /// Binary width in bytes.
    pub fn nbyte(&self) -> usize {
        match self {
            Scalar::Boolean => 1,
            Scalar::Integer(spec) => spec.nbyte,
            Scalar::Float => 4,
            Scalar::Double => 8,
        }
    }

    /// Checks one textual token, already trimmed and non-empty.
    pub fn check_token(&self, token: &str) -> Result<(), (VotLintCode, String)> {
        match self {
            Scalar::Boolean => {
                if is_boolean_literal(token) {
                    Ok(())
                } else {
                    Err((codes::TFX, format!("Bad boolean value \"{}\"", token)))
                }
            }
            Scalar::Integer(spec) => check_integer(spec, token),
            Scalar::Float | Scalar::Double => {
                if is_float_literal(token) {
                    Ok(())
                } else {
                    Err((
                        codes::FP0,
                        format!("Bad {} value \"{}\"", self.name(), token),
                    ))
                }
            }
        }
    }
}

/// Legal single-byte boolean codes in binary data.
pub(crate) fn is_boolean_byte(b: u8) -> bool {
    matches!(b, b'T' | b't' | b'1' | b'F' | b'f' | b'0' | b' ' | b'?' | 0)
}

pub(crate) fn is_boolean_literal(token: &str) -> bool {
    matches!(
        token.to_ascii_lowercase().as_str(),
        "true" | "false" | "t" | "f" | "1" | "0" | "?"
    )
}

/// `NaN`, `+Inf`, `-Inf` or a decimal float with an optional exponent of
/// up to three digits.
pub(crate) fn is_float_literal(token: &str) -> bool {
    if matches!(token, "NaN" | "+Inf" | "-Inf") {
        return true;
    }
    let bytes = token.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut ndigit = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        ndigit += i - frac_start;
    }
    if ndigit == 0 {
        return false;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if !(1..=3).contains(&(i - exp_start)) {
            return false;
        }
    }
    i == bytes.len()
}

/// Parses a floating point token.
pub(crate) fn numeric_value(token: &str) -> Option<f64> {
    match token {
        "NaN" => Some(f64::NAN),
        "+Inf" => Some(f64::INFINITY),
        "-Inf" => Some(f64::NEG_INFINITY),
        _ if is_float_literal(token) => token.parse().ok(),
        _ => None,
    }
}

fn check_integer(spec: &IntSpec, token: &str) -> Result<(), (VotLintCode, String)> {
    let value = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).map(i128::from).map_err(|_| {
            (
                codes::HX0,
                format!("Bad hexadecimal {} value \"{}\"", spec.name, token),
            )
        })?
    } else {
        let digits = token.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(token);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err((codes::IT0, format!("Bad {} value \"{}\"", spec.name, token)));
        }
        // Too many digits for i128 is out of range for every type.
        token.parse::<i128>().unwrap_or(i128::MAX)
    };

    if value >= i128::from(spec.min) && value <= i128::from(spec.max) {
        Ok(())
    } else {
        Err((
            codes::BND,
            format!(
                "Value {} outside {} range {}..{}",
                token, spec.name, spec.min, spec.max
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_literals() {
        for ok in ["1", "-1.5", ".5", "5.", "+3e10", "1E-3", "NaN", "-Inf", "+Inf"] {
            assert!(is_float_literal(ok), "{}", ok);
        }
        for bad in ["", ".", "e5", "1e", "1e1000", "1.2.3", "nan", "Inf", "0x10", "1,5", "-"] {
            assert!(!is_float_literal(bad), "{}", bad);
        }
    }

    #[test]
    fn test_integer_ranges() {
        assert!(check_integer(&SHORT, "32767").is_ok());
        assert_eq!(check_integer(&SHORT, "32768").unwrap_err().0, codes::BND);
        assert!(check_integer(&SHORT, "-32768").is_ok());
        assert!(check_integer(&UNSIGNED_BYTE, "255").is_ok());
        assert_eq!(check_integer(&UNSIGNED_BYTE, "-1").unwrap_err().0, codes::BND);
        assert!(check_integer(&LONG, "-9223372036854775808").is_ok());
        assert_eq!(
            check_integer(&LONG, "99999999999999999999999999999999999999999").unwrap_err().0,
            codes::BND
        );
        assert_eq!(check_integer(&INT, "1.0").unwrap_err().0, codes::IT0);
    }

    #[test]
    fn test_hex_integers() {
        assert!(check_integer(&INT, "0x7fffffff").is_ok());
        assert_eq!(check_integer(&INT, "0xFFFFFFFF").unwrap_err().0, codes::BND);
        assert!(check_integer(&LONG, "0x7FFFFFFFFFFFFFFF").is_ok());
        assert_eq!(check_integer(&LONG, "0xFFFFFFFFFFFFFFFF").unwrap_err().0, codes::HX0);
        assert_eq!(check_integer(&INT, "0xZZ").unwrap_err().0, codes::HX0);
        assert_eq!(check_integer(&INT, "-0x1").unwrap_err().0, codes::IT0);
    }

    #[test]
    fn test_booleans() {
        for ok in ["T", "false", "TRUE", "?", "0", "f"] {
            assert!(is_boolean_literal(ok), "{}", ok);
        }
        assert!(!is_boolean_literal("yes"));
        assert!(is_boolean_byte(b'?'));
        assert!(!is_boolean_byte(b'x'));
    }
}
