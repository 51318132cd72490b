//! DALI extended types.
//!
//! A recognised `xtype` first has its FIELD metadata checked. If those are
//! wrong the xtype is reported and dropped, and the column falls back to
//! the plain datatype parser. Otherwise values are checked against the
//! xtype's own rules, in text and binary form alike.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};
use chrono::NaiveDate;

use super::arraysize::ArraySize;
use super::scalar::numeric_value;
use super::{eof_or_io, read_count, StreamError};
use crate::code::codes;
use crate::context::Reporter;

/// A checked DALI xtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Xtype {
    /// ISO-8601 subset, on `char` strings
    Timestamp,
    /// Two floating point limits
    Interval,
    /// Longitude and latitude
    Point,
    /// Centre and radius
    Circle,
    /// Vertex coordinate pairs
    Polygon,
}

/// Value checker for a column with a usable xtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct XtypeParser {
    xtype: Xtype,
    double: bool,
    nel: Option<usize>,
}

impl XtypeParser {
    /// Resolves an `xtype` against the column's declaration, reporting
    /// metadata problems. `None` means "use the datatype parser".
    pub(crate) fn resolve(
        xtype: &str,
        datatype: &str,
        arraysize: Option<&ArraySize>,
        reporter: &mut dyn Reporter,
    ) -> Option<Self> {
        let xtype = xtype.trim();
        if xtype.is_empty() {
            return None;
        }

        let floating = matches!(datatype, "float" | "double");
        let numeric = floating || matches!(datatype, "short" | "int" | "long");
        let double = datatype == "double";

        // Outer None: not a vector. Inner None: variable length.
        let vector: Option<Option<usize>> = match arraysize {
            None => Some(Some(1)),
            Some(a) if a.ndim() == 1 => Some(a.count()),
            Some(_) => None,
        };
        let parser = |xtype, nel| {
            Some(Self {
                xtype,
                double,
                nel,
            })
        };

        match xtype {
            "timestamp" => match vector {
                Some(nel) if datatype == "char" => parser(Xtype::Timestamp, nel),
                _ => {
                    reporter.error(
                        codes::XTS,
                        "xtype='timestamp' for non-string-type value".to_string(),
                    );
                    None
                }
            },
            "interval" => {
                if vector != Some(Some(2)) {
                    reporter.error(codes::XI2, "xtype='interval' for arraysize != 2".to_string());
                    None
                } else if !numeric {
                    reporter.error(
                        codes::XI9,
                        "xtype='interval' for non-numeric datatype".to_string(),
                    );
                    None
                } else if floating {
                    parser(Xtype::Interval, Some(2))
                } else {
                    // Integer intervals are legal but have nothing extra to check.
                    None
                }
            }
            "point" => {
                if vector != Some(Some(2)) {
                    reporter.error(codes::XP2, "xtype='point' for arraysize != 2".to_string());
                    None
                } else if !floating {
                    reporter.error(
                        codes::XP9,
                        "xtype='point' for non-floating datatype".to_string(),
                    );
                    None
                } else {
                    parser(Xtype::Point, Some(2))
                }
            }
            "circle" => {
                if vector != Some(Some(3)) {
                    reporter.error(codes::XC3, "xtype='circle' for arraysize != 3".to_string());
                    None
                } else if !floating {
                    reporter.error(
                        codes::XC9,
                        "xtype='circle' for non-floating datatype".to_string(),
                    );
                    None
                } else {
                    parser(Xtype::Circle, Some(3))
                }
            }
            "polygon" => match vector {
                None => {
                    reporter.error(
                        codes::XSV,
                        "xtype='polygon' for non-vector arraysize".to_string(),
                    );
                    None
                }
                Some(_) if !floating => {
                    reporter.error(
                        codes::XS9,
                        "xtype='polygon' for non-floating datatype".to_string(),
                    );
                    None
                }
                Some(nel) => parser(Xtype::Polygon, nel),
            },
            other if other.find(':').is_some_and(|i| i > 0) => {
                reporter.info(
                    codes::XNI,
                    format!("Namespaced non-DALI xtype value \"{}\"", other),
                );
                None
            }
            other => {
                reporter.warning(codes::XDL, format!("Non-DALI xtype value \"{}\"", other));
                None
            }
        }
    }

    pub(crate) fn xtype(&self) -> Xtype {
        self.xtype
    }

    fn datatype(&self) -> &'static str {
        if self.double {
            "double"
        } else {
            "float"
        }
    }

    /// Checks one textual value. Empty text is null.
    pub(crate) fn check_text(&self, text: &str, owner: &str, reporter: &mut dyn Reporter) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.xtype == Xtype::Timestamp {
            check_timestamp(text, owner, reporter);
            return;
        }

        let mut values = Vec::new();
        for token in text.split_whitespace() {
            match numeric_value(token) {
                Some(value) => values.push(value),
                None => {
                    reporter.error(
                        codes::FP0,
                        format!("Bad {} value \"{}\" in {}", self.datatype(), token, owner),
                    );
                    return;
                }
            }
        }
        match self.nel {
            Some(nel) if values.len() != nel => reporter.error(
                codes::E08,
                format!(
                    "Wrong number of elements in {} ({} found, {} expected)",
                    owner,
                    values.len(),
                    nel
                ),
            ),
            _ => self.check_coords(&values, owner, reporter),
        }
    }

    /// Reads and checks one binary value.
    pub(crate) fn check_stream(
        &self,
        input: &mut dyn Read,
        owner: &str,
        reporter: &mut dyn Reporter,
    ) -> Result<(), StreamError> {
        let nel = match self.nel {
            Some(nel) => nel,
            None => read_count(input, owner)?,
        };

        if self.xtype == Xtype::Timestamp {
            let mut bytes = Vec::with_capacity(nel.min(64));
            Read::take(&mut *input, nel as u64).read_to_end(&mut bytes)?;
            if bytes.len() < nel {
                return Err(StreamError::Eof("timestamp".to_string()));
            }
            // fixed-width values are NUL padded
            let text = String::from_utf8_lossy(&bytes);
            self.check_text(text.trim_end_matches('\0'), owner, reporter);
            return Ok(());
        }

        let mut values = Vec::with_capacity(nel.min(1024));
        for _ in 0..nel {
            let value = if self.double {
                input.read_f64::<BigEndian>()
            } else {
                input.read_f32::<BigEndian>().map(f64::from)
            };
            values.push(value.map_err(|e| eof_or_io(e, self.datatype()))?);
        }
        self.check_coords(&values, owner, reporter);
        Ok(())
    }

    fn check_coords(&self, values: &[f64], owner: &str, reporter: &mut dyn Reporter) {
        let nan_mismatch = |a: f64, b: f64| a.is_nan() != b.is_nan();
        match (self.xtype, values) {
            (Xtype::Interval, &[lo, hi]) => {
                if nan_mismatch(lo, hi) {
                    reporter.error(
                        codes::XIN,
                        format!("One but not both interval limit is NaN in {}", owner),
                    );
                }
            }
            (Xtype::Point, &[lon, lat]) => {
                if nan_mismatch(lon, lat) {
                    reporter.error(
                        codes::XIN,
                        format!("One but not both point coordinate is NaN in {}", owner),
                    );
                } else if lon.is_infinite() || lat.is_infinite() {
                    reporter.error(
                        codes::XIZ,
                        format!("Infinite point coordinate(s) in {}", owner),
                    );
                }
            }
            (Xtype::Circle, &[x, y, r]) => {
                if nan_mismatch(x, y) || nan_mismatch(x, r) {
                    reporter.error(
                        codes::XIN,
                        format!("Some but not all circle parameters are NaN in {}", owner),
                    );
                }
            }
            (Xtype::Polygon, coords) => {
                let n = coords.len();
                if n % 2 != 0 {
                    reporter.error(
                        codes::XSO,
                        format!("Odd number of polygon coords ({}) in {}", n, owner),
                    );
                } else if n > 0 && n < 6 {
                    reporter.error(
                        codes::XSF,
                        format!("Too few polygon coords ({}) in {}", n, owner),
                    );
                }
            }
            _ => {}
        }
    }
}

fn digits(text: &str, len: usize) -> Option<u32> {
    if text.len() == len && text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

/// Splits `YYYY-MM-DD['T'hh:mm:ss[.SSS]]['Z']` into numeric fields.
fn timestamp_fields(text: &str) -> Option<[u32; 6]> {
    let text = text.strip_suffix('Z').unwrap_or(text);
    let (date, time) = match text.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (text, None),
    };
    let (year, rest) = date.split_once('-')?;
    let (month, day) = rest.split_once('-')?;
    let mut fields = [digits(year, 4)?, digits(month, 2)?, digits(day, 2)?, 0, 0, 0];

    if let Some(time) = time {
        let hms = match time.split_once('.') {
            Some((hms, fraction)) => {
                if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                hms
            }
            None => time,
        };
        let (hour, rest) = hms.split_once(':')?;
        let (minute, second) = rest.split_once(':')?;
        fields[3] = digits(hour, 2)?;
        fields[4] = digits(minute, 2)?;
        fields[5] = digits(second, 2)?;
    }
    Some(fields)
}

fn check_timestamp(text: &str, owner: &str, reporter: &mut dyn Reporter) {
    let Some([year, month, day, hour, minute, second]) = timestamp_fields(text) else {
        reporter.error(
            codes::TSR,
            format!(
                "Timestamp value \"{}\" in {} does not match YYYY-MM-DD['T'hh:mm:ss[.SSS]]['Z']",
                text, owner
            ),
        );
        return;
    };
    // Second 60 allows for leap seconds.
    let valid = NaiveDate::from_ymd_opt(year as i32, month, day).is_some()
        && hour < 24
        && minute < 60
        && second <= 60;
    if !valid {
        reporter.error(
            codes::TSR,
            format!("Bad timestamp \"{}\" in {}: no such date or time", text, owner),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::context::CodeCollector;

    fn resolve(
        xtype: &str,
        datatype: &str,
        arraysize: Option<&str>,
    ) -> (Option<Xtype>, Vec<&'static str>) {
        let mut codes = CodeCollector::default();
        let arraysize = arraysize.map(|a| ArraySize::parse(a).unwrap());
        let parser = XtypeParser::resolve(xtype, datatype, arraysize.as_ref(), &mut codes);
        (parser.map(|p| p.xtype()), codes.0)
    }

    fn check(xtype: &str, datatype: &str, arraysize: &str, text: &str) -> Vec<&'static str> {
        let arraysize = ArraySize::parse(arraysize).unwrap();
        let parser =
            XtypeParser::resolve(xtype, datatype, Some(&arraysize), &mut CodeCollector::default())
                .unwrap();
        let mut codes = CodeCollector::default();
        parser.check_text(text, "FIELD", &mut codes);
        codes.0
    }

    #[test]
    fn test_resolve_metadata() {
        assert_eq!(resolve("timestamp", "char", Some("*")), (Some(Xtype::Timestamp), vec![]));
        assert_eq!(resolve("timestamp", "double", None), (None, vec!["XTS"]));
        assert_eq!(resolve("timestamp", "char", Some("4x*")), (None, vec!["XTS"]));
        assert_eq!(resolve("interval", "double", Some("3")), (None, vec!["XI2"]));
        assert_eq!(resolve("interval", "char", Some("2")), (None, vec!["XI9"]));
        assert_eq!(resolve("interval", "int", Some("2")), (None, vec![]));
        assert_eq!(resolve("point", "int", Some("2")), (None, vec!["XP9"]));
        assert_eq!(resolve("point", "double", None), (None, vec!["XP2"]));
        assert_eq!(resolve("circle", "float", Some("3")), (Some(Xtype::Circle), vec![]));
        assert_eq!(resolve("polygon", "double", Some("2x*")), (None, vec!["XSV"]));
        assert_eq!(resolve("polygon", "int", Some("*")), (None, vec!["XS9"]));
        assert_eq!(resolve("polygon", "double", Some("*")), (Some(Xtype::Polygon), vec![]));
        assert_eq!(resolve("adql:POINT", "char", None), (None, vec!["XNI"]));
        assert_eq!(resolve("mjd", "double", None), (None, vec!["XDL"]));
        assert_eq!(resolve(" ", "double", None), (None, vec![]));
    }

    #[test]
    fn test_timestamps() {
        let ts = |text| check("timestamp", "char", "*", text);
        assert!(ts("2024-02-29").is_empty());
        assert!(ts("2024-02-29T23:59:60.125Z").is_empty());
        assert!(ts("").is_empty());
        assert_eq!(ts("2023-02-29"), vec!["TSR"]);
        assert_eq!(ts("2023-1-01"), vec!["TSR"]);
        assert_eq!(ts("2023-01-01T25:00:00"), vec!["TSR"]);
        assert_eq!(ts("2023-01-01T12:00"), vec!["TSR"]);
    }

    #[test]
    fn test_geometry_values() {
        assert!(check("interval", "double", "2", "1 2").is_empty());
        assert_eq!(check("interval", "double", "2", "NaN 2"), vec!["XIN"]);
        assert!(check("interval", "double", "2", "NaN NaN").is_empty());
        assert_eq!(check("interval", "double", "2", "1 2 3"), vec!["E08"]);
        assert!(check("point", "double", "2", "10.5 -3").is_empty());
        assert_eq!(check("point", "double", "2", "+Inf 3"), vec!["XIZ"]);
        assert_eq!(check("circle", "float", "3", "1 2 x"), vec!["FP0"]);
        assert_eq!(check("circle", "float", "3", "1 2 NaN"), vec!["XIN"]);
        assert!(check("polygon", "double", "*", "0 0 1 0 1 1").is_empty());
        assert_eq!(check("polygon", "double", "*", "0 0 1 0 1"), vec!["XSO"]);
        assert_eq!(check("polygon", "double", "*", "0 0 1 0"), vec!["XSF"]);
    }

    #[test]
    fn test_binary_values() {
        let parser = XtypeParser::resolve(
            "point",
            "float",
            Some(&ArraySize::parse("2").unwrap()),
            &mut CodeCollector::default(),
        )
        .unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&f32::NAN.to_be_bytes());
        bytes.extend_from_slice(&1.0f32.to_be_bytes());
        let mut codes = CodeCollector::default();
        parser
            .check_stream(&mut Cursor::new(bytes), "FIELD", &mut codes)
            .unwrap();
        assert_eq!(codes.0, vec!["XIN"]);

        let parser = XtypeParser::resolve(
            "timestamp",
            "char",
            Some(&ArraySize::parse("*").unwrap()),
            &mut CodeCollector::default(),
        )
        .unwrap();
        let mut bytes = vec![0, 0, 0, 10];
        bytes.extend_from_slice(b"2020-13-01");
        let mut codes = CodeCollector::default();
        parser
            .check_stream(&mut Cursor::new(bytes), "FIELD", &mut codes)
            .unwrap();
        assert_eq!(codes.0, vec!["TSR"]);
    }

    #[test]
    fn test_padded_binary_timestamp() {
        let parser = XtypeParser::resolve(
            "timestamp",
            "char",
            Some(&ArraySize::parse("23").unwrap()),
            &mut CodeCollector::default(),
        )
        .unwrap();
        let mut bytes = b"2020-01-01T12:30:00".to_vec();
        bytes.resize(23, 0);
        let mut codes = CodeCollector::default();
        parser
            .check_stream(&mut Cursor::new(bytes), "FIELD", &mut codes)
            .unwrap();
        assert!(codes.0.is_empty(), "{:?}", codes.0);

        let mut codes = CodeCollector::default();
        parser
            .check_stream(&mut Cursor::new(vec![0; 23]), "FIELD", &mut codes)
            .unwrap();
        assert!(codes.0.is_empty(), "{:?}", codes.0);
    }
}
