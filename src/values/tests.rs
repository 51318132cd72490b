use std::io::Cursor;

use super::*;
use crate::context::CodeCollector;

fn parser(datatype: &str, arraysize: Option<&str>) -> ValueParser {
    let decl = Declaration {
        datatype: Some(datatype),
        arraysize,
        xtype: None,
    };
    ValueParser::build(&decl, "FIELD \"c\"", ParseOptions::default(), &mut CodeCollector::default())
        .unwrap()
}

fn text_codes(parser: &ValueParser, text: &str) -> Vec<&'static str> {
    let mut codes = CodeCollector::default();
    parser.check_string(text, &mut codes);
    codes.0
}

fn stream(parser: &ValueParser, bytes: &[u8]) -> (Result<(), StreamError>, Vec<&'static str>, u64) {
    let mut cursor = Cursor::new(bytes);
    let mut codes = CodeCollector::default();
    let result = parser.check_stream(&mut cursor, &mut codes);
    (result, codes.0, cursor.position())
}

#[test]
fn test_build_errors() {
    let mut codes = CodeCollector::default();
    let none = ValueParser::build(&Declaration::default(), "FIELD", ParseOptions::default(), &mut codes);
    assert!(none.is_none());

    let decl = Declaration {
        datatype: Some("quaternion"),
        ..Default::default()
    };
    assert!(ValueParser::build(&decl, "FIELD", ParseOptions::default(), &mut codes).is_none());

    let decl = Declaration {
        datatype: Some("int"),
        arraysize: Some("2xq"),
        xtype: None,
    };
    assert!(ValueParser::build(&decl, "FIELD", ParseOptions::default(), &mut codes).is_none());

    let decl = Declaration {
        datatype: Some("int"),
        arraysize: Some("-3"),
        xtype: None,
    };
    assert!(ValueParser::build(&decl, "FIELD", ParseOptions::default(), &mut codes).is_none());

    assert_eq!(codes.0, vec!["DT0", "DTX", "ARB", "DMN"]);
}

#[test]
fn test_single_char_note() {
    let mut codes = CodeCollector::default();
    let decl = Declaration {
        datatype: Some("char"),
        ..Default::default()
    };
    let p = ValueParser::build(&decl, "FIELD", ParseOptions::default(), &mut codes).unwrap();
    assert_eq!(codes.0, vec!["AR1"]);
    assert_eq!(p.content_class(), ContentClass::Char);
    assert_eq!(p.element_count(), Some(1));
}

#[test]
fn test_counts_and_classes() {
    let cases = [
        ("int", None, ContentClass::Int, Some(1)),
        ("short", Some("3x2"), ContentClass::Short, Some(6)),
        ("unsignedByte", Some("*"), ContentClass::Short, None),
        ("floatComplex", None, ContentClass::Float, Some(2)),
        ("doubleComplex", Some("4"), ContentClass::Double, Some(8)),
        ("bit", Some("12"), ContentClass::Bit, Some(12)),
        ("char", Some("10"), ContentClass::String, Some(1)),
        ("char", Some("*"), ContentClass::String, Some(1)),
        ("unicodeChar", Some("8x3"), ContentClass::String, Some(3)),
        ("char", Some("8x*"), ContentClass::String, None),
    ];
    for (datatype, arraysize, class, count) in cases {
        let p = parser(datatype, arraysize);
        assert_eq!(p.content_class(), class, "{} {:?}", datatype, arraysize);
        assert_eq!(p.element_count(), count, "{} {:?}", datatype, arraysize);
    }
}

#[test]
fn test_scalar_text() {
    let int = parser("int", None);
    assert!(text_codes(&int, " 42 ").is_empty());
    assert!(text_codes(&int, "0x2A").is_empty());
    assert!(text_codes(&int, "").is_empty());
    assert_eq!(text_codes(&int, "4.2"), vec!["IT0"]);
    assert_eq!(text_codes(&int, "3000000000"), vec!["BND"]);

    let double = parser("double", None);
    assert!(text_codes(&double, "NaN").is_empty());
    assert!(text_codes(&double, "-Inf").is_empty());
    assert!(text_codes(&double, "+Inf").is_empty());
    assert_eq!(text_codes(&double, "1.0.0"), vec!["FP0"]);

    let boolean = parser("boolean", None);
    assert!(text_codes(&boolean, "T").is_empty());
    assert_eq!(text_codes(&boolean, "maybe"), vec!["TFX"]);
}

#[test]
fn test_empty_integer_by_version() {
    let decl = Declaration {
        datatype: Some("long"),
        ..Default::default()
    };
    let strict = ParseOptions {
        allow_empty_integer: false,
    };
    let p = ValueParser::build(&decl, "FIELD", strict, &mut CodeCollector::default()).unwrap();
    assert_eq!(text_codes(&p, "  "), vec!["ETD"]);
}

#[test]
fn test_fixed_array_token_count() {
    let p = parser("float", Some("3"));
    assert!(text_codes(&p, "1 2 3").is_empty());
    assert!(text_codes(&p, " 1\t2\n3 ").is_empty());
    assert_eq!(text_codes(&p, ""), vec!["E09"]);
    assert_eq!(text_codes(&p, "1 2"), vec!["E09"]);
    assert_eq!(text_codes(&p, "1 x 3"), vec!["FP0"]);
    assert_eq!(text_codes(&p, "1 2 3 4"), vec!["E09"]);
}

#[test]
fn test_variable_array_blocks() {
    let p = parser("int", Some("2x*"));
    assert!(text_codes(&p, "1 2 3 4").is_empty());
    assert_eq!(text_codes(&p, "1 2 3"), vec!["E08"]);

    let complex = parser("doubleComplex", Some("*"));
    assert!(text_codes(&complex, "1 0 2 0").is_empty());
    assert_eq!(text_codes(&complex, "1 0 2"), vec!["E08"]);
}

#[test]
fn test_bits_text() {
    let p = parser("bit", Some("4"));
    assert!(text_codes(&p, "1 0 1 1").is_empty());
    assert!(text_codes(&p, "1011").is_empty());
    assert_eq!(text_codes(&p, "101"), vec!["CT9"]);
    assert_eq!(text_codes(&p, "10x1"), vec!["BT0"]);

    let variable = parser("bit", Some("*"));
    assert!(text_codes(&variable, "10 1").is_empty());
    assert_eq!(text_codes(&variable, "12"), vec!["BV0"]);
}

#[test]
fn test_char_text() {
    let single = parser("char", None);
    assert!(text_codes(&single, "a").is_empty());
    assert_eq!(text_codes(&single, "ab"), vec!["CH1"]);
    assert_eq!(text_codes(&single, ""), vec!["CH0"]);
    assert_eq!(text_codes(&single, "é"), vec!["CRU"]);

    let unicode = parser("unicodeChar", None);
    assert!(text_codes(&unicode, "ß").is_empty());

    let string = parser("char", Some("*"));
    assert!(text_codes(&string, "any length at all").is_empty());

    let array = parser("char", Some("2x2"));
    assert!(text_codes(&array, "abcd").is_empty());
    assert!(text_codes(&array, "").is_empty());
    assert_eq!(text_codes(&array, "abcde"), vec!["C09"]);
}

#[test]
fn test_fixed_binary() {
    let int = parser("int", None);
    let (result, codes, pos) = stream(&int, &[0, 0, 0, 7, 9]);
    assert!(result.is_ok());
    assert!(codes.is_empty());
    assert_eq!(pos, 4);

    let (result, _, _) = stream(&int, &[0, 0, 7]);
    assert!(matches!(result, Err(StreamError::Eof(_))));
}

#[test]
fn test_variable_binary() {
    let p = parser("short", Some("*"));
    let (result, _, pos) = stream(&p, &[0, 0, 0, 2, 0, 1, 0, 2]);
    assert!(result.is_ok());
    assert_eq!(pos, 8);

    let (result, _, _) = stream(&p, &[0, 0, 0, 3, 0, 1, 0, 2]);
    assert!(matches!(result, Err(StreamError::Eof(_))));

    let (result, _, _) = stream(&p, &[0xff, 0xff, 0xff, 0xff]);
    let err = result.unwrap_err();
    assert!(matches!(err, StreamError::Corrupt(_)));
    assert_eq!(err.code(), codes::MEL);
}

#[test]
fn test_boolean_and_char_binary() {
    let b = parser("boolean", Some("3"));
    let (result, codes, _) = stream(&b, b"T?x");
    assert!(result.is_ok());
    assert_eq!(codes, vec!["TFX"]);

    let u = parser("unicodeChar", Some("2"));
    let (result, _, pos) = stream(&u, &[0x00, 0x41, 0x00, 0x42, 0xff]);
    assert!(result.is_ok());
    assert_eq!(pos, 4);

    let v = parser("char", Some("*"));
    let (result, _, pos) = stream(&v, &[0, 0, 0, 3, b'a', b'b', b'c']);
    assert!(result.is_ok());
    assert_eq!(pos, 7);
}

#[test]
fn test_bits_binary() {
    let p = parser("bit", Some("10"));
    let (result, _, pos) = stream(&p, &[0xff, 0xc0, 0x00]);
    assert!(result.is_ok());
    assert_eq!(pos, 2);
}

#[test]
fn test_xtype_fallback_and_use() {
    let mut codes = CodeCollector::default();
    let decl = Declaration {
        datatype: Some("double"),
        arraysize: Some("3"),
        xtype: Some("point"),
    };
    let p = ValueParser::build(&decl, "FIELD", ParseOptions::default(), &mut codes).unwrap();
    assert_eq!(codes.0, vec!["XP2"]);
    assert!(p.xtype().is_none());
    assert_eq!(text_codes(&p, "1 2"), vec!["E09"]);

    let decl = Declaration {
        datatype: Some("char"),
        arraysize: Some("*"),
        xtype: Some("timestamp"),
    };
    let p = ValueParser::build(&decl, "FIELD", ParseOptions::default(), &mut codes).unwrap();
    assert_eq!(p.xtype(), Some(Xtype::Timestamp));
    assert!(text_codes(&p, "2020-01-01T00:00:00").is_empty());
    assert_eq!(text_codes(&p, "yesterday"), vec!["TSR"]);
}

#[test]
fn test_blank_arraysize_is_scalar() {
    let mut codes = CodeCollector::default();
    let decl = Declaration {
        datatype: Some("int"),
        arraysize: Some("  "),
        xtype: None,
    };
    let p = ValueParser::build(&decl, "FIELD", ParseOptions::default(), &mut codes).unwrap();
    assert!(codes.0.is_empty(), "{:?}", codes.0);
    assert!(p.is_scalar());
    assert_eq!(p.element_count(), Some(1));
    assert_eq!(text_codes(&p, "twelve"), vec!["IT0"]);
}

#[test]
fn test_bad_hint_still_checks_values() {
    let mut codes = CodeCollector::default();
    let decl = Declaration {
        datatype: Some("short"),
        arraysize: Some("2xq*"),
        xtype: None,
    };
    let p = ValueParser::build(&decl, "FIELD", ParseOptions::default(), &mut codes).unwrap();
    assert_eq!(codes.0, vec!["ARB"]);
    assert_eq!(p.element_count(), None);
    assert!(text_codes(&p, "1 2 3 4").is_empty());
    assert_eq!(text_codes(&p, "1 2 x 4"), vec!["IT0"]);
}

#[test]
fn test_overflowing_arraysize_rejected() {
    for (datatype, arraysize) in [
        ("int", "4294967296x4294967296".to_string()),
        ("char", "4294967296x4294967296".to_string()),
        ("doubleComplex", usize::MAX.to_string()),
        ("floatComplex", format!("{}x*", usize::MAX)),
    ] {
        let mut codes = CodeCollector::default();
        let decl = Declaration {
            datatype: Some(datatype),
            arraysize: Some(&arraysize),
            xtype: None,
        };
        let p = ValueParser::build(&decl, "FIELD", ParseOptions::default(), &mut codes);
        assert!(p.is_none(), "{} {}", datatype, arraysize);
        assert_eq!(codes.0, vec!["ARB"], "{} {}", datatype, arraysize);
    }
}

#[test]
fn test_huge_binary_values_do_not_overflow() {
    let huge = (usize::MAX / 2 + 1).to_string();

    let p = parser("long", Some(&huge));
    let (result, _, _) = stream(&p, &[0; 16]);
    assert!(matches!(result, Err(StreamError::Corrupt(_))), "{:?}", result);

    let p = parser("unicodeChar", Some(&huge));
    let (result, _, _) = stream(&p, &[0; 16]);
    assert!(matches!(result, Err(StreamError::Corrupt(_))), "{:?}", result);

    let p = parser("bit", Some(&usize::MAX.to_string()));
    let (result, _, pos) = stream(&p, &[0; 16]);
    assert!(matches!(result, Err(StreamError::Eof(_))), "{:?}", result);
    assert_eq!(pos, 16);
}
