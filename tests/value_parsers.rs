//! Property tests for the datatype parsers.
//!
//! Values written in a column's own textual form must always check clean,
//! and fixed-size arrays must insist on exactly their declared length.

use proptest::prelude::*;
use votlint::context::Reporter;
use votlint::values::{Declaration, ParseOptions, ValueParser};
use votlint::{Level, VotLintCode};

#[derive(Debug, Default)]
struct Recorder(Vec<(Level, &'static str)>);

impl Reporter for Recorder {
    fn report(&mut self, level: Level, code: VotLintCode, _text: String) {
        self.0.push((level, code.as_str()));
    }
}

impl Recorder {
    fn errors(&self) -> Vec<&'static str> {
        self.0
            .iter()
            .filter(|(level, _)| *level == Level::Error)
            .map(|(_, code)| *code)
            .collect()
    }
}

fn build(datatype: &str, arraysize: Option<&str>) -> ValueParser {
    let decl = Declaration {
        datatype: Some(datatype),
        arraysize,
        xtype: None,
    };
    let mut notes = Recorder::default();
    let parser = ValueParser::build(&decl, "FIELD \"p\"", ParseOptions::default(), &mut notes);
    assert!(notes.errors().is_empty(), "{} {:?}: {:?}", datatype, arraysize, notes);
    parser.unwrap()
}

const NUMERIC: &[&str] = &[
    "boolean",
    "unsignedByte",
    "short",
    "int",
    "long",
    "float",
    "double",
    "floatComplex",
    "doubleComplex",
];

fn float_token(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

fn scalar_token(datatype: &'static str) -> BoxedStrategy<String> {
    match datatype {
        "boolean" => prop::sample::select(vec!["T", "F", "true", "False", "1", "0", "?"])
            .prop_map(String::from)
            .boxed(),
        "unsignedByte" => any::<u8>().prop_map(|v| v.to_string()).boxed(),
        "short" => any::<i16>().prop_map(|v| v.to_string()).boxed(),
        "int" => prop_oneof![
            any::<i32>().prop_map(|v| v.to_string()),
            (0u32..0x7fff_ffff).prop_map(|v| format!("0x{:X}", v)),
        ]
        .boxed(),
        "long" => any::<i64>().prop_map(|v| v.to_string()).boxed(),
        "float" | "floatComplex" => any::<f32>().prop_map(|v| float_token(f64::from(v))).boxed(),
        _ => any::<f64>().prop_map(float_token).boxed(),
    }
}

/// (datatype, arraysize, text) for a numeric column.
fn numeric_case() -> impl Strategy<Value = (&'static str, Option<String>, String)> {
    (prop::sample::select(NUMERIC), 0usize..4, 1usize..5, 1usize..4, 0usize..4).prop_flat_map(
        |(datatype, shape, n, m, blocks)| {
            let factor = if datatype.ends_with("Complex") { 2 } else { 1 };
            let (arraysize, count) = match shape {
                0 => (None, factor),
                1 => (Some(n.to_string()), n * factor),
                2 => (Some(format!("{}x{}", n, m)), n * m * factor),
                _ => (Some(format!("{}x*", n)), blocks * n * factor),
            };
            prop::collection::vec(scalar_token(datatype), count).prop_map(move |tokens| {
                (datatype, arraysize.clone(), format!(" {} ", tokens.join("  ")))
            })
        },
    )
}

/// (datatype, arraysize, text) for a character or bit column.
fn text_case() -> impl Strategy<Value = (&'static str, Option<String>, String)> {
    let ascii = || prop::char::range('!', '~');
    prop_oneof![
        ascii().prop_map(|c| ("char", None, c.to_string())),
        (1usize..12).prop_flat_map(move |n| {
            prop::collection::vec(ascii(), n)
                .prop_map(move |chars| ("char", Some(n.to_string()), chars.into_iter().collect()))
        }),
        ".{0,20}".prop_map(|s| ("unicodeChar", Some("*".to_string()), s)),
        (1usize..20).prop_flat_map(|n| {
            prop::collection::vec(prop::sample::select(vec!['0', '1']), n)
                .prop_map(move |bits| ("bit", Some(n.to_string()), bits.into_iter().collect()))
        }),
    ]
}

proptest! {
    #[test]
    fn numeric_text_round_trip((datatype, arraysize, text) in numeric_case()) {
        let parser = build(datatype, arraysize.as_deref());
        let mut recorder = Recorder::default();
        parser.check_string(&text, &mut recorder);
        prop_assert!(recorder.errors().is_empty(), "{} {:?} {:?}: {:?}", datatype, arraysize, text, recorder);
    }

    #[test]
    fn character_text_round_trip((datatype, arraysize, text) in text_case()) {
        let parser = build(datatype, arraysize.as_deref());
        let mut recorder = Recorder::default();
        parser.check_string(&text, &mut recorder);
        prop_assert!(recorder.errors().is_empty(), "{} {:?} {:?}: {:?}", datatype, arraysize, text, recorder);
    }

    #[test]
    fn fixed_array_length_enforced(declared in 1usize..8, given in 0usize..12, value in any::<i16>()) {
        let parser = build("int", Some(&declared.to_string()));
        let text = vec![value.to_string(); given].join(" ");
        let mut recorder = Recorder::default();
        parser.check_string(&text, &mut recorder);
        let wrong_count = recorder.errors().contains(&"E09");
        prop_assert_eq!(wrong_count, given != declared);
    }
}

proptest! {
    #[test]
    fn arbitrary_arraysize_never_panics(
        arraysize in prop_oneof![
            "[0-9x* -]{0,24}",
            "[0-9]{1,22}(x[0-9]{1,22}){0,3}\\*?",
            any::<String>(),
        ],
        datatype in prop::sample::select(vec![
            "boolean", "bit", "unsignedByte", "short", "int", "long", "float",
            "double", "floatComplex", "doubleComplex", "char", "unicodeChar",
        ]),
    ) {
        let decl = Declaration {
            datatype: Some(datatype),
            arraysize: Some(&arraysize),
            xtype: None,
        };
        let mut notes = Recorder::default();
        if let Some(parser) = ValueParser::build(&decl, "FIELD \"p\"", ParseOptions::default(), &mut notes) {
            let mut recorder = Recorder::default();
            parser.check_string("1 0 1", &mut recorder);
            let bytes = [0u8, 0, 0, 2, 1, 0, 1, 0];
            let _ = parser.check_stream(&mut &bytes[..], &mut recorder);
        }
    }
}
