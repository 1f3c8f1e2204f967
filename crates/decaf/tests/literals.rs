//! Literal formatting round-trips: reparsing an emitted literal yields
//! the value that produced it.

use decaf::{
    Config,
    stringify::{double_literal, float_literal, int_literal},
};

fn parse_int(text: &str) -> i64 {
    if let Some(hex) = text.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).unwrap()
    } else if let Some(hex) = text.strip_prefix("-0x") {
        -i64::from_str_radix(hex, 16).unwrap()
    } else {
        text.parse().unwrap()
    }
}

#[test]
fn test_int_literal_round_trip() {
    let cfg = Config::default();
    for value in [0, 1, 15, 16, 17, 255, 256, 1023, -1, -16, -255, 100_000, i64::from(i32::MAX), i64::from(i32::MIN)] {
        let text = int_literal(value, &cfg);
        assert_eq!(parse_int(&text), value, "literal {text} did not round-trip");
    }
}

#[test]
fn test_int_literal_round_trip_in_hex_mode() {
    let cfg = Config {
        use_hex_numbers_always: true,
        ..Config::default()
    };
    for value in [0, 7, 42, -42, 4096] {
        let text = int_literal(value, &cfg);
        assert_eq!(parse_int(&text), value, "literal {text} did not round-trip");
    }
}

#[test]
fn test_float_literal_round_trip() {
    let cfg = Config::default();
    for value in [0.0f32, 1.0, 1.5, -2.25, 3.402_823_5e38, 1e-10] {
        let text = float_literal(value, &cfg);
        let stripped = text.strip_suffix('f').unwrap_or(&text);
        let parsed: f32 = stripped.parse().unwrap();
        assert_eq!(parsed.to_bits(), value.to_bits(), "literal {text} did not round-trip");
    }
}

#[test]
fn test_double_literal_round_trip() {
    let cfg = Config::default();
    for value in [0.0f64, 1.0, 2.5, -1e300, 4.9e-324] {
        let text = double_literal(value, &cfg);
        let parsed: f64 = text.parse().unwrap();
        assert_eq!(parsed.to_bits(), value.to_bits(), "literal {text} did not round-trip");
    }
}
