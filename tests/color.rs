use heroine_graph::{Color, ColorSpec, GraphError};

fn assert_rgba(color: Color, expected: [f32; 4]) {
    for (got, want) in color.to_array().iter().zip(expected) {
        assert!((got - want).abs() < 1e-3, "got {:?}, want {:?}", color, expected);
    }
}

// ── Hex forms ─────────────────────────────────────────────────────────────────

#[test]
fn parses_short_hex() {
    assert_rgba(Color::parse("#f00").unwrap(), [1.0, 0.0, 0.0, 1.0]);
    assert_rgba(Color::parse("#0f0").unwrap(), [0.0, 1.0, 0.0, 1.0]);
}

#[test]
fn parses_long_hex() {
    assert_rgba(Color::parse("#336699").unwrap(), [0.2, 0.4, 0.6, 1.0]);
}

#[test]
fn parses_hex_with_alpha() {
    assert_rgba(Color::parse("#33669980").unwrap(), [0.2, 0.4, 0.6, 128.0 / 255.0]);
}

#[test]
fn hex_is_case_insensitive() {
    assert_rgba(Color::parse("#AbCdEf").unwrap(), Color::parse("#abcdef").unwrap().to_array());
}

// ── Functional forms ──────────────────────────────────────────────────────────

#[test]
fn parses_rgb_function() {
    assert_rgba(Color::parse("rgb(255, 0, 128)").unwrap(), [1.0, 0.0, 128.0 / 255.0, 1.0]);
}

#[test]
fn parses_rgba_function() {
    assert_rgba(Color::parse("rgba(0, 255, 0, 0.5)").unwrap(), [0.0, 1.0, 0.0, 0.5]);
}

#[test]
fn parses_hsl_function() {
    // 120° fully saturated, half lightness = pure green.
    assert_rgba(Color::parse("hsl(120, 100%, 50%)").unwrap(), [0.0, 1.0, 0.0, 1.0]);
    // Zero saturation = gray at the lightness.
    assert_rgba(Color::parse("hsl(42, 0%, 25%)").unwrap(), [0.25, 0.25, 0.25, 1.0]);
}

#[test]
fn parses_hsla_function() {
    assert_rgba(Color::parse("hsla(0, 100%, 50%, 0.25)").unwrap(), [1.0, 0.0, 0.0, 0.25]);
}

#[test]
fn hsl_hue_wraps() {
    let a = Color::parse("hsl(480, 100%, 50%)").unwrap();
    let b = Color::parse("hsl(120, 100%, 50%)").unwrap();
    assert_rgba(a, b.to_array());
}

#[test]
fn whitespace_and_case_tolerated() {
    assert!(Color::parse("  RGB( 10 , 20 , 30 )  ").is_ok());
    assert!(Color::parse("HSLA(0, 50%, 50%, 1)").is_ok());
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[test]
fn invalid_strings_fail_with_invalid_color() {
    for bad in ["", "#12", "#12345", "#gggggg", "rgb(1,2)", "hsl(0, 1, 1)", "red", "rgb 1 2 3"] {
        match Color::parse(bad) {
            Err(GraphError::InvalidColor { value }) => assert_eq!(value, bad),
            other => panic!("expected InvalidColor for {bad:?}, got {other:?}"),
        }
    }
}

// ── ColorSpec ─────────────────────────────────────────────────────────────────

#[test]
fn spec_array_passes_through_clamped() {
    let spec: ColorSpec = [1.5, -0.5, 0.25, 2.0].into();
    assert_rgba(spec.resolve().unwrap(), [1.0, 0.0, 0.25, 1.0]);
}

#[test]
fn spec_string_parses() {
    let spec: ColorSpec = "#8000ff".into();
    assert_rgba(spec.resolve().unwrap(), [128.0 / 255.0, 0.0, 1.0, 1.0]);
}
