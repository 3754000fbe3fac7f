//! Asset Filenames
//!
//! Filenames encode the coordinate and output size:
//! `gaze_px{X}_py{Y}_{SIZE}.{ext}`. Values are written with at least one
//! decimal place, with `-` replaced by `m` and `.` by `p`, so `-12.5`
//! becomes `m12p5` and `3` becomes `3p0`.

use super::coordinate::{round_value, GazeCoordinate};
use regex::Regex;
use std::sync::LazyLock;

/// Filename prefix shared by every generated asset
pub const FILENAME_PREFIX: &str = "gaze_";

static FILENAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^gaze_px(m?\d+(?:p\d+)?)_py(m?\d+(?:p\d+)?)_(\d+)\.([A-Za-z0-9]+)$")
        .expect("valid regex")
});

/// Decimal form used in filenames and the index (`15.0`, `2.5`, `-0.333333`)
pub fn format_value(v: f64) -> String {
    let v = round_value(v);
    if v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

/// Filename-safe form of a value
pub fn sanitize_value(v: f64) -> String {
    format_value(v).replace('-', "m").replace('.', "p")
}

/// Inverse of [`sanitize_value`]
pub fn parse_sanitized_value(s: &str) -> Option<f64> {
    let restored = s.replacen('m', "-", 1).replacen('p', ".", 1);
    restored.parse::<f64>().ok().map(round_value)
}

/// Deterministic filename for a coordinate
pub fn filename_for(coord: GazeCoordinate, size: u32, extension: &str) -> String {
    format!(
        "{}px{}_py{}_{}.{}",
        FILENAME_PREFIX,
        sanitize_value(coord.px),
        sanitize_value(coord.py),
        size,
        extension
    )
}

/// Components recovered from a generated filename
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFilename {
    pub coordinate: GazeCoordinate,
    pub size: u32,
    pub extension: String,
}

/// Parse a filename produced by [`filename_for`]
pub fn parse_filename(name: &str) -> Option<ParsedFilename> {
    let caps = FILENAME_PATTERN.captures(name)?;
    let px = parse_sanitized_value(caps.get(1)?.as_str())?;
    let py = parse_sanitized_value(caps.get(2)?.as_str())?;
    let size = caps.get(3)?.as_str().parse().ok()?;
    Some(ParsedFilename {
        coordinate: GazeCoordinate::new(px, py),
        size,
        extension: caps.get(4)?.as_str().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value_keeps_one_decimal() {
        assert_eq!(format_value(15.0), "15.0");
        assert_eq!(format_value(-15.0), "-15.0");
        assert_eq!(format_value(0.0), "0.0");
        assert_eq!(format_value(-0.0), "0.0");
        assert_eq!(format_value(2.5), "2.5");
        assert_eq!(format_value(-12.5), "-12.5");
    }

    #[test]
    fn test_sanitize_value() {
        assert_eq!(sanitize_value(-12.5), "m12p5");
        assert_eq!(sanitize_value(3.0), "3p0");
        assert_eq!(sanitize_value(0.0), "0p0");
    }

    #[test]
    fn test_filename_for_matches_expected_pattern() {
        let name = filename_for(GazeCoordinate::new(-15.0, 12.5), 256, "webp");
        assert_eq!(name, "gaze_pxm15p0_py12p5_256.webp");
    }

    #[test]
    fn test_filename_has_no_dash() {
        let name = filename_for(GazeCoordinate::new(-3.0, -7.5), 128, "png");
        assert!(!name.contains('-'));
    }

    #[test]
    fn test_parse_filename_recovers_coordinate() {
        let parsed = parse_filename("gaze_pxm12p5_py3p0_256.webp").unwrap();
        assert_eq!(parsed.coordinate, GazeCoordinate::new(-12.5, 3.0));
        assert_eq!(parsed.size, 256);
        assert_eq!(parsed.extension, "webp");
    }

    #[test]
    fn test_parse_filename_accepts_integer_form() {
        let parsed = parse_filename("gaze_pxm3_py15_64.png").unwrap();
        assert_eq!(parsed.coordinate, GazeCoordinate::new(-3.0, 15.0));
    }

    #[test]
    fn test_parse_filename_rejects_foreign_names() {
        assert!(parse_filename("index.csv").is_none());
        assert!(parse_filename("gaze_px-3_py0_256.webp").is_none());
        assert!(parse_filename("gaze_px3p0_py0p0_256").is_none());
        assert!(parse_filename("face_px3p0_py0p0_256.webp").is_none());
    }
}
