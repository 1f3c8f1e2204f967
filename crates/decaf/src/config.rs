//! Decompiler output configuration.

use serde::{Deserialize, Serialize};

/// Options controlling literal rendering and failure policy.
///
/// The defaults match what the decompiler emits out of the box: decimal
/// integers with the power-of-two hex heuristic enabled, uppercase `L`
/// long suffix, lowercase `f`/`d` float suffixes, and recoverable errors
/// downgraded to comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Render every integer constant in hexadecimal.
    pub use_hex_numbers_always: bool,
    /// Allow the heuristic that renders round binary values in hex
    /// (|v| >= 16 and v or v + 1 a power of two).
    pub can_use_hex_numbers: bool,
    /// Suffix appended to `long` literals.
    pub long_postfix: String,
    /// Suffix appended to `float` literals.
    pub float_postfix: String,
    /// Suffix appended to `double` literals.
    pub double_postfix: String,
    /// Emit `1.0` rather than `1.` for integral float values.
    pub use_trailing_zero: bool,
    /// Emit the double suffix at all.
    pub use_double_postfix: bool,
    /// Abort the whole class on a per-method error instead of emitting a
    /// failure comment.
    pub fail_on_error: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_hex_numbers_always: false,
            can_use_hex_numbers: true,
            long_postfix: "L".to_owned(),
            float_postfix: "f".to_owned(),
            double_postfix: "d".to_owned(),
            use_trailing_zero: true,
            use_double_postfix: false,
            fail_on_error: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"fail_on_error": true}"#).unwrap();
        assert!(config.fail_on_error);
        assert_eq!(config.long_postfix, "L");
    }
}
