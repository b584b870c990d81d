//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fraction::Fraction;

/// Settings shared by a [`Loom`](crate::clock::Loom), its clock and the
/// patterns bound to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoomConfig {
    /// Length of one cycle in milliseconds.
    pub cycle_millis: i64,
    /// Resolution at which schedulers step the clock.
    pub tick_millis: i64,
    /// Width of the release sliver carved out of each event by onset/release
    /// detection, as `(numer, denom)` cycles.
    pub edge_epsilon: (i64, i64),
    /// Value of a pattern when nothing is active.
    pub default_value: f64,
}

impl Default for LoomConfig {
    fn default() -> Self {
        Self {
            cycle_millis: 1000,
            tick_millis: 1,
            edge_epsilon: (1, 1000),
            default_value: 0.0,
        }
    }
}

impl LoomConfig {
    /// Parse a (possibly partial) JSON document; missing fields take their
    /// defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn edge_epsilon(&self) -> Fraction {
        let (numer, denom) = self.edge_epsilon;
        if denom == 0 {
            return Fraction::new(1, 1000);
        }
        Fraction::new(numer, denom).abs()
    }

    pub fn cycle_millis(&self) -> i64 {
        self.cycle_millis.max(1)
    }

    pub fn tick_millis(&self) -> i64 {
        self.tick_millis.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoomConfig::default();
        assert_eq!(config.cycle_millis(), 1000);
        assert_eq!(config.edge_epsilon(), Fraction::new(1, 1000));
    }

    #[test]
    fn test_partial_json() {
        let config = LoomConfig::from_json(r#"{ "cycle_millis": 2000 }"#).unwrap();
        assert_eq!(config.cycle_millis, 2000);
        assert_eq!(config.tick_millis, 1);
    }

    #[test]
    fn test_invalid_json() {
        assert!(LoomConfig::from_json("{ cycle_millis").is_err());
    }

    #[test]
    fn test_degenerate_values_are_clamped() {
        let config = LoomConfig {
            cycle_millis: 0,
            tick_millis: -5,
            edge_epsilon: (1, 0),
            ..LoomConfig::default()
        };
        assert_eq!(config.cycle_millis(), 1);
        assert_eq!(config.tick_millis(), 1);
        assert_eq!(config.edge_epsilon(), Fraction::new(1, 1000));
    }
}
