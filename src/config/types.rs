use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/**
 * Settings key under which the critical angle is persisted.
 */
pub const CRITICAL_ANGLE_KEY: &str = "critical_angle";

/**
 * Critical angle (degrees) used when nothing has been persisted yet.
 */
pub const DEFAULT_CRITICAL_ANGLE: f32 = 15.0;

/// Flat key-value settings, stored as a JSON object of floats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences {
    values: BTreeMap<String, f32>,
}

impl Preferences {
    pub fn get_float(&self, key: &str, default: f32) -> f32 {
        self.values.get(key).copied().unwrap_or(default)
    }

    pub fn put_float(&mut self, key: &str, value: f32) {
        self.values.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_returns_default() {
        let prefs = Preferences::default();
        assert_eq!(prefs.get_float(CRITICAL_ANGLE_KEY, DEFAULT_CRITICAL_ANGLE), 15.0);
    }

    #[test]
    fn put_overwrites() {
        let mut prefs = Preferences::default();
        prefs.put_float(CRITICAL_ANGLE_KEY, 20.0);
        prefs.put_float(CRITICAL_ANGLE_KEY, 12.5);
        assert_eq!(prefs.get_float(CRITICAL_ANGLE_KEY, DEFAULT_CRITICAL_ANGLE), 12.5);
    }

    #[test]
    fn serializes_as_flat_object() {
        let mut prefs = Preferences::default();
        prefs.put_float(CRITICAL_ANGLE_KEY, 10.0);
        let json = serde_json::to_string(&prefs).unwrap();
        assert_eq!(json, r#"{"critical_angle":10.0}"#);

        let parsed: Preferences = serde_json::from_str(r#"{"critical_angle": 22.5, "other": 1}"#).unwrap();
        assert_eq!(parsed.get_float(CRITICAL_ANGLE_KEY, DEFAULT_CRITICAL_ANGLE), 22.5);
        assert_eq!(parsed.get_float("other", 0.0), 1.0);
    }
}
