use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use log::{error, info};
use tokio::sync::Mutex;

use crate::config::io::ConfigIO;
use crate::config::types::{Preferences, CRITICAL_ANGLE_KEY, DEFAULT_CRITICAL_ANGLE};
use crate::error::{ConfigError, ThresholdError};

/// Critical tilt angle in degrees. Always finite and greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f32);

impl Threshold {
    pub fn new(degrees: f32) -> Result<Self, ThresholdError> {
        if !degrees.is_finite() {
            return Err(ThresholdError::NotFinite);
        }
        if degrees <= 0.0 {
            return Err(ThresholdError::NotPositive(degrees));
        }
        Ok(Threshold(degrees))
    }

    pub fn degrees(&self) -> f32 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold(DEFAULT_CRITICAL_ANGLE)
    }
}

impl FromStr for Threshold {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let degrees = s.trim().parse::<f32>()?;
        Threshold::new(degrees)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.0)
    }
}

struct Persistence {
    config_io: ConfigIO,
    preferences: Mutex<Preferences>,
}

/// Shared critical angle.
///
/// Reads are a single atomic load, so the link can consult the store for every reading. `set`
/// makes the new value visible before it is written to disk.
#[derive(Clone)]
pub struct ThresholdStore {
    current: Arc<AtomicU32>,
    persistence: Option<Arc<Persistence>>,
}

impl ThresholdStore {
    pub fn in_memory(value: Threshold) -> Self {
        ThresholdStore {
            current: Arc::new(AtomicU32::new(value.degrees().to_bits())),
            persistence: None,
        }
    }

    /// Loads the persisted critical angle, falling back to the default if the stored value is
    /// missing or invalid.
    pub async fn load(config_io: ConfigIO) -> Result<Self, ConfigError> {
        let preferences = match config_io.read().await {
            Ok(preferences) => preferences,
            Err(err) if err.is_file_not_found_error() => {
                info!("Settings file not found, using defaults");
                Preferences::default()
            },
            Err(err) => return Err(err),
        };

        let stored = preferences.get_float(CRITICAL_ANGLE_KEY, DEFAULT_CRITICAL_ANGLE);
        let value = Threshold::new(stored).unwrap_or_else(|err| {
            error!("Ignoring stored critical angle: {}", err);
            Threshold::default()
        });
        info!("Critical angle: {}", value);

        Ok(ThresholdStore {
            current: Arc::new(AtomicU32::new(value.degrees().to_bits())),
            persistence: Some(Arc::new(Persistence {
                config_io,
                preferences: Mutex::new(preferences),
            })),
        })
    }

    pub fn get(&self) -> Threshold {
        Threshold(f32::from_bits(self.current.load(Ordering::Acquire)))
    }

    pub async fn set(&self, value: Threshold) -> Result<(), ConfigError> {
        let Some(persistence) = &self.persistence else {
            self.current.store(value.degrees().to_bits(), Ordering::Release);
            info!("Critical angle updated: {}", value);
            return Ok(());
        };

        // memory and disk are updated under the same lock so they agree on the last writer
        let mut preferences = persistence.preferences.lock().await;
        self.current.store(value.degrees().to_bits(), Ordering::Release);
        info!("Critical angle updated: {}", value);

        preferences.put_float(CRITICAL_ANGLE_KEY, value.degrees());
        if let Err(err) = persistence.config_io.save(&preferences).await {
            error!("Failed to persist critical angle: {}", err);
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_valid_input() {
        assert_eq!("12.5".parse::<Threshold>().unwrap().degrees(), 12.5);
        assert_eq!(" 20 \n".parse::<Threshold>().unwrap().degrees(), 20.0);
    }

    #[test]
    fn rejects_invalid_input() {
        assert_matches!("abc".parse::<Threshold>(), Err(ThresholdError::NotANumber { .. }));
        assert_matches!("".parse::<Threshold>(), Err(ThresholdError::NotANumber { .. }));
        assert_matches!("NaN".parse::<Threshold>(), Err(ThresholdError::NotFinite));
        assert_matches!("inf".parse::<Threshold>(), Err(ThresholdError::NotFinite));
        assert_matches!("0".parse::<Threshold>(), Err(ThresholdError::NotPositive(_)));
        assert_matches!("-5".parse::<Threshold>(), Err(ThresholdError::NotPositive(_)));
    }

    #[test]
    fn default_is_fifteen_degrees() {
        assert_eq!(Threshold::default().degrees(), 15.0);
    }

    #[tokio::test]
    async fn set_is_visible_to_clones() {
        let store = ThresholdStore::in_memory(Threshold::default());
        let link_view = store.clone();

        store.set(Threshold::new(10.0).unwrap()).await.unwrap();
        assert_eq!(link_view.get().degrees(), 10.0);
    }

    #[tokio::test]
    async fn persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = ThresholdStore::load(ConfigIO::open_sync(&path).unwrap()).await.unwrap();
        assert_eq!(store.get(), Threshold::default());
        store.set(Threshold::new(7.5).unwrap()).await.unwrap();
        drop(store);

        let reloaded = ThresholdStore::load(ConfigIO::open_sync(&path).unwrap()).await.unwrap();
        assert_eq!(reloaded.get().degrees(), 7.5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_sets_leave_memory_and_disk_in_agreement() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = ThresholdStore::load(ConfigIO::open_sync(&path).unwrap()).await.unwrap();

        let handles: Vec<_> = (1..=20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.set(Threshold::new(i as f32).unwrap()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let in_memory = store.get();
        drop(store);
        let reloaded = ThresholdStore::load(ConfigIO::open_sync(&path).unwrap()).await.unwrap();
        assert_eq!(reloaded.get(), in_memory);
    }

    #[tokio::test]
    async fn invalid_stored_value_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"critical_angle": -3.0}"#).unwrap();

        let store = ThresholdStore::load(ConfigIO::open_sync(&path).unwrap()).await.unwrap();
        assert_eq!(store.get(), Threshold::default());
    }
}
