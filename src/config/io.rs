use std::env::{current_exe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use directories_next::{ProjectDirs};
use tokio::fs::{File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use serde_json;
use fd_lock::{RwLock, RwLockWriteGuard};
use log::{info, warn};
use std::fs::OpenOptions;
use std::str;

use crate::config::types::Preferences;
use crate::error::ConfigError;

// creates a path to trailer-monitor.json in the same directory as the executable
// this could be useful for usb sticks
fn get_portable_config_path() -> Option<PathBuf> {
    match current_exe() {
        Ok(mut path) => {
            // /opt/trailer-monitor => /opt/trailer-monitor.json
            if !path.set_extension("json") {
                warn!("current exe has no filename: {}", path.to_string_lossy());
                return None
            }

            Some(path)
        },
        Err(err) => {
            warn!("failed to get current exe path: {:?}", err);
            None
        },
    }
}

// creates a path to trailer-monitor.json in an os dependent standard directory, such as
// ~/.config/trailer-monitor on linux.
fn get_local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "example", "trailer-monitor").map(|dirs| {
        dirs.config_dir().join("trailer-monitor.json")
    })
}

fn get_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = get_portable_config_path() {
        match std::fs::metadata(&path) {
            Ok(attr) => {
                if attr.is_file() {
                    return Ok(path);
                }
            }
            Err(err) => {
                info!("No portable settings at {}; Using local path instead. ({})", path.to_string_lossy(), err);
            },
        }
    }

    match get_local_config_path() {
        None => Err(ConfigError::NoConfigPath),
        Some(path) => Ok(path),
    }
}

pub struct ConfigIOLocker {
    rw_lock: RwLock<std::fs::File>,
}

impl ConfigIOLocker {
    pub fn lock(&mut self) -> Result<RwLockWriteGuard<std::fs::File>, ConfigError> {
        self.rw_lock.try_write().map_err(|source| ConfigError::CanNotLock { source })
    }
}

struct ConfigIOInner {
    file: std::fs::File,
}

/// Handle to the settings file. Clones share the same open file.
#[derive(Clone)]
pub struct ConfigIO {
    inner: Arc<Mutex<ConfigIOInner>>,
}

impl ConfigIO {
    /// Opens the settings file at the default location (portable or per-user).
    pub fn new_sync() -> Result<Self, ConfigError> {
        let path = get_config_path()?;
        Self::open_sync(&path)
    }

    /// Opens (creating if needed) the settings file at `path`.
    pub fn open_sync(path: &Path) -> Result<Self, ConfigError> {
        info!("Using settings file {}", path.to_string_lossy());

        if let Some(directory) = path.parent() {
            if !directory.as_os_str().is_empty() {
                std::fs::create_dir_all(directory)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .append(false)
            .create(true)
            .open(path)?;

        let inner = ConfigIOInner { file };
        Ok(ConfigIO { inner: Arc::new(Mutex::new(inner)) })
    }

    // obtain an exclusive file lock so that this settings file is used by only one instance of
    // the monitor.
    pub fn locker(&mut self) -> Result<ConfigIOLocker, ConfigError> {
        let inner = self.lock_inner();

        Ok(ConfigIOLocker {
            rw_lock: RwLock::new(inner.file.try_clone()?),
        })
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, ConfigIOInner> {
        // the inner state is never left half-updated, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // The File returned from here should never be closed!
    fn get_file(&self) -> Result<File, ConfigError> {
        let inner = self.lock_inner();
        let file = inner.file.try_clone()?; // std File
        Ok(File::from_std(file)) // tokio File
    }

    pub async fn read(&self) -> Result<Preferences, ConfigError> {
        let mut file = self.get_file()?;
        info!("Reading settings file");

        let mut content = vec![];
        file.rewind().await?;
        file.read_to_end(&mut content).await?;

        if content.is_empty() {
            return Ok(Preferences::default());
        }

        let content = str::from_utf8(&content)?;
        Ok(serde_json::from_str(content)?)
    }

    pub async fn save(&self, preferences: &Preferences) -> Result<(), ConfigError> {
        let mut file = self.get_file()?;
        info!("Saving settings");

        let content = serde_json::to_string_pretty(preferences)?;
        file.rewind().await?;
        file.set_len(0).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
