use crate::screen::{FormFactor, Mode, Point, PowerMode};
use crate::screens_controller::Config;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum StorageError {
    #[error("unable to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed configuration file {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Remembered settings of one physical display. The mode is kept by value
/// because mode indices change between connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredOptions {
    pub(crate) used: bool,
    pub(crate) top_left: Point,
    pub(crate) mode: Option<Mode>,
    pub(crate) scale: f64,
    pub(crate) form_factor: FormFactor,
    pub(crate) power_mode: PowerMode,
}

impl StoredOptions {
    pub(crate) fn from_config(config: &Config, modes: &[Mode]) -> Self {
        Self {
            used: config.used,
            top_left: config.top_left,
            mode: modes.get(config.current_mode_index).copied(),
            scale: config.scale,
            form_factor: config.form_factor,
            power_mode: config.power_mode,
        }
    }

    /// `None` when the remembered mode is not offered any more.
    pub(crate) fn to_config(&self, modes: &[Mode]) -> Option<Config> {
        let current_mode_index = match self.mode {
            Some(stored) => modes.iter().position(|mode| *mode == stored)?,
            None => 0,
        };
        Some(Config {
            used: self.used,
            top_left: self.top_left,
            current_mode_index,
            power_mode: self.power_mode,
            scale: self.scale,
            form_factor: self.form_factor,
        })
    }
}

/// JSON file of [`StoredOptions`] keyed by display id.
#[derive(Debug)]
pub(crate) struct ConfigStorage {
    path: PathBuf,
    displays: BTreeMap<String, StoredOptions>,
}

impl ConfigStorage {
    /// A missing file is an empty storage.
    pub(crate) fn open(path: &Path) -> Result<Self, StorageError> {
        let displays = match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Format {
                path: path.to_path_buf(),
                source,
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(StorageError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        log::debug!("Loaded {} display(s) from {}", displays.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            displays,
        })
    }

    pub(crate) fn load(&self, display_id: &str) -> Option<&StoredOptions> {
        self.displays.get(display_id)
    }

    pub(crate) fn save(&mut self, display_id: &str, options: StoredOptions) -> Result<(), StorageError> {
        self.displays.insert(display_id.to_string(), options);
        self.flush()
    }

    fn flush(&self) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(&self.displays).map_err(|source| StorageError::Format {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
