// Reads and writes <root>/config.json. The core treats it as a plain key-value
// store: clip id -> {path, title, favorite, play_count}, clip id -> chord.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigIoError;
use crate::hotkey::Chord;
use crate::shared::ClipId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoundEntry {
    pub path: PathBuf,
    pub title: String,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub play_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredConfig")]
pub struct ConfigState {
    pub sounds: BTreeMap<ClipId, SoundEntry>,
    pub hotkeys: BTreeMap<ClipId, Chord>,
}

// What may be on disk. Old configs stored a bare path per sound.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSound {
    Entry(SoundEntry),
    LegacyPath(PathBuf),
}

#[derive(Deserialize)]
struct StoredConfig {
    #[serde(default)]
    sounds: BTreeMap<ClipId, StoredSound>,
    #[serde(default)]
    hotkeys: BTreeMap<ClipId, Chord>,
}

impl From<StoredConfig> for ConfigState {
    fn from(stored: StoredConfig) -> Self {
        let sounds = stored
            .sounds
            .into_iter()
            .map(|(id, sound)| {
                let entry = match sound {
                    StoredSound::Entry(entry) => entry,
                    StoredSound::LegacyPath(path) => SoundEntry {
                        path,
                        title: id.to_string(),
                        favorite: false,
                        play_count: 0,
                    },
                };
                (id, entry)
            })
            .collect();
        let hotkeys = stored
            .hotkeys
            .into_iter()
            .filter(|(_, chord)| !chord.is_empty())
            .collect();
        Self { sounds, hotkeys }
    }
}

// A missing file is an empty library, not an error.
pub fn load(path: &Path) -> Result<ConfigState, ConfigIoError> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigState::default()),
        Err(source) => {
            return Err(ConfigIoError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&data).map_err(|source| ConfigIoError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// Save the state to disk, making the parent dir if it doesn't exist already
pub fn save(path: &Path, state: &ConfigState) -> Result<(), ConfigIoError> {
    let io_err = |source| ConfigIoError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(state).map_err(ConfigIoError::Serialize)?;
    std::fs::write(path, json).map_err(io_err)
}
