// Errors, split by who can recover from them.
//
// DeviceError and DecodeError happen on the control path, never inside the
// audio callback. StreamWriteError is never raised in the callback either: the
// callback only counts skipped buffers and the control loop turns the counts
// into these for logging. ConfigIoError and LibraryError surface persistence
// failures while the in-memory state is kept.

use std::path::PathBuf;

use crate::audio::RouterState;
use crate::shared::ClipId;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device not found: {name}")]
    NotFound { name: String },

    #[error("no default {direction} device configured")]
    NoDefaultDevice { direction: &'static str }, // "input" or "output"

    #[error("failed to enumerate audio devices: {0}")]
    Enumerate(String),

    // the device exists but a stream couldn't be built or started on it
    #[error("cannot open {role} stream on '{name}': {reason}")]
    Open {
        role: &'static str,
        name: String,
        reason: String,
    },

    #[error("cannot {operation} while router is {state:?}")]
    InvalidState {
        state: RouterState,
        operation: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported clip format: {path}")]
    Unsupported { path: PathBuf },

    #[error("invalid wav file {path}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("cannot decode {path}: {reason}")]
    Codec { path: PathBuf, reason: String },
}

// An output couldn't take a mixed buffer, so it was skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{output} output skipped {skipped} buffer(s): ring buffer full")]
pub struct StreamWriteError {
    pub output: &'static str,
    pub skipped: u64, // since the last report
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigIoError {
    #[error("config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("unknown clip: {0}")]
    UnknownClip(ClipId),

    // only wav and mp3 can be imported
    #[error("unsupported clip file: {0}")]
    UnsupportedFile(PathBuf),

    // moving or deleting a clip file failed
    #[error("file operation on {path} failed: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // applied in memory, but not saved
    #[error(transparent)]
    Save(#[from] ConfigIoError),
}

impl LibraryError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}
