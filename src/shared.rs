// Types and constants shared between the audio side, the hotkey side and the tui.
//
// The whole pipeline runs on one fixed sample format: mono, signed 16-bit,
// 44.1kHz. Capture, clip playback and both outputs all use it, nothing is
// resampled anywhere. A clip recorded at another rate plays pitch-shifted.
//
// Key plan for the terminal front end:
//   Up / Down     //  move the clip selection
//   Enter         //  play the selected clip
//   F2            //  capture a chord for the selected clip
//                 //    (Enter = accept, Backspace = reset, Esc = cancel)
//   F3            //  rename the selected clip
//                 //    (type the title, Enter = accept, Esc = cancel)
//   F4            //  toggle favorite
//   F6            //  cycle sort order
//   Delete        //  remove the selected clip
//   Tab           //  cycle through the valid virtual cables
//   Esc           //  quit
//
// Every key event is also handed to the hotkey matcher, so any chord bound to
// a clip fires no matter what the tui does with the key. Typing a title is
// the exception: those presses never reach the matcher.

use serde::{Deserialize, Serialize};

pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u16 = 1;
pub const BUFFER_SIZE: u32 = 1024; // frames per callback

pub const SOUNDS_DIR: &str = "sounds";
pub const CONFIG_FILE: &str = "config.json";
pub const LOG_FILE: &str = "virt-soundboard.log";

// Clips are identified by the file name they were imported under.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// What the tui asks the middle layer to do, resolved from raw keys.
#[derive(Clone, Debug, PartialEq)]
pub enum UiAction {
    SelectUp,
    SelectDown,
    PlaySelected,
    BeginCapture,
    AcceptCapture,
    ResetCapture,
    CancelCapture,
    BeginRename,
    RenameInput(char),
    RenameBackspace,
    AcceptRename,
    CancelRename,
    ToggleFavorite,
    CycleSort,
    DeleteSelected,
    CycleVirtualCable,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NameAsc,
    NameDesc,
    FavoritesFirst,
    MostPlayed,
}

impl SortOrder {
    pub fn next(self) -> Self {
        match self {
            SortOrder::NameAsc => SortOrder::NameDesc,
            SortOrder::NameDesc => SortOrder::FavoritesFirst,
            SortOrder::FavoritesFirst => SortOrder::MostPlayed,
            SortOrder::MostPlayed => SortOrder::NameAsc,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortOrder::NameAsc => "Name (A-Z)",
            SortOrder::NameDesc => "Name (Z-A)",
            SortOrder::FavoritesFirst => "Favorites First",
            SortOrder::MostPlayed => "Most Played",
        }
    }
}

// One row of the clip list, as the tui draws it.
#[derive(Clone, Debug)]
pub struct ClipRow {
    pub id: ClipId,
    pub title: String,
    pub favorite: bool,
    pub play_count: u32,
    pub chord: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct DisplayState {
    pub clips: Vec<ClipRow>,
    pub selected: usize,
    pub sort: SortOrder,
    pub router_state: String,
    pub virtual_cable: Option<String>,
    pub playing: bool,
    pub capturing: Option<String>, // chord captured so far while in capture mode
    pub renaming: Option<String>,  // title being typed
    pub status: Option<String>,    // last warning or error worth showing
}
