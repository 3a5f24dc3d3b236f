// Sits between the tui and everything else. Key events go to the hotkey
// matcher, matches and explicit plays become loader requests, and the
// library is kept in step with whatever the user changes.
//
// Device routing is not handled here; main owns the router.

use crossterm::event::KeyEvent;

use crate::audio::PlaybackQueue;
use crate::hotkey::{HotkeyMatcher, KeyInput};
use crate::loader::ClipLoader;
use crate::pipeline::ClipLibrary;
use crate::shared::{ClipId, DisplayState, SortOrder, UiAction};
use crate::tui::input::{self, InputEvent};
use crate::tui::mode::TuiState;

pub struct Middle {
    library: ClipLibrary,
    matcher: HotkeyMatcher,
    queue: PlaybackQueue,
    loader: ClipLoader,
    sort: SortOrder,
    selected: usize,
    capture_target: Option<ClipId>,
    rename: Option<(ClipId, String)>, // clip and the title typed so far
    status: Option<String>,
}

impl Middle {
    pub fn new(library: ClipLibrary, queue: PlaybackQueue, loader: ClipLoader) -> Self {
        let mut matcher = HotkeyMatcher::new();
        for (id, chord) in library.bindings() {
            matcher.bind(id.clone(), chord.clone());
        }
        Self {
            library,
            matcher,
            queue,
            loader,
            sort: SortOrder::default(),
            selected: 0,
            capture_target: None,
            rename: None,
            status: None,
        }
    }

    #[cfg(test)]
    pub fn library(&self) -> &ClipLibrary {
        &self.library
    }

    pub fn is_capturing(&self) -> bool {
        self.matcher.is_capturing()
    }

    pub fn is_renaming(&self) -> bool {
        self.rename.is_some()
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    // One poll's worth of keys, in order. The tui modes are refreshed before
    // every key, since a key that starts a capture or a rename changes what
    // the next one means. Returns what main handles itself; keys after Quit
    // are dropped.
    pub fn handle_keys(&mut self, keys: Vec<KeyEvent>, ts: &mut TuiState) -> Vec<UiAction> {
        let mut for_main = Vec::new();
        for key in keys {
            self.sync_modes(ts);
            for event in input::translate(key, ts) {
                match event {
                    InputEvent::Key(k) => self.handle_key(k),
                    InputEvent::Action(UiAction::Quit) => {
                        for_main.push(UiAction::Quit);
                        return for_main;
                    }
                    InputEvent::Action(UiAction::CycleVirtualCable) => {
                        for_main.push(UiAction::CycleVirtualCable)
                    }
                    InputEvent::Action(action) => self.handle_action(action),
                }
            }
        }
        self.sync_modes(ts);
        for_main
    }

    fn sync_modes(&self, ts: &mut TuiState) {
        ts.capturing = self.is_capturing();
        ts.renaming = self.is_renaming();
    }

    pub fn handle_key(&mut self, input: KeyInput) {
        if input.pressed {
            if let Some(id) = self.matcher.on_key_down(input.token) {
                self.play(&id);
            }
        } else {
            self.matcher.on_key_up(&input.token);
        }
    }

    // CycleVirtualCable and Quit belong to main and are ignored here.
    pub fn handle_action(&mut self, action: UiAction) {
        match action {
            UiAction::SelectUp => self.selected = self.selected.saturating_sub(1),
            UiAction::SelectDown => {
                if self.selected + 1 < self.library.len() {
                    self.selected += 1;
                }
            }
            UiAction::PlaySelected => {
                if let Some(id) = self.selected_clip() {
                    self.play(&id);
                }
            }
            UiAction::BeginCapture => self.begin_capture(),
            UiAction::AcceptCapture => self.accept_capture(),
            UiAction::ResetCapture => self.matcher.reset(),
            UiAction::CancelCapture => {
                self.matcher.end_capture();
                self.capture_target = None;
            }
            UiAction::BeginRename => self.begin_rename(),
            UiAction::RenameInput(c) => {
                if let Some((_, title)) = self.rename.as_mut() {
                    if !c.is_control() {
                        title.push(c);
                    }
                }
            }
            UiAction::RenameBackspace => {
                if let Some((_, title)) = self.rename.as_mut() {
                    title.pop();
                }
            }
            UiAction::AcceptRename => self.accept_rename(),
            UiAction::CancelRename => self.rename = None,
            UiAction::ToggleFavorite => {
                if let Some(id) = self.selected_clip() {
                    if let Err(e) = self.library.toggle_favorite(&id) {
                        self.report(e);
                    }
                }
            }
            UiAction::CycleSort => {
                let current = self.selected_clip();
                self.sort = self.sort.next();
                // keep the same clip selected
                if let Some(id) = current {
                    if let Some(i) = self.rows_position(&id) {
                        self.selected = i;
                    }
                }
            }
            UiAction::DeleteSelected => self.delete_selected(),
            UiAction::CycleVirtualCable | UiAction::Quit => {}
        }
    }

    pub fn play(&mut self, id: &ClipId) {
        let Some(path) = self.library.path_of(id) else {
            self.set_status(format!("unknown clip {id}"));
            return;
        };
        if let Err(e) = self.library.record_play(id) {
            self.report(e);
        }
        self.loader.request(id.clone(), path);
    }

    pub fn selected_clip(&self) -> Option<ClipId> {
        self.library
            .sorted(self.sort)
            .into_iter()
            .nth(self.selected)
            .map(|row| row.id)
    }

    pub fn display_state(&self) -> DisplayState {
        let clips = self.library.sorted(self.sort);
        let selected = self.selected.min(clips.len().saturating_sub(1));
        DisplayState {
            clips,
            selected,
            sort: self.sort,
            playing: self.queue.is_active(),
            capturing: self
                .matcher
                .is_capturing()
                .then(|| self.matcher.captured().to_string()),
            renaming: self.rename.as_ref().map(|(_, title)| title.clone()),
            status: self.status.clone(),
            ..DisplayState::default()
        }
    }

    fn begin_capture(&mut self) {
        let Some(id) = self.selected_clip() else {
            self.set_status("no clip selected");
            return;
        };
        self.matcher.begin_capture();
        self.capture_target = Some(id);
    }

    // An empty capture clears the clip's chord.
    fn accept_capture(&mut self) {
        let chord = self.matcher.end_capture();
        let Some(id) = self.capture_target.take() else {
            return;
        };

        self.matcher.bind(id.clone(), chord.clone());
        if let Some((a, b)) = self
            .matcher
            .conflicts()
            .into_iter()
            .find(|(a, b)| *a == id || *b == id)
        {
            self.set_status(format!("{a} and {b} share the chord {chord}"));
        }
        if let Err(e) = self.library.set_binding(&id, Some(chord)) {
            self.report(e);
        }
    }

    // starts from the current title
    fn begin_rename(&mut self) {
        let Some(id) = self.selected_clip() else {
            self.set_status("no clip selected");
            return;
        };
        let title = self
            .library
            .get(&id)
            .map(|entry| entry.title.clone())
            .unwrap_or_default();
        self.rename = Some((id, title));
    }

    fn accept_rename(&mut self) {
        let Some((id, title)) = self.rename.take() else {
            return;
        };
        let title = title.trim();
        if title.is_empty() {
            self.set_status("a clip title can't be empty");
            return;
        }
        if let Err(e) = self.library.rename(&id, title) {
            self.report(e);
        }
        // the new title can move the clip under a name sort
        if let Some(i) = self.rows_position(&id) {
            self.selected = i;
        }
    }

    fn delete_selected(&mut self) {
        let Some(id) = self.selected_clip() else {
            return;
        };
        match self.library.remove(&id) {
            Ok(()) => {
                self.matcher.unbind(&id);
            }
            Err(e) => {
                // the entry is gone from memory even if saving failed
                if self.library.get(&id).is_none() {
                    self.matcher.unbind(&id);
                }
                self.report(e);
            }
        }
        self.selected = self.selected.min(self.library.len().saturating_sub(1));
    }

    fn rows_position(&self, id: &ClipId) -> Option<usize> {
        self.library
            .sorted(self.sort)
            .iter()
            .position(|row| &row.id == id)
    }

    fn report(&mut self, err: impl std::fmt::Display) {
        tracing::warn!(error = %err, "library operation failed");
        self.set_status(err.to_string());
    }

    #[cfg(test)]
    fn binding(&self, id: &ClipId) -> Option<&crate::hotkey::Chord> {
        self.matcher.binding(id)
    }
}
