// The clip library: which clips exist, what they're called, and which chord
// plays them. Owns <root>/sounds and <root>/config.json.
//
// Every mutation saves right away. If the save fails the change stays in
// memory and the error goes back to the caller, so the next successful save
// picks it up.

use std::path::{Path, PathBuf};

use crate::error::{ConfigIoError, LibraryError};
use crate::hotkey::Chord;
use crate::shared::{CONFIG_FILE, ClipId, ClipRow, SOUNDS_DIR, SortOrder};

use super::persistence::{self, ConfigState, SoundEntry};

const IMPORTABLE: [&str; 2] = ["wav", "mp3"];

pub struct ClipLibrary {
    root: PathBuf,
    state: ConfigState,
}

impl ClipLibrary {
    pub fn open(root: &Path) -> Result<Self, ConfigIoError> {
        let state = persistence::load(&root.join(CONFIG_FILE))?;
        tracing::info!(
            root = %root.display(),
            clips = state.sounds.len(),
            hotkeys = state.hotkeys.len(),
            "clip library loaded"
        );
        Ok(Self {
            root: root.to_path_buf(),
            state,
        })
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.root.join(SOUNDS_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn len(&self) -> usize {
        self.state.sounds.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.state.sounds.is_empty()
    }

    pub fn get(&self, id: &ClipId) -> Option<&SoundEntry> {
        self.state.sounds.get(id)
    }

    // Where the clip file lives on disk; relative paths are under the root.
    pub fn path_of(&self, id: &ClipId) -> Option<PathBuf> {
        self.get(id).map(|entry| self.resolve(&entry.path))
    }

    pub fn binding(&self, id: &ClipId) -> Option<&Chord> {
        self.state.hotkeys.get(id)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&ClipId, &Chord)> {
        self.state.hotkeys.iter()
    }

    // ties keep id order
    pub fn sorted(&self, order: SortOrder) -> Vec<ClipRow> {
        let mut rows: Vec<ClipRow> = self
            .state
            .sounds
            .iter()
            .map(|(id, entry)| ClipRow {
                id: id.clone(),
                title: entry.title.clone(),
                favorite: entry.favorite,
                play_count: entry.play_count,
                chord: self.binding(id).map(Chord::to_string),
            })
            .collect();

        match order {
            SortOrder::NameAsc => rows.sort_by_key(|r| r.title.to_lowercase()),
            SortOrder::NameDesc => {
                rows.sort_by_key(|r| std::cmp::Reverse(r.title.to_lowercase()))
            }
            SortOrder::FavoritesFirst => {
                rows.sort_by_key(|r| (!r.favorite, r.title.to_lowercase()))
            }
            SortOrder::MostPlayed => rows.sort_by_key(|r| std::cmp::Reverse(r.play_count)),
        }
        rows
    }

    pub fn prune_missing(&mut self) -> Result<Vec<ClipId>, LibraryError> {
        let missing: Vec<ClipId> = self
            .state
            .sounds
            .iter()
            .filter(|(_, entry)| !self.resolve(&entry.path).exists())
            .map(|(id, _)| id.clone())
            .collect();
        if missing.is_empty() {
            return Ok(missing);
        }

        for id in &missing {
            tracing::warn!(clip = %id, "clip file missing, removing from library");
            self.state.sounds.remove(id);
            self.state.hotkeys.remove(id);
        }
        self.save()?;
        Ok(missing)
    }

    // keyed by file name; re-importing a known name replaces the file and
    // keeps title, favorite and play count
    pub fn import(&mut self, source: &Path) -> Result<ClipId, LibraryError> {
        let supported = source
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMPORTABLE.contains(&e.to_ascii_lowercase().as_str()));
        let file_name = source.file_name().and_then(|n| n.to_str());
        let (true, Some(file_name)) = (supported, file_name) else {
            return Err(LibraryError::UnsupportedFile(source.to_path_buf()));
        };

        let dir = self.sounds_dir();
        std::fs::create_dir_all(&dir).map_err(|e| LibraryError::file(&dir, e))?;
        let dest = dir.join(file_name);
        if source != dest {
            move_file(source, &dest)?;
        }

        let id = ClipId::new(file_name);
        let stored = Path::new(SOUNDS_DIR).join(file_name);
        self.state
            .sounds
            .entry(id.clone())
            .and_modify(|entry| entry.path = stored.clone())
            .or_insert_with(|| SoundEntry {
                path: stored,
                title: file_name.to_string(),
                favorite: false,
                play_count: 0,
            });
        tracing::info!(clip = %id, from = %source.display(), "clip imported");
        self.save()?;
        Ok(id)
    }

    pub fn remove(&mut self, id: &ClipId) -> Result<(), LibraryError> {
        let path = self
            .path_of(id)
            .ok_or_else(|| LibraryError::UnknownClip(id.clone()))?;
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(LibraryError::file(path, e)),
        }
        self.state.sounds.remove(id);
        self.state.hotkeys.remove(id);
        tracing::info!(clip = %id, "clip removed");
        self.save()?;
        Ok(())
    }

    pub fn rename(&mut self, id: &ClipId, title: &str) -> Result<(), LibraryError> {
        self.entry_mut(id)?.title = title.to_string();
        self.save()?;
        Ok(())
    }

    // Returns the new flag.
    pub fn toggle_favorite(&mut self, id: &ClipId) -> Result<bool, LibraryError> {
        let entry = self.entry_mut(id)?;
        entry.favorite = !entry.favorite;
        let favorite = entry.favorite;
        self.save()?;
        Ok(favorite)
    }

    // Returns the new count.
    pub fn record_play(&mut self, id: &ClipId) -> Result<u32, LibraryError> {
        let entry = self.entry_mut(id)?;
        entry.play_count = entry.play_count.saturating_add(1);
        let count = entry.play_count;
        self.save()?;
        Ok(count)
    }

    // None or an empty chord unbinds
    pub fn set_binding(&mut self, id: &ClipId, chord: Option<Chord>) -> Result<(), LibraryError> {
        if !self.state.sounds.contains_key(id) {
            return Err(LibraryError::UnknownClip(id.clone()));
        }
        match chord.filter(|c| !c.is_empty()) {
            Some(chord) => {
                self.state.hotkeys.insert(id.clone(), chord);
            }
            None => {
                self.state.hotkeys.remove(id);
            }
        }
        self.save()?;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigIoError> {
        persistence::save(&self.config_path(), &self.state)
    }

    fn entry_mut(&mut self, id: &ClipId) -> Result<&mut SoundEntry, LibraryError> {
        self.state
            .sounds
            .get_mut(id)
            .ok_or_else(|| LibraryError::UnknownClip(id.clone()))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

// rename() can't cross filesystems, so fall back to copy + delete.
fn move_file(from: &Path, to: &Path) -> Result<(), LibraryError> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(|e| LibraryError::file(from, e))?;
    std::fs::remove_file(from).map_err(|e| LibraryError::file(from, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn library() -> (TempDir, ClipLibrary) {
        let dir = tempdir().unwrap();
        let lib = ClipLibrary::open(dir.path()).unwrap();
        (dir, lib)
    }

    // A throwaway file outside the sounds dir, ready to import.
    fn incoming(dir: &TempDir, name: &str) -> PathBuf {
        let downloads = dir.path().join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();
        let path = downloads.join(name);
        std::fs::write(&path, b"RIFF").unwrap();
        path
    }

    #[test]
    fn test_import_moves_file_and_saves() {
        let (dir, mut lib) = library();
        let src = incoming(&dir, "boing.wav");

        let id = lib.import(&src).unwrap();
        assert_eq!(id, ClipId::new("boing.wav"));
        assert!(!src.exists());
        assert!(dir.path().join("sounds").join("boing.wav").exists());
        assert_eq!(lib.get(&id).unwrap().title, "boing.wav");

        let reopened = ClipLibrary::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.path_of(&id), lib.path_of(&id));
    }

    #[test]
    fn test_import_rejects_other_formats() {
        let (dir, mut lib) = library();
        let src = incoming(&dir, "notes.txt");
        assert!(matches!(
            lib.import(&src),
            Err(LibraryError::UnsupportedFile(_))
        ));
        assert!(src.exists());
        assert!(lib.is_empty());

        let upper = incoming(&dir, "LOUD.MP3");
        assert!(lib.import(&upper).is_ok());
    }

    #[test]
    fn test_reimport_keeps_stats() {
        let (dir, mut lib) = library();
        let id = lib.import(&incoming(&dir, "boing.wav")).unwrap();
        lib.record_play(&id).unwrap();
        lib.toggle_favorite(&id).unwrap();

        lib.import(&incoming(&dir, "boing.wav")).unwrap();
        let entry = lib.get(&id).unwrap();
        assert_eq!(entry.play_count, 1);
        assert!(entry.favorite);
    }

    #[test]
    fn test_remove_deletes_file_and_binding() {
        let (dir, mut lib) = library();
        let id = lib.import(&incoming(&dir, "boing.wav")).unwrap();
        lib.set_binding(&id, Some(Chord::from_keys(["Ctrl", "B"])))
            .unwrap();
        let path = lib.path_of(&id).unwrap();

        lib.remove(&id).unwrap();
        assert!(!path.exists());
        assert!(lib.get(&id).is_none());
        assert!(lib.binding(&id).is_none());
        assert!(matches!(
            lib.remove(&id),
            Err(LibraryError::UnknownClip(_))
        ));
    }

    #[test]
    fn test_prune_missing() {
        let (dir, mut lib) = library();
        let kept = lib.import(&incoming(&dir, "kept.wav")).unwrap();
        let gone = lib.import(&incoming(&dir, "gone.wav")).unwrap();
        lib.set_binding(&gone, Some(Chord::from_keys(["F1"]))).unwrap();
        std::fs::remove_file(lib.path_of(&gone).unwrap()).unwrap();

        assert_eq!(lib.prune_missing().unwrap(), vec![gone.clone()]);
        assert!(lib.get(&kept).is_some());
        assert!(lib.binding(&gone).is_none());

        let reopened = ClipLibrary::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_set_binding_empty_chord_removes() {
        let (dir, mut lib) = library();
        let id = lib.import(&incoming(&dir, "boing.wav")).unwrap();
        lib.set_binding(&id, Some(Chord::from_keys(["Ctrl", "A"])))
            .unwrap();
        assert_eq!(lib.binding(&id).unwrap().to_string(), "A+Ctrl");

        lib.set_binding(&id, Some(Chord::new())).unwrap();
        assert!(lib.binding(&id).is_none());

        assert!(matches!(
            lib.set_binding(&ClipId::new("nope"), None),
            Err(LibraryError::UnknownClip(_))
        ));
    }

    #[test]
    fn test_sort_orders() {
        let (dir, mut lib) = library();
        let a = lib.import(&incoming(&dir, "alpha.wav")).unwrap();
        let b = lib.import(&incoming(&dir, "Bravo.wav")).unwrap();
        let c = lib.import(&incoming(&dir, "charlie.wav")).unwrap();
        lib.toggle_favorite(&c).unwrap();
        lib.record_play(&b).unwrap();
        lib.record_play(&b).unwrap();
        lib.record_play(&a).unwrap();

        let ids = |order| -> Vec<ClipId> {
            lib.sorted(order).into_iter().map(|r| r.id).collect()
        };
        assert_eq!(ids(SortOrder::NameAsc), vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(ids(SortOrder::NameDesc), vec![c.clone(), b.clone(), a.clone()]);
        assert_eq!(ids(SortOrder::FavoritesFirst), vec![c.clone(), a.clone(), b.clone()]);
        assert_eq!(ids(SortOrder::MostPlayed), vec![b, a, c]);
    }

    #[test]
    fn test_failed_save_keeps_mutation() {
        let (dir, mut lib) = library();
        let id = lib.import(&incoming(&dir, "boing.wav")).unwrap();

        // a directory where the config file should be makes every write fail
        let config = lib.config_path();
        std::fs::remove_file(&config).unwrap();
        std::fs::create_dir(&config).unwrap();

        assert!(matches!(
            lib.toggle_favorite(&id),
            Err(LibraryError::Save(_))
        ));
        assert!(lib.get(&id).unwrap().favorite);

        std::fs::remove_dir(&config).unwrap();
        lib.rename(&id, "Boing!").unwrap();
        let reopened = ClipLibrary::open(dir.path()).unwrap();
        let entry = reopened.get(&id).unwrap();
        assert!(entry.favorite);
        assert_eq!(entry.title, "Boing!");
    }
}
