// A binding fires on the key down that makes the held set exactly equal to
// its chord. Holding it, auto-repeat or re-pressing a held key never fires
// again; any release re-arms.

use std::collections::{BTreeMap, BTreeSet};

use super::token::{Chord, KeyToken};
use crate::shared::ClipId;

// Transient key set used while the user records a chord for a clip.
#[derive(Debug, Default)]
struct Capture {
    held: BTreeSet<KeyToken>,
    chord: BTreeSet<KeyToken>, // everything held at the last key down
}

// no locking, owned by whatever delivers key events
#[derive(Debug, Default)]
pub struct HotkeyMatcher {
    pressed: BTreeSet<KeyToken>,
    bindings: BTreeMap<ClipId, Chord>,
    matched: Option<ClipId>,
    capture: Option<Capture>,
}

impl HotkeyMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    // with equal chords the smallest clip id wins, see conflicts()
    pub fn on_key_down(&mut self, token: KeyToken) -> Option<ClipId> {
        if let Some(capture) = self.capture.as_mut() {
            capture.held.insert(token);
            capture.chord = capture.held.clone();
            return None;
        }

        if !self.pressed.insert(token) {
            // already held: the set didn't change, so neither did the match
            return None;
        }

        let hit = self
            .bindings
            .iter()
            .find(|(_, chord)| chord.matches(&self.pressed))
            .map(|(id, _)| id.clone());
        self.matched = hit.clone();
        hit
    }

    pub fn on_key_up(&mut self, token: &KeyToken) {
        if let Some(capture) = self.capture.as_mut() {
            capture.held.remove(token);
        }
        self.pressed.remove(token);
        self.matched = None;
    }

    #[cfg(test)]
    pub fn pressed(&self) -> &BTreeSet<KeyToken> {
        &self.pressed
    }

    #[cfg(test)]
    pub fn current_match(&self) -> Option<&ClipId> {
        self.matched.as_ref()
    }

    // replaces the clip's previous chord; an empty chord unbinds
    pub fn bind(&mut self, clip_id: ClipId, chord: Chord) {
        if chord.is_empty() {
            self.unbind(&clip_id);
            return;
        }
        if let Some((other, _)) = self
            .bindings
            .iter()
            .find(|(id, existing)| **id != clip_id && **existing == chord)
        {
            tracing::warn!(
                clip = %clip_id,
                other = %other,
                chord = %chord,
                "chord already bound to another clip"
            );
        }
        self.bindings.insert(clip_id, chord);
    }

    pub fn unbind(&mut self, clip_id: &ClipId) -> Option<Chord> {
        if self.matched.as_ref() == Some(clip_id) {
            self.matched = None;
        }
        self.bindings.remove(clip_id)
    }

    pub fn binding(&self, clip_id: &ClipId) -> Option<&Chord> {
        self.bindings.get(clip_id)
    }

    pub fn conflicts(&self) -> Vec<(ClipId, ClipId)> {
        let mut pairs = Vec::new();
        let entries: Vec<_> = self.bindings.iter().collect();
        for (i, (a, chord_a)) in entries.iter().enumerate() {
            for (b, chord_b) in &entries[i + 1..] {
                if chord_a == chord_b {
                    pairs.push(((*a).clone(), (*b).clone()));
                }
            }
        }
        pairs
    }

    // ── Capture mode ──────────────────────────────────────────────

    // until end_capture, presses only feed the transient set
    pub fn begin_capture(&mut self) {
        self.capture = Some(Capture::default());
        self.matched = None;
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    pub fn captured(&self) -> Chord {
        self.capture
            .as_ref()
            .map(|c| Chord::from(c.chord.clone()))
            .unwrap_or_default()
    }

    // capture mode stays on
    pub fn reset(&mut self) {
        if let Some(capture) = self.capture.as_mut() {
            capture.held.clear();
            capture.chord.clear();
        }
    }

    // Keys still down when capture ends count as held, without firing, so
    // a modifier kept down through the capture can start the next chord.
    pub fn end_capture(&mut self) -> Chord {
        let Some(capture) = self.capture.take() else {
            return Chord::new();
        };
        self.pressed.extend(capture.held);
        self.matched = None;
        Chord::from(capture.chord)
    }
}
