// The single playback slot shared between the control path and the audio callback.
//
// Cursors move into the callback over a bounded channel, nothing is locked
// across the real-time deadline. The callback keeps only the newest cursor
// (last trigger wins) and sends replaced or finished ones back so their
// buffers get freed off the audio thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::clip::Clip;
use crate::shared::ClipId;

// Pending cursors waiting for the callback; more than this is never useful
// since only the newest one survives.
const PENDING_CAPACITY: usize = 4;
const RETIRED_CAPACITY: usize = 16;

// read position into one clip's samples
#[derive(Debug)]
pub struct PlaybackCursor {
    clip_id: ClipId,
    samples: Vec<i16>,
    pos: usize,
}

impl PlaybackCursor {
    pub fn new(clip: Clip) -> Self {
        Self {
            clip_id: clip.id,
            samples: clip.samples,
            pos: 0,
        }
    }

    #[cfg(test)]
    pub fn clip_id(&self) -> &ClipId {
        &self.clip_id
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.samples.len()
    }

    // Copies up to out.len() samples and advances.
    fn read_into(&mut self, out: &mut [i16]) -> usize {
        let n = out.len().min(self.remaining());
        out[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
        self.pos += n;
        n
    }
}

// control side: triggers clips and reports whether one is playing.
// every clone feeds the same slot
#[derive(Clone)]
pub struct PlaybackQueue {
    tx: Sender<PlaybackCursor>,
    pending_rx: Receiver<PlaybackCursor>,
    retired_tx: Sender<PlaybackCursor>,
    retired_rx: Receiver<PlaybackCursor>,
    active: Arc<AtomicBool>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        let (tx, pending_rx) = crossbeam_channel::bounded(PENDING_CAPACITY);
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(RETIRED_CAPACITY);
        Self {
            tx,
            pending_rx,
            retired_tx,
            retired_rx,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    // replaces whatever is playing, no queueing and no crossfade
    pub fn set_active(&self, clip: Clip) {
        self.collect_retired();
        let cursor = PlaybackCursor::new(clip);
        self.active.store(true, Ordering::Release);

        if let Err(TrySendError::Full(cursor)) = self.tx.try_send(cursor) {
            // The callback isn't draining (router stopped or stalled). Older
            // pending cursors would lose to this one anyway.
            let _ = self.pending_rx.try_recv();
            let _ = self.tx.try_send(cursor);
        }
    }

    // may lag the callback by one buffer period
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    // one slot per running stream; the router drops the old one first
    pub fn slot(&self) -> PlaybackSlot {
        PlaybackSlot {
            rx: self.pending_rx.clone(),
            retired_tx: self.retired_tx.clone(),
            active: Arc::clone(&self.active),
            current: None,
        }
    }

    // Called once the slot's owner is gone. Triggers nobody picked up yet
    // die with it, the next slot starts silent.
    pub(crate) fn mark_idle(&self) {
        while self.pending_rx.try_recv().is_ok() {}
        self.collect_retired();
        self.active.store(false, Ordering::Release);
    }

    // Frees cursors the callback has given back.
    fn collect_retired(&self) {
        while let Ok(cursor) = self.retired_rx.try_recv() {
            tracing::trace!(clip = %cursor.clip_id, left = cursor.remaining(), "cursor retired");
        }
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

// callback side, never allocates or blocks
pub struct PlaybackSlot {
    rx: Receiver<PlaybackCursor>,
    retired_tx: Sender<PlaybackCursor>,
    active: Arc<AtomicBool>,
    current: Option<PlaybackCursor>,
}

impl PlaybackSlot {
    pub fn refresh(&mut self) {
        while let Ok(cursor) = self.rx.try_recv() {
            if let Some(old) = self.current.replace(cursor) {
                self.retire(old);
            }
            self.active.store(true, Ordering::Release);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    #[cfg(test)]
    pub fn current_clip(&self) -> Option<&ClipId> {
        self.current.as_ref().map(PlaybackCursor::clip_id)
    }

    // Returns how many samples were written, the caller zero-pads the rest.
    pub fn pull_into(&mut self, out: &mut [i16]) -> usize {
        let Some(cursor) = self.current.as_mut() else {
            return 0;
        };
        let n = cursor.read_into(out);
        if cursor.is_exhausted() {
            if let Some(done) = self.current.take() {
                self.retire(done);
            }
            self.active.store(false, Ordering::Release);
        }
        n
    }

    fn retire(&self, cursor: PlaybackCursor) {
        // If the control side hasn't collected in a while the buffer is freed
        // right here instead.
        let _ = self.retired_tx.try_send(cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(id: &str, samples: Vec<i16>) -> Clip {
        Clip::from_samples(ClipId::new(id), samples)
    }

    #[test]
    fn test_pull_advances_and_clears() {
        let queue = PlaybackQueue::new();
        let mut slot = queue.slot();
        queue.set_active(clip("boing", vec![1, 2, 3, 4, 5]));
        assert!(queue.is_active());

        slot.refresh();
        let mut out = [0i16; 3];
        assert_eq!(slot.pull_into(&mut out), 3);
        assert_eq!(out, [1, 2, 3]);
        assert!(slot.is_playing());

        let mut out = [0i16; 3];
        assert_eq!(slot.pull_into(&mut out), 2);
        assert_eq!(&out[..2], &[4, 5]);
        assert!(!slot.is_playing());
        assert!(!queue.is_active());

        assert_eq!(slot.pull_into(&mut out), 0);
    }

    #[test]
    fn test_set_active_replaces_remainder() {
        let queue = PlaybackQueue::new();
        let mut slot = queue.slot();

        queue.set_active(clip("a", vec![10; 100]));
        slot.refresh();
        let mut out = [0i16; 10];
        slot.pull_into(&mut out);

        queue.set_active(clip("b", vec![20; 100]));
        slot.refresh();
        assert_eq!(slot.current_clip(), Some(&ClipId::new("b")));
        let mut out = [0i16; 10];
        slot.pull_into(&mut out);
        assert_eq!(out, [20; 10]);
    }

    #[test]
    fn test_last_trigger_wins_between_callbacks() {
        let queue = PlaybackQueue::new();
        let mut slot = queue.slot();

        queue.set_active(clip("a", vec![1; 8]));
        queue.set_active(clip("b", vec![2; 8]));
        queue.set_active(clip("c", vec![3; 8]));
        slot.refresh();

        assert_eq!(slot.current_clip(), Some(&ClipId::new("c")));
    }

    #[test]
    fn test_triggers_while_callback_is_stalled() {
        let queue = PlaybackQueue::new();
        let mut slot = queue.slot();

        for i in 0..(PENDING_CAPACITY as i16 * 3) {
            queue.set_active(clip("spam", vec![i; 4]));
        }
        slot.refresh();

        let mut out = [0i16; 4];
        slot.pull_into(&mut out);
        assert_eq!(out, [PENDING_CAPACITY as i16 * 3 - 1; 4]);
    }

    #[test]
    fn test_idle_queue_drops_untaken_triggers() {
        let queue = PlaybackQueue::new();
        let old_slot = queue.slot();
        queue.set_active(clip("late", vec![7; 64]));
        drop(old_slot); // route closed before the callback saw the trigger
        queue.mark_idle();
        assert!(!queue.is_active());

        let mut slot = queue.slot();
        slot.refresh();
        assert!(!slot.is_playing());
        let mut out = [0i16; 8];
        assert_eq!(slot.pull_into(&mut out), 0);
    }

    #[test]
    fn test_empty_clip_finishes_immediately() {
        let queue = PlaybackQueue::new();
        let mut slot = queue.slot();
        queue.set_active(clip("silence", vec![]));
        slot.refresh();

        let mut out = [0i16; 4];
        assert_eq!(slot.pull_into(&mut out), 0);
        assert!(!slot.is_playing());
        assert!(!queue.is_active());
    }
}
