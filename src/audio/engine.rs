use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::{Observer, Producer};

use super::playback::PlaybackSlot;

// Skipped-buffer counters, written by the callback and drained by the control loop.
#[derive(Debug, Default)]
pub struct OutputStats {
    pub virtual_cable_skipped: AtomicU64,
    pub speaker_skipped: AtomicU64,
}

// One destination of the mixed signal: the producer half of a ring buffer the
// matching output stream drains.
pub struct OutputTap {
    producer: ringbuf::HeapProd<i16>,
    skipped: Arc<OutputStats>,
    kind: TapKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapKind {
    VirtualCable,
    Speaker,
}

impl OutputTap {
    pub fn new(producer: ringbuf::HeapProd<i16>, skipped: Arc<OutputStats>, kind: TapKind) -> Self {
        Self {
            producer,
            skipped,
            kind,
        }
    }

    // Best effort: a buffer that doesn't fit whole is skipped and counted.
    fn write(&mut self, mixed: &[i16]) {
        if self.producer.vacant_len() < mixed.len() {
            let counter = match self.kind {
                TapKind::VirtualCable => &self.skipped.virtual_cable_skipped,
                TapKind::Speaker => &self.skipped.speaker_skipped,
            };
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.producer.push_slice(mixed);
    }
}

// owned by the capture callback; buffers are allocated up front
pub struct Engine {
    slot: PlaybackSlot,
    clip_scratch: Vec<i16>,
    mixed: Vec<i16>,
    taps: Vec<OutputTap>,
}

impl Engine {
    pub fn new(slot: PlaybackSlot, block_size: usize, taps: Vec<OutputTap>) -> Self {
        let block_size = block_size.max(1);
        Self {
            slot,
            clip_scratch: vec![0; block_size],
            mixed: vec![0; block_size],
            taps,
        }
    }

    // oversized buffers are handled in blocks
    pub fn process(&mut self, live: &[i16]) {
        let block = self.mixed.len();
        for chunk in live.chunks(block) {
            let n = chunk.len();
            mix_block(
                chunk,
                &mut self.slot,
                &mut self.clip_scratch[..n],
                &mut self.mixed[..n],
            );
            for tap in &mut self.taps {
                tap.write(&self.mixed[..n]);
            }
        }
    }
}

// scratch and out must be as long as live; a clip that ends mid-block is
// zero-padded
pub fn mix_block(live: &[i16], slot: &mut PlaybackSlot, scratch: &mut [i16], out: &mut [i16]) {
    debug_assert_eq!(live.len(), out.len());
    debug_assert_eq!(live.len(), scratch.len());

    slot.refresh();
    if !slot.is_playing() {
        out.copy_from_slice(live);
        return;
    }

    let n = slot.pull_into(scratch);
    scratch[n..].fill(0);
    for ((o, &l), &c) in out.iter_mut().zip(live).zip(scratch.iter()) {
        *o = mix_sample(l, c);
    }
}

// Widen, sum, clamp, narrow.
#[inline]
pub fn mix_sample(live: i16, clip: i16) -> i16 {
    (live as i32 + clip as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}
