// Decodes clips off the ui thread. A trigger is a request on the channel; the
// worker decodes the file and makes it the active clip. A file that fails to
// decode is logged and the trigger does nothing.

use std::path::PathBuf;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::audio::PlaybackQueue;
use crate::audio::clip;
use crate::shared::ClipId;

const REQUEST_CAPACITY: usize = 64;

#[derive(Clone, Debug)]
pub struct LoadRequest {
    pub clip_id: ClipId,
    pub path: PathBuf,
}

pub struct ClipLoader {
    tx: Option<Sender<LoadRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl ClipLoader {
    pub fn spawn(queue: PlaybackQueue) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(REQUEST_CAPACITY);
        let worker = std::thread::Builder::new()
            .name("clip-loader".to_string())
            .spawn(move || run(rx, queue))?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    // Returns false if the request was dropped.
    pub fn request(&self, clip_id: ClipId, path: PathBuf) -> bool {
        let Some(tx) = &self.tx else { return false };
        match tx.try_send(LoadRequest { clip_id, path }) {
            Ok(()) => true,
            Err(TrySendError::Full(req)) => {
                tracing::warn!(clip = %req.clip_id, "loader busy, trigger dropped");
                false
            }
            Err(TrySendError::Disconnected(req)) => {
                tracing::error!(clip = %req.clip_id, "loader thread is gone");
                false
            }
        }
    }
}

impl Drop for ClipLoader {
    // Pending requests are still served before the worker exits.
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("clip loader thread panicked");
            }
        }
    }
}

fn run(rx: Receiver<LoadRequest>, queue: PlaybackQueue) {
    for req in rx {
        match clip::load(req.clip_id.clone(), &req.path) {
            Ok(clip) => {
                tracing::debug!(
                    clip = %clip.id,
                    file = %clip.source_path.display(),
                    samples = clip.len(),
                    rate = clip.sample_rate,
                    channels = clip.channels,
                    "clip decoded"
                );
                queue.set_active(clip);
            }
            Err(e) => {
                tracing::warn!(clip = %req.clip_id, error = %e, "cannot play clip");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::SAMPLE_RATE;
    use tempfile::tempdir;

    fn write_wav(path: &std::path::Path, len: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..len {
            w.write_sample((i % 100) as i16).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn test_decoded_clip_becomes_active() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("boing.wav");
        write_wav(&path, 2048);

        let queue = PlaybackQueue::new();
        let loader = ClipLoader::spawn(queue.clone()).unwrap();
        assert!(loader.request(ClipId::new("boing.wav"), path));
        drop(loader); // joins after the request is served

        assert!(queue.is_active());
        let mut slot = queue.slot();
        slot.refresh();
        assert_eq!(slot.current_clip(), Some(&ClipId::new("boing.wav")));
    }

    #[test]
    fn test_undecodable_clip_is_a_no_op() {
        let dir = tempdir().unwrap();
        let bad = dir.path().join("bad.wav");
        std::fs::write(&bad, b"definitely not a wav").unwrap();

        let queue = PlaybackQueue::new();
        let loader = ClipLoader::spawn(queue.clone()).unwrap();
        loader.request(ClipId::new("bad.wav"), bad);
        loader.request(ClipId::new("missing.mp3"), dir.path().join("missing.mp3"));
        drop(loader);

        assert!(!queue.is_active());
    }
}
