use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DecodeError;
use crate::shared::{ClipId, SAMPLE_RATE};

// A decoded clip, already in the pipeline's sample format. Clips are decoded
// fresh on every trigger and never cached.
#[derive(Clone, Debug)]
pub struct Clip {
    pub id: ClipId,
    pub source_path: PathBuf,
    pub samples: Vec<i16>, // mono
    pub sample_rate: u32,
    pub channels: u16, // always 1 after decode
}

impl Clip {
    #[cfg(test)]
    pub fn from_samples(id: ClipId, samples: Vec<i16>) -> Self {
        Self {
            id,
            source_path: PathBuf::new(),
            samples,
            sample_rate: SAMPLE_RATE,
            channels: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// Decode to mono i16, averaging each frame of a multi-channel source. The
// sample rate is left alone, so other rates play pitch shifted. Blocking,
// loader thread only.
pub fn load(id: ClipId, path: &Path) -> Result<Clip, DecodeError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let (samples, source_rate) = match ext.as_str() {
        "wav" => decode_wav(path)?,
        "mp3" => decode_compressed(path, &ext)?,
        _ => {
            return Err(DecodeError::Unsupported {
                path: path.to_path_buf(),
            });
        }
    };

    if source_rate != SAMPLE_RATE {
        tracing::warn!(
            clip = %id,
            source_rate,
            pipeline_rate = SAMPLE_RATE,
            "clip sample rate differs from the pipeline, it will play pitch-shifted"
        );
    }
    tracing::debug!(clip = %id, samples = samples.len(), "decoded clip");

    Ok(Clip {
        id,
        source_path: path.to_path_buf(),
        samples,
        sample_rate: SAMPLE_RATE,
        channels: 1,
    })
}

fn decode_wav(path: &Path) -> Result<(Vec<i16>, u32), DecodeError> {
    let wav_err = |source| DecodeError::Wav {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = hound::WavReader::open(path).map_err(wav_err)?;
    let spec = reader.spec();

    // Read the samples, narrowing whatever the file holds to i16
    let interleaved: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| narrow_int(x, bits)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(wav_err)?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(narrow_float))
            .collect::<Result<Vec<_>, _>>()
            .map_err(wav_err)?,
    };

    let mut mono = Vec::with_capacity(interleaved.len() / spec.channels.max(1) as usize);
    downmix_into(&interleaved, spec.channels, &mut mono);
    Ok((mono, spec.sample_rate))
}

fn decode_compressed(path: &Path, ext: &str) -> Result<(Vec<i16>, u32), DecodeError> {
    let codec_err = |e: SymphoniaError| DecodeError::Codec {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let file = File::open(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(ext);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(codec_err)?;
    let mut format = probed.format;

    let track = format.default_track().ok_or_else(|| DecodeError::Codec {
        path: path.to_path_buf(),
        reason: "no audio track".to_string(),
    })?;
    let track_id = track.id;
    let source_rate = track.codec_params.sample_rate.unwrap_or(SAMPLE_RATE);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(codec_err)?;

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break; // end of stream
            }
            Err(e) => return Err(codec_err(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                // a corrupt frame, skip it and keep going
                tracing::debug!(path = %path.display(), reason, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(codec_err(e)),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count() as u16;
        let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        downmix_into(buf.samples(), channels, &mut mono);
    }

    Ok((mono, source_rate))
}

// Averages each interleaved frame down to one sample.
pub(crate) fn downmix_into(interleaved: &[i16], channels: u16, out: &mut Vec<i16>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let ch = channels as usize;
    out.extend(interleaved.chunks_exact(ch).map(|frame| {
        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
        (sum / ch as i32) as i16
    }));
}

fn narrow_int(sample: i32, bits: u16) -> i16 {
    if bits > 16 {
        (sample >> (bits - 16)) as i16
    } else {
        (sample << (16 - bits)) as i16
    }
}

fn narrow_float(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_mono_wav_sample_count_matches_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("boing.wav");
        let samples: Vec<i16> = (0..4410).map(|i| ((i % 200) as i16 - 100) * 50).collect();
        write_wav(&path, 1, SAMPLE_RATE, &samples);

        let clip = load(ClipId::new("boing.wav"), &path).unwrap();
        assert_eq!(clip.len(), 4410);
        assert_eq!(clip.samples, samples);
        assert_eq!(clip.channels, 1);
        assert_eq!(clip.sample_rate, SAMPLE_RATE);
    }

    #[test]
    fn test_stereo_wav_is_averaged_to_mono() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        // left, right pairs
        let interleaved = [1000i16, 3000, -2000, -4000, 32767, 32767, -32768, 32767, 7, 8];
        write_wav(&path, 2, SAMPLE_RATE, &interleaved);

        let clip = load(ClipId::new("stereo.wav"), &path).unwrap();
        assert_eq!(clip.len(), 5);
        let expected = [2000i16, -3000, 32767, 0, 7];
        for (got, want) in clip.samples.iter().zip(expected) {
            assert!((*got as i32 - want as i32).abs() <= 1, "{got} vs {want}");
        }
    }

    #[test]
    fn test_foreign_sample_rate_is_not_resampled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("slow.wav");
        write_wav(&path, 1, 22_050, &[1, 2, 3, 4]);

        let clip = load(ClipId::new("slow.wav"), &path).unwrap();
        assert_eq!(clip.samples, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load(ClipId::new("notes.txt"), Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, DecodeError::Unsupported { .. }));
    }

    #[test]
    fn test_corrupt_wav_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not RIFF").unwrap();

        let err = load(ClipId::new("broken.wav"), &path).unwrap_err();
        assert!(matches!(err, DecodeError::Wav { .. }));
    }

    #[test]
    fn test_missing_mp3_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = load(ClipId::new("gone.mp3"), &dir.path().join("gone.mp3")).unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
    }

    // eight frames of stereo 44.1k silence, 1152 samples per frame
    const SILENCE_MP3: &[u8] = include_bytes!("testdata/silence_stereo.mp3");

    #[test]
    fn test_stereo_mp3_decodes_to_mono() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("silence.mp3");
        std::fs::write(&path, SILENCE_MP3).unwrap();

        let clip = load(ClipId::new("silence.mp3"), &path).unwrap();
        assert_eq!(clip.channels, 1);
        assert_eq!(clip.sample_rate, SAMPLE_RATE);
        assert_eq!(clip.len(), 8 * 1152); // one mono sample per stereo frame
        assert!(!clip.is_empty());
        assert!(clip.samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_narrowing() {
        assert_eq!(narrow_int(i32::from(i16::MAX) << 8, 24), i16::MAX);
        assert_eq!(narrow_int(-128, 8), i16::MIN);
        assert_eq!(narrow_float(1.5), i16::MAX);
        assert_eq!(narrow_float(0.0), 0);
    }
}
