//! WAV decoding and the render state shared with the output callback.

use std::path::Path;
use std::sync::Arc;

use crate::error::AudioError;

/// Fully decoded track, interleaved `f32` samples in [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct PcmTrack {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl PcmTrack {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Decode a WAV file into memory.
pub fn decode_wav(path: &Path) -> Result<PcmTrack, AudioError> {
    let load_failed = |reason: String| AudioError::LoadFailed {
        source: path.display().to_string(),
        reason,
    };

    let mut reader = hound::WavReader::open(path).map_err(|e| load_failed(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| load_failed(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| load_failed(e.to_string()))?
        }
    };

    if spec.channels == 0 {
        return Err(load_failed("file declares zero channels".to_string()));
    }

    Ok(PcmTrack {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

/// Playback state read by the output callback and written by the backend.
#[derive(Debug)]
pub struct PlaybackShared {
    pub track: Option<Arc<PcmTrack>>,
    /// Fractional frame position within `track`
    pub cursor: f64,
    pub playing: bool,
    pub ended: bool,
    pub volume: f32,
    pub looping: bool,
    pub rate: f32,
}

impl Default for PlaybackShared {
    fn default() -> Self {
        Self {
            track: None,
            cursor: 0.0,
            playing: false,
            ended: false,
            volume: 1.0,
            looping: false,
            rate: 1.0,
        }
    }
}

impl PlaybackShared {
    pub fn position_seconds(&self) -> f64 {
        match &self.track {
            Some(track) if track.sample_rate > 0 => self.cursor / track.sample_rate as f64,
            _ => 0.0,
        }
    }

    pub fn seek_seconds(&mut self, seconds: f64) {
        if let Some(track) = &self.track {
            let max = track.frames() as f64;
            self.cursor = (seconds * track.sample_rate as f64).clamp(0.0, max);
            self.ended = false;
        }
    }

    /// Fill an interleaved output buffer, advancing the cursor.
    ///
    /// Nearest-frame resampling: the cursor steps by
    /// `rate * track_rate / out_rate` per output frame. Output channels beyond
    /// the track's channel count repeat the last track channel.
    pub fn render(&mut self, out: &mut [f32], out_channels: usize, out_rate: u32) {
        out.fill(0.0);

        let track = match (&self.track, self.playing) {
            (Some(track), true) if out_channels > 0 && out_rate > 0 => Arc::clone(track),
            _ => return,
        };

        let frames = track.frames();
        if frames == 0 {
            self.playing = false;
            self.ended = true;
            return;
        }

        let tc = track.channels as usize;
        let step = self.rate as f64 * track.sample_rate as f64 / out_rate as f64;

        for frame in out.chunks_mut(out_channels) {
            if self.cursor >= frames as f64 {
                if self.looping {
                    self.cursor %= frames as f64;
                } else {
                    self.cursor = frames as f64;
                    self.playing = false;
                    self.ended = true;
                    break;
                }
            }

            let base = self.cursor as usize * tc;
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample = track.samples[base + ch.min(tc - 1)] * self.volume;
            }
            self.cursor += step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Arc<PcmTrack> {
        Arc::new(PcmTrack {
            samples,
            channels,
            sample_rate,
        })
    }

    #[test]
    fn test_decode_int_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for v in [0i16, 16384, -16384, i16::MAX] {
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = decode_wav(&path).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.frames(), 4);
        assert!((decoded.samples[1] - 0.5).abs() < 1e-4);
        assert!((decoded.samples[2] + 0.5).abs() < 1e-4);
        assert!((decoded.duration_seconds() - 0.0005).abs() < 1e-9);
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_wav(Path::new("/no/such/file.wav")).unwrap_err();
        assert!(matches!(err, AudioError::LoadFailed { .. }));
    }

    #[test]
    fn test_render_silent_when_paused() {
        let mut shared = PlaybackShared {
            track: Some(track(vec![1.0; 8], 1, 4)),
            ..Default::default()
        };
        let mut out = [0.5f32; 4];
        shared.render(&mut out, 1, 4);
        assert_eq!(out, [0.0; 4]);
        assert_eq!(shared.cursor, 0.0);
    }

    #[test]
    fn test_render_applies_volume_and_upmixes() {
        let mut shared = PlaybackShared {
            track: Some(track(vec![0.2, 0.4], 1, 2)),
            playing: true,
            volume: 0.5,
            ..Default::default()
        };
        let mut out = [0.0f32; 4];
        shared.render(&mut out, 2, 2);
        assert_eq!(out, [0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_render_marks_end_without_loop() {
        let mut shared = PlaybackShared {
            track: Some(track(vec![1.0, 1.0], 1, 2)),
            playing: true,
            ..Default::default()
        };
        let mut out = [0.0f32; 4];
        shared.render(&mut out, 1, 2);
        assert_eq!(out, [1.0, 1.0, 0.0, 0.0]);
        assert!(shared.ended);
        assert!(!shared.playing);
        assert_eq!(shared.position_seconds(), 1.0);
    }

    #[test]
    fn test_render_wraps_when_looping() {
        let mut shared = PlaybackShared {
            track: Some(track(vec![0.1, 0.2, 0.3], 1, 3)),
            playing: true,
            looping: true,
            ..Default::default()
        };
        let mut out = [0.0f32; 5];
        shared.render(&mut out, 1, 3);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.1, 0.2]);
        assert!(!shared.ended);
    }

    #[test]
    fn test_render_rate_skips_frames() {
        let mut shared = PlaybackShared {
            track: Some(track(vec![0.0, 0.1, 0.2, 0.3], 1, 4)),
            playing: true,
            rate: 2.0,
            ..Default::default()
        };
        let mut out = [0.0f32; 2];
        shared.render(&mut out, 1, 4);
        assert_eq!(out, [0.0, 0.2]);
    }
}
