use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{self, BoxFuture, FutureExt};

use crate::assets::AssetResolver;
use crate::audio::output::{spawn_output, OutputHandle};
use crate::error::AudioError;

use super::wav::{decode_wav, PlaybackShared};
use super::{MediaBackend, MediaInfo};

/// File-backed backend rendering decoded WAV tracks to the default output.
///
/// Each instance opens its own output stream, so the voice and background
/// channels mix in the host audio server.
pub struct CpalBackend {
    shared: Arc<Mutex<PlaybackShared>>,
    resolver: AssetResolver,
    _output: OutputHandle,
}

impl CpalBackend {
    pub fn open(name: &str, resolver: AssetResolver) -> Result<Self, AudioError> {
        let shared = Arc::new(Mutex::new(PlaybackShared::default()));
        let callback_shared = Arc::clone(&shared);

        let output = spawn_output(name, move |data, channels, rate| {
            // Never block the audio thread; emit silence on contention.
            match callback_shared.try_lock() {
                Ok(mut state) => state.render(data, channels, rate),
                Err(_) => data.fill(0.0),
            }
        })?;

        Ok(Self {
            shared,
            resolver,
            _output: output,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, PlaybackShared>, AudioError> {
        self.shared.lock().map_err(|_| AudioError::LockPoisoned {
            component: "playback_shared".to_string(),
        })
    }
}

impl MediaBackend for CpalBackend {
    fn load(&self, source: &str) -> Result<MediaInfo, AudioError> {
        let path = self.resolver.resolve(source);
        let track = decode_wav(&path).map_err(|err| match err {
            AudioError::LoadFailed { reason, .. } => AudioError::LoadFailed {
                source: source.to_string(),
                reason,
            },
            other => other,
        })?;
        let duration_seconds = track.duration_seconds();

        let mut state = self.lock()?;
        state.track = Some(Arc::new(track));
        state.cursor = 0.0;
        state.playing = false;
        state.ended = false;

        Ok(MediaInfo { duration_seconds })
    }

    fn play(&self) -> BoxFuture<'static, Result<(), AudioError>> {
        let result = self.lock().and_then(|mut state| {
            if state.track.is_none() {
                return Err(AudioError::NoSource);
            }
            if state.ended {
                state.cursor = 0.0;
                state.ended = false;
            }
            state.playing = true;
            Ok(())
        });
        future::ready(result).boxed()
    }

    fn pause(&self) {
        if let Ok(mut state) = self.lock() {
            state.playing = false;
        }
    }

    fn seek(&self, seconds: f64) {
        if let Ok(mut state) = self.lock() {
            state.seek_seconds(seconds);
        }
    }

    fn position(&self) -> f64 {
        self.lock().map(|s| s.position_seconds()).unwrap_or(0.0)
    }

    fn has_ended(&self) -> bool {
        self.lock().map(|s| s.ended).unwrap_or(false)
    }

    fn set_volume(&self, volume: f32) {
        if let Ok(mut state) = self.lock() {
            state.volume = volume;
        }
    }

    fn set_loop(&self, looping: bool) {
        if let Ok(mut state) = self.lock() {
            state.looping = looping;
        }
    }

    fn set_playback_rate(&self, rate: f32) {
        if let Ok(mut state) = self.lock() {
            state.rate = rate;
        }
    }
}
