//! Default output device stream, owned by a dedicated thread.
//!
//! `cpal::Stream` is not `Send`, so it lives on its own thread for the
//! lifetime of the returned [`OutputHandle`]. The render closure runs on the
//! audio callback thread and must not block.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::AudioError;

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Keeps an output stream alive; dropping it stops the stream.
pub struct OutputHandle {
    sample_rate: u32,
    shutdown: Arc<AtomicBool>,
}

impl OutputHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Open the default output device and drive it with `render`.
///
/// `render` receives the interleaved buffer, the channel count and the
/// device sample rate.
pub fn spawn_output<F>(name: &str, render: F) -> Result<OutputHandle, AudioError>
where
    F: FnMut(&mut [f32], usize, u32) + Send + 'static,
{
    let shutdown = Arc::new(AtomicBool::new(false));
    let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, AudioError>>();
    let thread_shutdown = Arc::clone(&shutdown);
    let label = name.to_string();

    thread::Builder::new()
        .name(format!("calmease-{}", name))
        .spawn(move || {
            let stream = match open_stream(&label, render) {
                Ok((stream, rate)) => {
                    let _ = ready_tx.send(Ok(rate));
                    stream
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            while !thread_shutdown.load(Ordering::Relaxed) {
                thread::sleep(IDLE_POLL);
            }
            drop(stream);
            log::debug!("[Output] {} stream closed", label);
        })
        .map_err(|e| AudioError::DeviceUnavailable {
            reason: format!("Failed to spawn output thread: {}", e),
        })?;

    let sample_rate = ready_rx
        .recv()
        .map_err(|_| AudioError::DeviceUnavailable {
            reason: "Output thread exited before reporting".to_string(),
        })??;

    log::info!("[Output] {} stream running at {} Hz", name, sample_rate);
    Ok(OutputHandle {
        sample_rate,
        shutdown,
    })
}

fn open_stream<F>(label: &str, mut render: F) -> Result<(cpal::Stream, u32), AudioError>
where
    F: FnMut(&mut [f32], usize, u32) + Send + 'static,
{
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceUnavailable {
            reason: "No default output device found".to_string(),
        })?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceUnavailable {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;

    let stream_config: cpal::StreamConfig = config.clone().into();
    let channels = stream_config.channels as usize;
    let sample_rate = stream_config.sample_rate.0;

    let err_label = label.to_string();
    let err_fn = move |err| log::error!("[Output] {} stream error: {}", err_label, err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                render(data, channels, sample_rate);
            },
            err_fn,
            None,
        ),
        _ => {
            return Err(AudioError::DeviceUnavailable {
                reason: "Only F32 sample format is currently supported for output".to_string(),
            })
        }
    }
    .map_err(|e| AudioError::DeviceUnavailable {
        reason: format!("{:?}", e),
    })?;

    stream.play().map_err(|e| AudioError::DeviceUnavailable {
        reason: format!("Output start failed: {}", e),
    })?;

    Ok((stream, sample_rate))
}
