//! Speaker output with cancellation
//!
//! Every call to [`AudioSink::play`] supersedes the previous one: the sink
//! keeps a generation counter and a playing stream stops as soon as the
//! counter moves past the generation it was started with. Two clips are never
//! audible at once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::AudioBuffer;
use crate::{Error, Result};

/// Poll interval while waiting for a clip to drain
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Something that can play decoded audio
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play a clip, resolving once it finished or was stopped
    async fn play(&self, audio: AudioBuffer) -> Result<()>;

    /// Stop whatever is playing
    fn stop(&self);
}

/// Plays audio on the default output device
pub struct Speaker {
    generation: Arc<AtomicU64>,
}

impl Speaker {
    /// Check that an output device exists
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self {
            generation: Arc::new(AtomicU64::new(0)),
        })
    }
}

#[async_trait]
impl AudioSink for Speaker {
    async fn play(&self, audio: AudioBuffer) -> Result<()> {
        let generation = Arc::clone(&self.generation);
        let mine = generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::task::spawn_blocking(move || {
            play_blocking(&audio, || generation.load(Ordering::SeqCst) != mine)
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }

    fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Pick an output config for `sample_rate`, preferring mono
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
        c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
    };

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| supports(c, 1))
        .or_else(|| {
            device
                .supported_output_configs()
                .ok()?
                .find(|c| supports(c, 2))
        })
        .ok_or_else(|| Error::Audio(format!("no output config for {sample_rate} Hz")))?;

    Ok(supported.with_sample_rate(rate).config())
}

/// Drive one clip to completion or cancellation
fn play_blocking(audio: &AudioBuffer, cancelled: impl Fn() -> bool) -> Result<()> {
    let samples = audio.to_mono();
    if samples.is_empty() || cancelled() {
        return Ok(());
    }

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;
    let config = output_config(&device, audio.sample_rate())?;
    let out_channels = usize::from(config.channels);

    let total = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut pos) = position.lock() else {
                        return;
                    };
                    for frame in data.chunks_mut(out_channels) {
                        let sample = samples.get(*pos).copied().unwrap_or_else(|| {
                            finished.store(true, Ordering::SeqCst);
                            0.0
                        });
                        frame.fill(sample);
                        if *pos < samples.len() {
                            *pos += 1;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let deadline = Instant::now() + audio.duration() + Duration::from_millis(500);
    while !finished.load(Ordering::SeqCst) {
        if cancelled() {
            tracing::debug!("playback interrupted");
            return Ok(());
        }
        if Instant::now() > deadline {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    drop(stream);
    tracing::debug!(samples = total, "playback complete");
    Ok(())
}
