//! # Audio Capture Module
//!
//! Real-time audio capture using CPAL (Cross-Platform Audio Library).
//! Captured blocks are forwarded raw to a channel; the engine's own sample
//! FIFO takes care of accumulating them into analysis frames.
//!
//! ## Audio Configuration
//! - Sample rate: 44.1 kHz preferred
//! - Format: 32-bit float
//! - Channels: mono

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

/// Starts audio capture from the default input device.
///
/// Each callback block is sent to `sender` as-is; if the consumer has
/// fallen behind and the channel is full, the block is dropped rather than
/// blocking the audio callback.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Audio stream handle and sample rate
/// * `Err(e)` - Error if audio setup fails
pub fn start_audio_capture(sender: Sender<Vec<f32>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    eprintln!("[AUDIO] Using input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, 44100)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = cpal::SampleRate(44100);
    let config = supported_config.with_sample_rate(sample_rate);

    let sample_rate_val = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();

    eprintln!("[AUDIO] Selected sample rate: {} Hz", sample_rate_val);

    let err_fn = |err| eprintln!("[AUDIO] Stream error: {}", err);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // Drop-on-full: the capture callback must never block.
            let _ = sender.try_send(data.to_vec());
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Finds the supported configuration closest to the target sample rate,
/// restricted to mono 32-bit float.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i32 - target_rate as i32).abs();
            let max_diff = (c.max_sample_rate().0 as i32 - target_rate as i32).abs();
            min_diff.min(max_diff)
        })
}
