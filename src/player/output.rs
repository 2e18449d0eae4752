// ==========================================
// OUTPUT DEVICE
// ==========================================
// The seam between a playback session and the speakers.
//
// An AudioOutput is handed a decoded track and the session's stop signal.
// It must:
// 1. Open the device for the track's sample format (or fail with Device)
// 2. Loop the track until the stop signal fires
// 3. Release the device before returning
//
// The call blocks for the whole session. rodio's OutputStream is tied to
// the thread that created it, so opening, playing and closing all happen
// on one blocking thread owned by the engine.

use std::fmt;
use std::sync::Arc;

use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::cpal::SampleRate;
use rodio::source::EmptyCallback;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::decoder::{DecodedTrack, StreamFormat};
use super::engine::{SessionEnd, StopSignal};
use super::error::PlaybackError;

pub trait AudioOutput: Send + Sync + 'static {
    fn play_looped(
        &self,
        track: DecodedTrack,
        stop: &StopSignal,
    ) -> Result<SessionEnd, PlaybackError>;
}

// ==========================================
// RODIO OUTPUT
// ==========================================
// Plays through the system's default output device.
//
// The decoded stream is wrapped in repeat_infinite(), which buffers the
// first pass and replays it from memory, so the loop boundary does not
// go back to disk. An EmptyCallback queued behind the loop reports the
// stream running dry; with an infinite loop that only happens if the
// decoder yields no samples at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioOutput;

impl AudioOutput for RodioOutput {
    fn play_looped(
        &self,
        track: DecodedTrack,
        stop: &StopSignal,
    ) -> Result<SessionEnd, PlaybackError> {
        let format = track.format();
        debug!(key = track.key(), ?format, "opening output device");
        let (stream, handle) = open_stream(format)?;
        let sink = Sink::try_new(&handle).map_err(|e| PlaybackError::Device(e.to_string()))?;

        let exhausted = Arc::new(Notify::new());
        let on_empty = Arc::clone(&exhausted);

        sink.append(track.into_stream().repeat_infinite());
        sink.append(EmptyCallback::<f32>::new(Box::new(move || {
            on_empty.notify_one();
        })));

        let end = stop.wait(&exhausted);

        // Release order: sink first, then the stream that owns the device
        sink.stop();
        drop(sink);
        drop(stream);
        debug!(?end, "output device released");

        Ok(end)
    }
}

// Prefers a device configuration matching the track exactly. Devices that
// cannot run at the track's rate still play it through their default
// configuration; rodio converts the samples.
fn open_stream(format: StreamFormat) -> Result<(OutputStream, OutputStreamHandle), PlaybackError> {
    let host = rodio::cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlaybackError::Device("no output device available".to_string()))?;

    let matching = device.supported_output_configs().ok().and_then(|mut configs| {
        configs
            .find(|range| {
                range.channels() == format.channels
                    && range.min_sample_rate().0 <= format.sample_rate
                    && format.sample_rate <= range.max_sample_rate().0
            })
            .map(|range| range.with_sample_rate(SampleRate(format.sample_rate)))
    });

    open_with_fallback(
        format,
        matching.map(|config| || OutputStream::try_from_device_config(&device, config)),
        || OutputStream::try_from_device(&device),
    )
}

// A listed configuration can still be refused when the stream is built
// (ALSA does this for some rates), so a failed exact open falls back to
// the device default. Only a failed default open is a Device error.
fn open_with_fallback<T, E: fmt::Display>(
    format: StreamFormat,
    exact: Option<impl FnOnce() -> Result<T, E>>,
    device_default: impl FnOnce() -> Result<T, E>,
) -> Result<T, PlaybackError> {
    match exact {
        Some(open_exact) => match open_exact() {
            Ok(opened) => return Ok(opened),
            Err(e) => warn!(
                sample_rate = format.sample_rate,
                channels = format.channels,
                "exact device configuration failed ({e}), using device default"
            ),
        },
        None => warn!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "no exact device configuration, using device default"
        ),
    }

    device_default().map_err(|e| PlaybackError::Device(e.to_string()))
}
