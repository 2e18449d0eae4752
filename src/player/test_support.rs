// Shared helpers for tests: WAV fixtures and a fake output device that
// records when it is opened and closed.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};

use super::decoder::DecodedTrack;
use super::engine::{Outcome, SessionEnd, StopSignal};
use super::error::PlaybackError;
use super::output::AudioOutput;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// Writes a 16-bit PCM WAV containing a quiet square wave.
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: u32) {
    let block_align = channels * 2;
    let data_len = frames * u32::from(block_align);

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());

    for frame in 0..frames {
        let sample: i16 = if (frame / 20) % 2 == 0 { 1_000 } else { -1_000 };
        for _ in 0..channels {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }

    std::fs::write(path, bytes).unwrap();
}

pub async fn recv_outcome(outcomes: &mut mpsc::UnboundedReceiver<Outcome>) -> Outcome {
    tokio::time::timeout(TEST_TIMEOUT, outcomes.recv())
        .await
        .expect("timed out waiting for an outcome")
        .expect("outcome channel closed")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Opened(String),
    Closed(String),
}

#[derive(Default)]
struct FakeState {
    events: Vec<DeviceEvent>,
    open: usize,
    max_open: usize,
}

// Stands in for the speakers. By default it "plays" until stopped.
#[derive(Clone, Default)]
pub struct FakeOutput {
    state: Arc<Mutex<FakeState>>,
    fail_with: Option<PlaybackError>,
    finish_immediately: bool,
}

impl FakeOutput {
    // Reports the stream as exhausted as soon as it opens
    pub fn finishing() -> Self {
        FakeOutput {
            finish_immediately: true,
            ..FakeOutput::default()
        }
    }

    // Fails to open the device
    pub fn failing(err: PlaybackError) -> Self {
        FakeOutput {
            fail_with: Some(err),
            ..FakeOutput::default()
        }
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().open
    }

    pub fn max_open(&self) -> usize {
        self.state.lock().unwrap().max_open
    }

    pub async fn wait_until_open(&self, count: usize) {
        let opened = async {
            while self.open_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(TEST_TIMEOUT, opened)
            .await
            .expect("timed out waiting for the device to open");
    }
}

impl AudioOutput for FakeOutput {
    fn play_looped(
        &self,
        track: DecodedTrack,
        stop: &StopSignal,
    ) -> Result<SessionEnd, PlaybackError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }

        let key = track.key().to_string();
        {
            let mut state = self.state.lock().unwrap();
            state.events.push(DeviceEvent::Opened(key.clone()));
            state.open += 1;
            state.max_open = state.max_open.max(state.open);
        }

        let end = if self.finish_immediately {
            let exhausted = Notify::new();
            exhausted.notify_one();
            stop.wait(&exhausted)
        } else {
            stop.wait_stopped();
            SessionEnd::Cancelled
        };

        let mut state = self.state.lock().unwrap();
        state.open -= 1;
        state.events.push(DeviceEvent::Closed(key));

        Ok(end)
    }
}
