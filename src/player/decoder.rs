// ==========================================
// AUDIO DECODER
// ==========================================
// Opens a resource key and hands back a decodable sample stream plus its
// format. The stream is rodio's Decoder, which reads WAV (the shipped
// asset format) as well as FLAC, Vorbis and MP3.
//
// Failures map onto exactly two error kinds:
// - the file cannot be opened or is not a regular file -> Resource
// - the bytes are not audio rodio understands          -> Decode

use std::fs::File;
use std::io::BufReader;

use rodio::{Decoder, Source};
use tracing::debug;

use super::error::PlaybackError;

pub type SampleStream = Decoder<BufReader<File>>;

// Sample format of a decoded track, used to configure the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

pub struct DecodedTrack {
    key: String,
    format: StreamFormat,
    stream: SampleStream,
}

impl DecodedTrack {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn into_stream(self) -> SampleStream {
        self.stream
    }
}

impl std::fmt::Debug for DecodedTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedTrack")
            .field("key", &self.key)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

pub fn open(resource_key: &str) -> Result<DecodedTrack, PlaybackError> {
    let resource_error = |reason: String| PlaybackError::Resource {
        key: resource_key.to_string(),
        reason,
    };

    let file = File::open(resource_key).map_err(|e| resource_error(e.to_string()))?;
    let metadata = file.metadata().map_err(|e| resource_error(e.to_string()))?;
    if !metadata.is_file() {
        return Err(resource_error("not a regular file".to_string()));
    }

    let stream = Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::Decode {
        key: resource_key.to_string(),
        reason: e.to_string(),
    })?;

    let format = StreamFormat {
        sample_rate: stream.sample_rate(),
        channels: stream.channels(),
    };

    // A header that parses but describes no audio is still unusable
    if format.sample_rate == 0 || format.channels == 0 {
        return Err(PlaybackError::Decode {
            key: resource_key.to_string(),
            reason: format!(
                "unsupported format: {} Hz, {} channels",
                format.sample_rate, format.channels
            ),
        });
    }

    debug!(key = resource_key, ?format, "decoded track header");

    Ok(DecodedTrack {
        key: resource_key.to_string(),
        format,
        stream,
    })
}
