// ==========================================
// PLAYBACK ERRORS
// ==========================================
// Every way a session can fail ends up as one of these four variants.
// The Selection State Machine only ever sees a PlaybackError inside an
// Outcome, so the taxonomy here is the whole contract between the engine
// and the rest of the app.
//
// None of them are retried: a missing file or a busy device will not fix
// itself on the next attempt.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    // The catalog has no track with this name
    #[error("unknown track: {0}")]
    UnknownTrack(String),

    // The asset is missing or could not be read
    #[error("failed to open {key}: {reason}")]
    Resource { key: String, reason: String },

    // The asset exists but is not audio we can parse
    #[error("failed to decode {key}: {reason}")]
    Decode { key: String, reason: String },

    // The output device could not be opened or configured
    #[error("failed to initialize output device: {0}")]
    Device(String),
}

impl PlaybackError {
    // Short label for logs and the status line
    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackError::UnknownTrack(_) => "unknown-track",
            PlaybackError::Resource { .. } => "resource",
            PlaybackError::Decode { .. } => "decode",
            PlaybackError::Device(_) => "device",
        }
    }
}

// Errors raised while building a catalog. These happen once at startup
// and are fatal, so they never become an Outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("track names must not be empty")]
    EmptyName,

    #[error("duplicate track name: {0}")]
    DuplicateTrack(String),
}
