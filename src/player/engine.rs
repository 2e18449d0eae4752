// ==========================================
// PLAYBACK ENGINE
// ==========================================
// Runs playback sessions. A session is one looping playback of one track:
//
//   start() -> decode -> open device -> loop ... stop signal -> release -> Outcome
//
// Each session runs on its own blocking thread so a long-lived audio
// stream never stalls the UI loop. start() returns immediately with a
// handle; the session reports how it ended by sending exactly one
// Outcome on the engine's channel.
//
// The engine does not decide WHEN to start or stop. The Selection State
// Machine guarantees there is never more than one live session, and only
// asks for a new one after the previous Outcome has arrived.
//
// Resource release always precedes notification: the output device is
// dropped inside AudioOutput::play_looped, which returns before the
// Outcome is sent.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::catalog::TrackEntry;
use super::decoder;
use super::error::PlaybackError;
use super::output::AudioOutput;

// How long shutdown() waits for sessions to wind down before giving up
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

// ==========================================
// SESSION IDENTITY
// ==========================================
// Sessions are identified by a number that is never reused, so an Outcome
// from an old session can't be mistaken for the current one even when
// both played the same track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(raw: u64) -> Self {
        SessionId(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// How a session ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    // The stop signal fired
    Cancelled,
    // The stream ran out on its own
    Finished,
}

// The terminal event of a session. Produced once, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub session: SessionId,
    pub track: String,
    pub result: Result<SessionEnd, PlaybackError>,
}

// ==========================================
// STOP SIGNAL
// ==========================================
// One-shot, idempotent cancellation scoped to a single session.
// stop() may be called any number of times, from any thread, before or
// after the session has ended. A fresh signal is made for every session.
#[derive(Debug, Clone)]
pub struct StopSignal {
    token: CancellationToken,
    runtime: Handle,
}

impl StopSignal {
    fn new(runtime: Handle) -> Self {
        StopSignal {
            token: CancellationToken::new(),
            runtime,
        }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    // Blocks the session thread until either the stop signal fires or
    // `exhausted` is notified, whichever comes first.
    pub fn wait(&self, exhausted: &Notify) -> SessionEnd {
        self.runtime.block_on(async {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => SessionEnd::Cancelled,
                _ = exhausted.notified() => SessionEnd::Finished,
            }
        })
    }

    // Blocks the session thread until the stop signal fires.
    pub fn wait_stopped(&self) {
        self.runtime.block_on(self.token.cancelled());
    }
}

// Handle to a running session, returned by start().
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    track: String,
    stop: StopSignal,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

struct LiveSession {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

// ==========================================
// ENGINE
// ==========================================
pub struct PlaybackEngine {
    output: Arc<dyn AudioOutput>,
    outcomes: mpsc::UnboundedSender<Outcome>,
    live: BTreeMap<SessionId, LiveSession>,
    runtime: Handle,
}

impl PlaybackEngine {
    // Must be called from inside a tokio runtime. Returns the receiving
    // end of the Outcome channel alongside the engine.
    pub fn new(output: Arc<dyn AudioOutput>) -> (Self, mpsc::UnboundedReceiver<Outcome>) {
        let (outcomes, outcome_rx) = mpsc::unbounded_channel();
        let engine = PlaybackEngine {
            output,
            outcomes,
            live: BTreeMap::new(),
            runtime: Handle::current(),
        };
        (engine, outcome_rx)
    }

    // Begins a session for `entry` and returns at once.
    pub fn start(&mut self, id: SessionId, entry: &TrackEntry) -> SessionHandle {
        if let Some(previous) = self.live.keys().next() {
            warn!(session = %id, %previous, "starting a session while another is still live");
        }

        let handle = SessionHandle {
            id,
            track: entry.name.clone(),
            stop: StopSignal::new(self.runtime.clone()),
        };

        let output = Arc::clone(&self.output);
        let outcomes = self.outcomes.clone();
        let entry = entry.clone();
        let stop = handle.stop.clone();

        info!(session = %id, track = %entry.name, "starting playback");

        let task = self.runtime.spawn_blocking(move || {
            let result = run_session(output.as_ref(), &entry, &stop);

            match &result {
                Ok(end) => info!(session = %id, track = %entry.name, ?end, "playback ended"),
                Err(e) => error!(session = %id, track = %entry.name, kind = e.kind(), "playback failed: {e}"),
            }

            let outcome = Outcome {
                session: id,
                track: entry.name,
                result,
            };
            if outcomes.send(outcome).is_err() {
                debug!(session = %id, "outcome dropped, receiver is gone");
            }
        });

        self.live.insert(
            id,
            LiveSession {
                handle: handle.clone(),
                task,
            },
        );

        handle
    }

    // Signals a session to stop. Idempotent, never blocks. Returns false
    // when the engine no longer tracks the session.
    pub fn stop(&self, id: SessionId) -> bool {
        match self.live.get(&id) {
            Some(session) => {
                debug!(session = %id, track = session.handle.track(), "stop requested");
                session.handle.stop();
                true
            }
            None => false,
        }
    }

    // Forgets a session once its Outcome has been consumed.
    pub fn reap(&mut self, id: SessionId) {
        self.live.remove(&id);
    }

    // Sessions whose thread has not finished yet
    pub fn live_count(&self) -> usize {
        self.live
            .values()
            .filter(|session| !session.task.is_finished())
            .count()
    }

    // Stops every live session and waits for their threads to return,
    // which means every output device has been released.
    pub async fn shutdown(&mut self) {
        let sessions = std::mem::take(&mut self.live);
        if sessions.is_empty() {
            return;
        }

        for session in sessions.values() {
            session.handle.stop();
        }

        for (id, session) in sessions {
            match tokio::time::timeout(SHUTDOWN_GRACE, session.task).await {
                Ok(Ok(())) => debug!(session = %id, "session shut down"),
                Ok(Err(e)) => error!(session = %id, "session thread panicked: {e}"),
                Err(_) => warn!(session = %id, "session did not stop within {:?}", SHUTDOWN_GRACE),
            }
        }
    }
}

// Dropping the engine without shutdown() still signals every session, so
// no blocking thread is left waiting on a stop that never comes.
impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        for session in self.live.values() {
            session.handle.stop();
        }
    }
}

// The body of one session, run on its blocking thread.
fn run_session(
    output: &dyn AudioOutput,
    entry: &TrackEntry,
    stop: &StopSignal,
) -> Result<SessionEnd, PlaybackError> {
    let track = decoder::open(&entry.resource_key)?;

    // Stopped while decoding: never touch the device
    if stop.is_stopped() {
        return Ok(SessionEnd::Cancelled);
    }

    output.play_looped(track, stop)
}
