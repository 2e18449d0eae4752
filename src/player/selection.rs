// ==========================================
// SELECTION STATE MACHINE
// ==========================================
// Tracks the cursor (which track is highlighted) and the active track
// (which one is playing), and turns UI commands into engine effects.
//
// This module does no I/O. Every transition returns a list of Effects
// for the coordinator to carry out, which keeps the rules testable on
// their own.
//
// Phases:
//   Idle                 nothing playing
//   Playing(i, session)  track i is playing in `session`
//   Queued(j)            track j is waiting for the previous session to
//                        report its Outcome before it may start
//   Errored(err)         a fatal playback error; only Quit is accepted
//
// At most one session is ever live. A Start is only issued when no
// session is playing and no stopped session is still winding down.

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::engine::{Outcome, SessionId};
use super::error::PlaybackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MoveCursor(isize),
    ToggleSelect,
    Quit,
}

// What to do when a session fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    // Show the error and let the user pick again
    #[default]
    Recoverable,
    // Show the error and exit with a failure status
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    Fatal(PlaybackError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Start { session: SessionId, index: usize },
    Stop(SessionId),
    Exit(ExitReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Playing { index: usize, session: SessionId },
    Queued { index: usize },
    Errored(PlaybackError),
}

// What the UI needs to draw one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSnapshot {
    pub cursor: Option<usize>,
    pub active: Option<usize>,
    pub pending: bool,
    pub error: Option<String>,
    pub fatal: bool,
}

#[derive(Debug)]
pub struct SelectionState {
    track_count: usize,
    // None only when the catalog is empty
    cursor: Option<usize>,
    phase: Phase,
    // A session that was told to stop and has not reported back yet
    stopping: Option<SessionId>,
    policy: ErrorPolicy,
    next_session: u64,
    last_error: Option<PlaybackError>,
    quitting: bool,
}

impl SelectionState {
    pub fn new(track_count: usize, policy: ErrorPolicy) -> Self {
        SelectionState {
            track_count,
            cursor: if track_count == 0 { None } else { Some(0) },
            phase: Phase::Idle,
            stopping: None,
            policy,
            next_session: 1,
            last_error: None,
            quitting: false,
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    // The track shown as active: playing, or queued to play next
    pub fn active(&self) -> Option<usize> {
        match self.phase {
            Phase::Playing { index, .. } | Phase::Queued { index } => Some(index),
            Phase::Idle | Phase::Errored(_) => None,
        }
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        let error = match &self.phase {
            Phase::Errored(err) => Some(err.to_string()),
            _ => self.last_error.as_ref().map(ToString::to_string),
        };

        SelectionSnapshot {
            cursor: self.cursor,
            active: self.active(),
            pending: matches!(self.phase, Phase::Queued { .. }),
            error,
            fatal: matches!(self.phase, Phase::Errored(_)),
        }
    }

    pub fn handle(&mut self, command: Command) -> Vec<Effect> {
        if self.quitting {
            return Vec::new();
        }

        match command {
            Command::MoveCursor(delta) => {
                self.move_cursor(delta);
                Vec::new()
            }
            Command::ToggleSelect => self.toggle_select(),
            Command::Quit => self.quit(),
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        if let Some(cursor) = self.cursor {
            let last = self.track_count.saturating_sub(1);
            self.cursor = Some(cursor.saturating_add_signed(delta).min(last));
        }
    }

    fn toggle_select(&mut self) -> Vec<Effect> {
        let Some(cursor) = self.cursor else {
            return Vec::new();
        };

        // A shown error lasts until the user does something about it
        self.last_error = None;

        match self.phase.clone() {
            Phase::Errored(_) => Vec::new(),

            Phase::Idle => {
                if self.stopping.is_some() {
                    // The old session still holds the device
                    self.phase = Phase::Queued { index: cursor };
                    Vec::new()
                } else {
                    vec![self.start(cursor)]
                }
            }

            Phase::Playing { index, session } => {
                self.stopping = Some(session);
                self.phase = if index == cursor {
                    Phase::Idle
                } else {
                    Phase::Queued { index: cursor }
                };
                vec![Effect::Stop(session)]
            }

            Phase::Queued { index } => {
                self.phase = if index == cursor {
                    Phase::Idle
                } else {
                    Phase::Queued { index: cursor }
                };
                Vec::new()
            }
        }
    }

    fn quit(&mut self) -> Vec<Effect> {
        self.quitting = true;

        let mut effects = Vec::new();
        if let Phase::Playing { session, .. } = self.phase {
            self.stopping = Some(session);
            effects.push(Effect::Stop(session));
        }
        self.phase = Phase::Idle;
        effects.push(Effect::Exit(ExitReason::Quit));
        effects
    }

    fn start(&mut self, index: usize) -> Effect {
        let session = SessionId::new(self.next_session);
        self.next_session += 1;
        self.phase = Phase::Playing { index, session };
        Effect::Start { session, index }
    }

    pub fn on_outcome(&mut self, outcome: &Outcome) -> Vec<Effect> {
        if self.stopping == Some(outcome.session) {
            self.stopping = None;

            // The user already moved on from this session, so its
            // failure is not worth interrupting them for
            if let Err(err) = &outcome.result {
                warn!(session = %outcome.session, track = %outcome.track, "stopped session reported: {err}");
            }

            if self.quitting {
                return Vec::new();
            }

            if let Phase::Queued { index } = self.phase {
                return vec![self.start(index)];
            }
            return Vec::new();
        }

        match self.phase {
            Phase::Playing { session, .. } if session == outcome.session => {}
            _ => {
                debug!(session = %outcome.session, "ignoring outcome from a stale session");
                return Vec::new();
            }
        }

        match &outcome.result {
            Ok(end) => {
                info!(session = %outcome.session, ?end, "active session ended");
                self.phase = Phase::Idle;
                Vec::new()
            }
            Err(err) => match self.policy {
                ErrorPolicy::Recoverable => {
                    self.phase = Phase::Idle;
                    self.last_error = Some(err.clone());
                    Vec::new()
                }
                ErrorPolicy::Fatal => {
                    self.phase = Phase::Errored(err.clone());
                    self.quitting = true;
                    vec![Effect::Exit(ExitReason::Fatal(err.clone()))]
                }
            },
        }
    }
}
