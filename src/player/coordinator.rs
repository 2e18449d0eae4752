// ==========================================
// COORDINATOR
// ==========================================
// Glue between the Selection State Machine and the Playback Engine.
//
// The UI loop owns one Coordinator and feeds it two kinds of events, in
// the order they arrive:
// - Commands from the keyboard      -> handle()
// - Outcomes from finished sessions -> on_outcome()
//
// Both return Some(reason) when the app should exit. Before exiting the
// caller must await shutdown(), which stops any live session and waits
// for its output device to be released.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use super::catalog::Catalog;
use super::engine::{Outcome, PlaybackEngine};
use super::output::AudioOutput;
use super::selection::{
    Command, Effect, ErrorPolicy, ExitReason, SelectionSnapshot, SelectionState,
};

pub struct Coordinator {
    catalog: Catalog,
    selection: SelectionState,
    engine: PlaybackEngine,
}

impl Coordinator {
    // Must be called from inside a tokio runtime
    pub fn new(
        catalog: Catalog,
        policy: ErrorPolicy,
        output: Arc<dyn AudioOutput>,
    ) -> (Self, mpsc::UnboundedReceiver<Outcome>) {
        let (engine, outcomes) = PlaybackEngine::new(output);
        let coordinator = Coordinator {
            selection: SelectionState::new(catalog.len(), policy),
            catalog,
            engine,
        };
        (coordinator, outcomes)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        self.selection.snapshot()
    }

    pub fn live_sessions(&self) -> usize {
        self.engine.live_count()
    }

    pub fn handle(&mut self, command: Command) -> Option<ExitReason> {
        let effects = self.selection.handle(command);
        self.execute(effects)
    }

    pub fn on_outcome(&mut self, outcome: Outcome) -> Option<ExitReason> {
        self.engine.reap(outcome.session);
        let effects = self.selection.on_outcome(&outcome);
        self.execute(effects)
    }

    pub async fn shutdown(&mut self) {
        self.engine.shutdown().await;
    }

    fn execute(&mut self, effects: Vec<Effect>) -> Option<ExitReason> {
        let mut exit = None;

        for effect in effects {
            match effect {
                Effect::Start { session, index } => match self.catalog.get(index) {
                    Some(entry) => {
                        self.engine.start(session, entry);
                    }
                    None => warn!(index, "start requested for a track outside the catalog"),
                },
                Effect::Stop(session) => {
                    if !self.engine.stop(session) {
                        warn!(%session, "stop requested for an unknown session");
                    }
                }
                Effect::Exit(reason) => exit = Some(reason),
            }
        }

        exit
    }
}
