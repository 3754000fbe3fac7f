//! Async driver for a [`GazeTracker`]
//!
//! Pointer events come in on an mpsc channel; asset loads run on the
//! blocking pool and report back on a second channel. The latest
//! [`AssetState`] is published through a `watch` channel, so readers always
//! see the newest selection and never an intermediate one.

use super::asset::{AssetLoader, AssetState, LoadedAsset};
use super::pointer::{PointerSample, Viewport};
use super::tracker::{AssetTicket, GazeTracker};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Input to a running session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Move(PointerSample),
    Resize(Viewport),
}

type Completion = (AssetTicket, crate::Result<LoadedAsset>);

pub struct GazeSession<L: AssetLoader> {
    tracker: GazeTracker,
    loader: Arc<L>,
    state_tx: watch::Sender<AssetState>,
}

impl<L: AssetLoader> GazeSession<L> {
    pub fn new(tracker: GazeTracker, loader: Arc<L>) -> (Self, watch::Receiver<AssetState>) {
        let (state_tx, state_rx) = watch::channel(tracker.state().clone());
        (
            Self {
                tracker,
                loader,
                state_tx,
            },
            state_rx,
        )
    }

    /// Process events until the sender side closes.
    ///
    /// After the channel closes, the load for the final selection (if any)
    /// is awaited so the returned tracker reflects it.
    pub async fn run(mut self, mut events: mpsc::Receiver<PointerEvent>) -> GazeTracker {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();

        if let Some(ticket) = self.tracker.start() {
            self.spawn_load(ticket, &done_tx);
        }
        self.publish();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(PointerEvent::Move(sample)) => {
                        let before = self.tracker.generation();
                        if let Some(ticket) = self.tracker.on_pointer(sample) {
                            self.spawn_load(ticket, &done_tx);
                        }
                        if self.tracker.generation() != before {
                            self.publish();
                        }
                    }
                    Some(PointerEvent::Resize(viewport)) => self.tracker.set_viewport(viewport),
                    None => break,
                },
                Some((ticket, result)) = done_rx.recv() => {
                    if self.tracker.on_loaded(&ticket, result) {
                        self.publish();
                    }
                }
            }
        }

        while self.tracker.state().is_loading() {
            let Some((ticket, result)) = done_rx.recv().await else {
                break;
            };
            if self.tracker.on_loaded(&ticket, result) {
                self.publish();
            }
        }

        info!(
            swaps = self.tracker.swaps(),
            discarded = self.tracker.discarded_loads(),
            "Gaze session finished"
        );
        self.tracker
    }

    fn spawn_load(&self, ticket: AssetTicket, done_tx: &mpsc::UnboundedSender<Completion>) {
        debug!(filename = %ticket.filename, generation = ticket.generation, "Loading asset");
        let loader = self.loader.clone();
        let done_tx = done_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = loader.load(&ticket.filename);
            // Receiver is gone once the session has returned
            let _ = done_tx.send((ticket, result));
        });
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.tracker.state().clone());
    }
}
