//! Unified UI output interface.
//!
//! [`Output`] is the terminal [`Reporter`]: every call becomes an event for
//! the UI actor, so it can be cloned into any number of install workers.

use std::sync::{OnceLock, mpsc};

use quiver_core::{Level, Reporter, Slot};
use tokio::sync::oneshot;

use super::actor::{UiActor, UiEvent};

/// Singleton instance of the UI actor channel.
static UI_ACTOR: OnceLock<mpsc::Sender<UiEvent>> = OnceLock::new();

fn actor_sender() -> mpsc::Sender<UiEvent> {
    UI_ACTOR
        .get_or_init(|| {
            let actor = UiActor::spawn();
            let sender = actor.sender();
            // Keep actor alive for program duration
            std::mem::forget(actor);
            sender
        })
        .clone()
}

/// A cloneable handle for sending UI events to the terminal actor.
#[derive(Debug, Clone)]
pub struct Output {
    sender: mpsc::Sender<UiEvent>,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self {
            sender: actor_sender(),
        }
    }

    fn send(&self, event: UiEvent) {
        let _ = self.sender.send(event);
    }

    /// Reserve one display row per package argument.
    pub fn reserve(&self, rows: usize) {
        self.send(UiEvent::Reserve { rows });
    }

    /// Release the rows and wait until everything sent so far is on screen.
    pub async fn finish(&self) {
        self.send(UiEvent::Finish);
        let (tx, rx) = oneshot::channel();
        self.send(UiEvent::Sync(tx));
        let _ = rx.await;
    }
}

impl Reporter for Output {
    fn set_prefix(&self, slot: Slot, prefix: &str) {
        self.send(UiEvent::Prefix {
            slot,
            prefix: prefix.to_string(),
        });
    }

    fn status(&self, slot: Slot, level: Level, msg: &str) {
        self.send(UiEvent::Status {
            slot,
            level,
            msg: msg.to_string(),
        });
    }

    fn working(&self, slot: Slot, msg: &str, done: oneshot::Receiver<()>) {
        self.send(UiEvent::Working {
            slot,
            msg: msg.to_string(),
            done,
        });
    }

    fn downloading(&self, slot: Slot, current: u64, total: Option<u64>) {
        self.send(UiEvent::Downloading {
            slot,
            current,
            total,
        });
    }

    fn info(&self, msg: &str) {
        self.send(UiEvent::Info(msg.to_string()));
    }

    fn warning(&self, msg: &str) {
        self.send(UiEvent::Warning(msg.to_string()));
    }
}
