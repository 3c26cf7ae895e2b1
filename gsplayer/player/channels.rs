//! The three queues between a controller and its worker.
//!
//! All of them are unbounded multi-producer multi-consumer queues, so the
//! controller can put an update it is not interested in back on the same
//! channel it read it from.

use crate::player::command::{Command, Update, UpdateKey, UpdateValue};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::time::Instant;

#[derive(Clone, Debug)]
pub struct UpdateSender {
    tx: Sender<Update>,
}

impl UpdateSender {
    pub fn new(tx: Sender<Update>) -> Self {
        Self { tx }
    }

    /// Appends an update stamped with the current time. A closed channel is ignored.
    pub fn publish(&self, key: UpdateKey, value: UpdateValue) {
        let update = Update {
            key,
            value,
            timestamp: Instant::now(),
        };
        if self.tx.send(update).is_err() {
            log::debug!("No controller listening for {key:?} update");
        }
    }
}

/// Worker side of the queues.
#[derive(Clone, Debug)]
pub struct WorkerEnd {
    pub commands: Receiver<Command>,
    pub media: Receiver<String>,
    pub updates: UpdateSender,
}

/// Controller side of the queues. The update sender is kept for requeueing.
#[derive(Clone, Debug)]
pub struct ControllerEnd {
    pub commands: Sender<Command>,
    pub media: Sender<String>,
    pub updates_rx: Receiver<Update>,
    pub updates_tx: Sender<Update>,
}

pub fn channels() -> (ControllerEnd, WorkerEnd) {
    let (command_tx, command_rx) = unbounded();
    let (media_tx, media_rx) = unbounded();
    let (update_tx, update_rx) = unbounded();
    (
        ControllerEnd {
            commands: command_tx,
            media: media_tx,
            updates_rx: update_rx,
            updates_tx: update_tx.clone(),
        },
        WorkerEnd {
            commands: command_rx,
            media: media_rx,
            updates: UpdateSender::new(update_tx),
        },
    )
}
