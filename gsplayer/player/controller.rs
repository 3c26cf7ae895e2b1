//! Caller-facing side of the player.
//!
//! Actions are put on the command queue and return straight away. Queries
//! put a getter command on the queue and then wait for the answer on the
//! update channel, which every in-flight query shares. An update counts as the
//! answer when its key matches and it was published no earlier than the moment
//! the query was issued; anything else is put back for the other readers.
//! Putting back is bounded per read: past `max_requeue` put-backs, stale
//! updates are dropped instead, so leftovers from abandoned queries and
//! position samples cannot pile up forever.

use crate::config::Config;
use crate::error::App;
use crate::player::channels::{channels, ControllerEnd};
use crate::player::command::{Command, PlaybackState, Update, UpdateKey, UpdateValue};
use crate::player::gst_logic::GstPipeline;
use crate::player::network::{HttpRetriever, Retriever};
use crate::player::pipeline::Pipeline;
use crate::player::tags::{LoftyTagReader, TagReader};
use crate::player::worker;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Clears the worker's run flag once the last `Player` handle goes away.
#[derive(Debug)]
struct WorkerGuard {
    running: Arc<AtomicBool>,
}

impl WorkerGuard {
    fn terminate(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Handle on a playback worker. Cheap to clone; every clone drives the same worker.
#[derive(Clone, Debug)]
pub struct Player {
    channels: ControllerEnd,
    guard: Arc<WorkerGuard>,
    wait_timeout: Duration,
    max_requeue: usize,
}

impl Player {
    /// Starts a worker backed by GStreamer, HTTP retrieval and lofty tags.
    pub fn spawn(config: &Config) -> Result<Self, App> {
        let backend_config = config.clone();
        info!("starting gstreamer");
        Self::with_backend(config, move || {
            Ok((
                GstPipeline::new(backend_config.audio_sink.as_deref())?,
                HttpRetriever::new(&backend_config)?,
                LoftyTagReader,
            ))
        })
    }

    /// Starts a worker on whatever `backend` builds. It is called on the worker thread.
    pub fn with_backend<P, R, T, F>(config: &Config, backend: F) -> Result<Self, App>
    where
        P: Pipeline,
        R: Retriever,
        T: TagReader,
        F: FnOnce() -> Result<(P, R, T), App> + Send + 'static,
    {
        let (controller, worker_end) = channels();
        let running = Arc::new(AtomicBool::new(true));
        worker::spawn(backend, worker_end, config, Arc::clone(&running))?;
        Ok(Self {
            channels: controller,
            guard: Arc::new(WorkerGuard { running }),
            wait_timeout: config.wait_timeout(),
            max_requeue: config.max_requeue,
        })
    }

    /// Queues media; it starts once the worker is idle.
    pub fn queue(&self, uri: &str) -> Option<PlaybackState> {
        let since = Instant::now();
        if self.channels.media.send(uri.to_string()).is_err() {
            error!("Failed to queue {}: playback worker is gone", uri);
            return None;
        }
        self.await_update(UpdateKey::State, since)
            .and_then(UpdateValue::into_state)
    }

    pub fn play(&self) -> Option<PlaybackState> {
        self.request(Command::Play).and_then(UpdateValue::into_state)
    }

    pub fn pause(&self) -> Option<PlaybackState> {
        self.request(Command::Pause).and_then(UpdateValue::into_state)
    }

    pub fn stop(&self) -> Option<PlaybackState> {
        self.request(Command::Stop).and_then(UpdateValue::into_state)
    }

    /// Skips to the next queued media.
    pub fn next(&self) -> Option<PlaybackState> {
        self.stop()
    }

    pub fn mute(&self) {
        self.set_volume(0.0);
    }

    pub fn set_volume(&self, level: f64) {
        self.send(Command::SetVolume(level));
    }

    pub fn set_position(&self, seconds: u64) {
        self.send(Command::SetPosition(seconds));
    }

    pub fn state(&self) -> Option<PlaybackState> {
        self.request(Command::GetState)
            .and_then(UpdateValue::into_state)
    }

    pub fn duration(&self) -> Option<u64> {
        self.request(Command::GetDuration)
            .and_then(UpdateValue::into_seconds)
    }

    pub fn position(&self) -> Option<u64> {
        self.request(Command::GetPosition)
            .and_then(UpdateValue::into_seconds)
    }

    pub fn uri(&self) -> Option<String> {
        self.request(Command::GetUri).and_then(UpdateValue::into_text)
    }

    pub fn title(&self) -> Option<String> {
        self.request(Command::GetTitle)
            .and_then(UpdateValue::into_text)
    }

    pub fn artist(&self) -> Option<String> {
        self.request(Command::GetArtist)
            .and_then(UpdateValue::into_text)
    }

    pub fn album(&self) -> Option<String> {
        self.request(Command::GetAlbum)
            .and_then(UpdateValue::into_text)
    }

    pub fn volume(&self) -> Option<f64> {
        self.request(Command::GetVolume)
            .and_then(UpdateValue::into_level)
    }

    /// Terminates the worker without waiting for it.
    pub fn quit(&self) {
        info!("terminating gstreamer");
        self.guard.terminate();
    }

    fn send(&self, command: Command) -> bool {
        match self.channels.commands.send(command) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send {:?}: playback worker is gone", e.into_inner());
                false
            }
        }
    }

    fn request(&self, command: Command) -> Option<UpdateValue> {
        let key = command.reply_key()?;
        let since = Instant::now();
        if !self.send(command) {
            return None;
        }
        self.await_update(key, since)
    }

    fn await_update(&self, key: UpdateKey, since: Instant) -> Option<UpdateValue> {
        await_update(
            &self.channels.updates_rx,
            &self.channels.updates_tx,
            key,
            since,
            self.wait_timeout,
            self.max_requeue,
        )
    }
}

/// Waits until `since + timeout` for an update with `key` published at or after `since`.
///
/// Every other update is sent back to the tail of the channel, except that a
/// stale one (published before `since`) is dropped once `max_requeue` updates
/// have already been sent back by this call. Returns `None` on timeout.
pub fn await_update(
    updates_rx: &Receiver<Update>,
    updates_tx: &Sender<Update>,
    key: UpdateKey,
    since: Instant,
    timeout: Duration,
    max_requeue: usize,
) -> Option<UpdateValue> {
    let deadline = since + timeout;
    let mut requeued = 0usize;

    loop {
        let now = Instant::now();
        if now >= deadline {
            warn!("No {:?} update within {:?}", key, timeout);
            return None;
        }

        let update = match updates_rx.recv_timeout(deadline - now) {
            Ok(update) => update,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                error!("Update channel closed while waiting for {:?}", key);
                return None;
            }
        };

        if update.key == key && update.timestamp >= since {
            return Some(update.value);
        }

        if update.timestamp < since && requeued >= max_requeue {
            debug!("Dropping stale {:?} update", update.key);
            continue;
        }

        requeued += 1;
        if updates_tx.send(update).is_err() {
            error!("Failed to requeue update");
        }
        thread::yield_now();
    }
}
