//! The playback worker: sole owner of the pipeline, the playback state and the
//! tags of the loaded media.
//!
//! Each loop iteration services three sources without blocking on any of them
//! for longer than one tick:
//!
//! 1. pending pipeline work (end-of-stream and error events),
//! 2. at most one command,
//! 3. at most one queued media request, only while idle.

use crate::config::Config;
use crate::error::App;
use crate::player::channels::WorkerEnd;
use crate::player::command::{Command, PlaybackState, UpdateKey, UpdateValue};
use crate::player::network::{path_to_uri, Retriever};
use crate::player::pipeline::{Pipeline, PipelineEvent, PipelineState};
use crate::player::tags::{TagReader, TrackTags};
use crossbeam_channel::{bounded, RecvTimeoutError};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct Worker<P, R, T> {
    pipeline: P,
    retriever: R,
    tag_reader: T,
    channels: WorkerEnd,
    state: PlaybackState,
    tags: TrackTags,
    /// URI the current media was queued as.
    uri: Option<String>,
    tick: Duration,
    position_interval: Option<Duration>,
    last_position_sample: Instant,
}

impl<P: Pipeline, R: Retriever, T: TagReader> Worker<P, R, T> {
    pub fn new(
        pipeline: P,
        retriever: R,
        tag_reader: T,
        channels: WorkerEnd,
        config: &Config,
    ) -> Self {
        Self {
            pipeline,
            retriever,
            tag_reader,
            channels,
            state: PlaybackState::Idle,
            tags: TrackTags::default(),
            uri: None,
            tick: config.tick(),
            position_interval: config.position_interval(),
            last_position_sample: Instant::now(),
        }
    }

    #[cfg(test)]
    fn state(&self) -> PlaybackState {
        self.state
    }

    #[cfg(test)]
    fn tags(&self) -> &TrackTags {
        &self.tags
    }

    /// Runs until `running` is cleared or every controller handle is gone.
    pub fn run(mut self, running: &AtomicBool) {
        info!("Playback worker started");
        while running.load(Ordering::SeqCst) {
            if !self.run_once() {
                info!("All controllers dropped");
                break;
            }
        }
        self.retriever.cleanup();
        info!("Playback worker exited");
    }

    /// One pass over pipeline events, the command queue and the media queue.
    /// Returns `false` once the command queue has no senders left.
    pub fn run_once(&mut self) -> bool {
        for event in self.pipeline.poll_events() {
            self.handle_event(event);
        }

        match self.channels.commands.recv_timeout(self.tick) {
            Ok(command) => self.handle_command(command),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return false,
        }

        if self.state == PlaybackState::Idle {
            if let Ok(uri) = self.channels.media.try_recv() {
                self.load(&uri);
            }
        }

        self.sample_position();
        true
    }

    pub fn handle_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::EndOfStream => {
                info!("Track finished playing.");
                self.stop();
            }
            PipelineEvent::Error(description) => {
                self.stop();
                error!("Error from GStreamer pipeline: {}", description);
            }
        }
    }

    pub fn handle_command(&mut self, command: Command) {
        debug!("Handling {:?}", command);
        match command {
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::Stop => self.stop(),
            Command::SetPosition(seconds) => self.set_position(seconds),
            Command::SetVolume(level) => self.set_volume(level),
            Command::GetState => self.publish(UpdateKey::State, UpdateValue::State(self.state)),
            Command::GetDuration => {
                self.publish(UpdateKey::Duration, UpdateValue::Seconds(self.duration()));
            }
            Command::GetPosition => {
                self.publish(UpdateKey::Position, UpdateValue::Seconds(self.position()));
            }
            Command::GetUri => {
                let uri = self.current_uri();
                self.publish(UpdateKey::Uri, UpdateValue::Text(uri));
            }
            Command::GetTitle => {
                let title = self.tags.title.clone().unwrap_or_default();
                self.publish(UpdateKey::Title, UpdateValue::Text(title));
            }
            Command::GetArtist => {
                let artist = self.tags.artist.clone().unwrap_or_default();
                self.publish(UpdateKey::Artist, UpdateValue::Text(artist));
            }
            Command::GetAlbum => {
                let album = self.tags.album.clone().unwrap_or_default();
                self.publish(UpdateKey::Album, UpdateValue::Text(album));
            }
            Command::GetVolume => {
                let volume = self.pipeline.volume();
                self.publish(UpdateKey::Volume, UpdateValue::Level(volume));
            }
        }
    }

    /// Starts playing `uri`, preferring a local copy so tags can be read from it.
    pub fn load(&mut self, uri: &str) {
        self.tags = TrackTags::default();

        let source = match self.retriever.fetch(uri) {
            Ok(path) => {
                match self.tag_reader.read(&path) {
                    Ok(tags) => self.tags = tags,
                    Err(e) => warn!("No tags for {}: {}", uri, e),
                }
                path_to_uri(&path).unwrap_or_else(|| uri.to_string())
            }
            Err(e) => {
                warn!("Failed to retrieve {}, playing it directly: {}", uri, e);
                uri.to_string()
            }
        };

        if let Err(e) = self.start_pipeline(&source) {
            error!("Failed to play {}: {}", uri, e);
            self.stop();
            return;
        }

        self.uri = Some(uri.to_string());
        self.set_state(PlaybackState::Playing);
        info!("playing {} (as {})", uri, source);
    }

    fn start_pipeline(&mut self, source: &str) -> Result<(), App> {
        self.pipeline.set_state(PipelineState::Null)?;
        self.pipeline.set_source(source)?;
        self.pipeline.set_state(PipelineState::Playing)
    }

    pub fn play(&mut self) {
        if self.state != PlaybackState::Paused {
            return;
        }
        match self.pipeline.set_state(PipelineState::Playing) {
            Ok(()) => self.set_state(PlaybackState::Playing),
            Err(e) => error!("Failed to play: {}", e),
        }
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        match self.pipeline.set_state(PipelineState::Paused) {
            Ok(()) => self.set_state(PlaybackState::Paused),
            Err(e) => error!("Failed to pause: {}", e),
        }
    }

    pub fn stop(&mut self) {
        self.retriever.cleanup();
        if let Err(e) = self.pipeline.set_state(PipelineState::Null) {
            error!("Failed to stop: {}", e);
        }
        self.tags = TrackTags::default();
        self.uri = None;
        self.set_state(PlaybackState::Idle);
    }

    pub fn set_position(&mut self, seconds: u64) {
        if seconds > self.duration() {
            debug!("Ignoring seek to {}s past the end", seconds);
            return;
        }
        if let Err(e) = self.pipeline.seek(seconds) {
            error!("Failed to seek to {}s: {}", seconds, e);
        }
    }

    pub fn set_volume(&mut self, level: f64) {
        self.pipeline.set_volume(level);
        self.publish(UpdateKey::Volume, UpdateValue::Level(level));
        info!("volume set to {:.2}", level);
    }

    fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
        self.publish(UpdateKey::State, UpdateValue::State(state));
        info!("state changed to {}", state);
    }

    fn duration(&self) -> u64 {
        if self.state == PlaybackState::Idle {
            return 0;
        }
        self.pipeline.duration().unwrap_or(0)
    }

    fn position(&self) -> u64 {
        if self.state == PlaybackState::Idle {
            return 0;
        }
        self.pipeline.position().unwrap_or(0)
    }

    fn current_uri(&self) -> String {
        if self.state == PlaybackState::Idle {
            return String::new();
        }
        self.uri.clone().unwrap_or_default()
    }

    fn sample_position(&mut self) {
        let Some(interval) = self.position_interval else {
            return;
        };
        if self.state == PlaybackState::Playing && self.last_position_sample.elapsed() >= interval
        {
            self.last_position_sample = Instant::now();
            self.publish(UpdateKey::Position, UpdateValue::Seconds(self.position()));
        }
    }

    fn publish(&self, key: UpdateKey, value: UpdateValue) {
        self.channels.updates.publish(key, value);
    }
}

/// Starts a worker on its own thread.
///
/// `backend` runs on the new thread, so the pipeline it builds never crosses
/// threads. Returns once the backend is built, or with its error.
pub fn spawn<P, R, T, F>(
    backend: F,
    channels: WorkerEnd,
    config: &Config,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, App>
where
    P: Pipeline,
    R: Retriever,
    T: TagReader,
    F: FnOnce() -> Result<(P, R, T), App> + Send + 'static,
{
    let (init_tx, init_rx) = bounded::<Result<(), App>>(1);
    let config = config.clone();

    let handle = thread::Builder::new()
        .name("gsplayer-worker".to_string())
        .spawn(move || match backend() {
            Ok((pipeline, retriever, tag_reader)) => {
                let _ = init_tx.send(Ok(()));
                Worker::new(pipeline, retriever, tag_reader, channels, &config).run(&running);
            }
            Err(e) => {
                let _ = init_tx.send(Err(e));
            }
        })?;

    init_rx
        .recv()
        .map_err(|_| App::Worker("Playback worker exited during startup".to_string()))??;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::channels::{channels, ControllerEnd};
    use crate::player::command::Update;
    use std::path::{Path, PathBuf};

    #[derive(Default)]
    struct FakePipeline {
        state: Option<PipelineState>,
        source: Option<String>,
        volume: f64,
        duration: u64,
        seeks: Vec<u64>,
        events: Vec<PipelineEvent>,
        fail_play: bool,
    }

    impl Pipeline for FakePipeline {
        fn set_source(&mut self, uri: &str) -> Result<(), App> {
            self.source = Some(uri.to_string());
            Ok(())
        }

        fn set_state(&mut self, state: PipelineState) -> Result<(), App> {
            if self.fail_play && state == PipelineState::Playing {
                return Err(App::State("refused".to_string()));
            }
            self.state = Some(state);
            Ok(())
        }

        fn seek(&mut self, seconds: u64) -> Result<(), App> {
            self.seeks.push(seconds);
            Ok(())
        }

        fn volume(&self) -> f64 {
            self.volume
        }

        fn set_volume(&mut self, level: f64) {
            self.volume = level;
        }

        fn position(&self) -> Option<u64> {
            self.seeks.last().copied().or(Some(0))
        }

        fn duration(&self) -> Option<u64> {
            Some(self.duration)
        }

        fn poll_events(&mut self) -> Vec<PipelineEvent> {
            std::mem::take(&mut self.events)
        }
    }

    #[derive(Default)]
    struct FakeRetriever {
        fail: bool,
        cleanups: usize,
    }

    impl Retriever for FakeRetriever {
        fn fetch(&mut self, uri: &str) -> Result<PathBuf, App> {
            if self.fail {
                return Err(App::Fetch(format!("cannot fetch {uri}")));
            }
            Ok(PathBuf::from("/tmp/gsplayer-test.mp3"))
        }

        fn cleanup(&mut self) {
            self.cleanups += 1;
        }
    }

    struct FakeTags(Option<TrackTags>);

    impl TagReader for FakeTags {
        fn read(&self, _path: &Path) -> Result<TrackTags, App> {
            self.0
                .clone()
                .ok_or_else(|| App::Metadata("no tags".to_string()))
        }
    }

    fn tagged() -> TrackTags {
        TrackTags {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
            album: Some("Record".to_string()),
        }
    }

    fn worker(
        tags: Option<TrackTags>,
    ) -> (Worker<FakePipeline, FakeRetriever, FakeTags>, ControllerEnd) {
        let (controller, worker_end) = channels();
        let config = Config {
            tick_ms: 1,
            ..Config::default()
        };
        let pipeline = FakePipeline {
            volume: 1.0,
            duration: 180,
            ..FakePipeline::default()
        };
        let worker = Worker::new(
            pipeline,
            FakeRetriever::default(),
            FakeTags(tags),
            worker_end,
            &config,
        );
        (worker, controller)
    }

    fn drain(controller: &ControllerEnd) -> Vec<Update> {
        controller.updates_rx.try_iter().collect()
    }

    fn states(controller: &ControllerEnd) -> Vec<PlaybackState> {
        drain(controller)
            .into_iter()
            .filter_map(|update| update.value.into_state())
            .collect()
    }

    #[test]
    fn load_plays_local_copy_with_tags() {
        let (mut worker, controller) = worker(Some(tagged()));
        worker.load("http://example.com/track.mp3");

        assert_eq!(worker.state(), PlaybackState::Playing);
        assert_eq!(worker.tags(), &tagged());
        assert_eq!(
            worker.pipeline.source.as_deref(),
            Some("file:///tmp/gsplayer-test.mp3")
        );
        assert_eq!(worker.pipeline.state, Some(PipelineState::Playing));
        assert_eq!(states(&controller), vec![PlaybackState::Playing]);

        worker.handle_command(Command::GetUri);
        let update = controller.updates_rx.try_recv().unwrap();
        assert_eq!(
            update.value,
            UpdateValue::Text("http://example.com/track.mp3".to_string())
        );
    }

    #[test]
    fn failed_retrieval_falls_back_to_raw_uri() {
        let (mut worker, _controller) = worker(Some(tagged()));
        worker.retriever.fail = true;
        worker.load("rtsp://example.com/live");

        assert_eq!(worker.state(), PlaybackState::Playing);
        assert_eq!(worker.pipeline.source.as_deref(), Some("rtsp://example.com/live"));
        assert!(worker.tags().is_empty());
    }

    #[test]
    fn missing_tags_do_not_fail_the_load() {
        let (mut worker, _controller) = worker(None);
        worker.load("http://example.com/track.mp3");
        assert_eq!(worker.state(), PlaybackState::Playing);
        assert!(worker.tags().is_empty());
    }

    #[test]
    fn refused_pipeline_returns_to_idle() {
        let (mut worker, controller) = worker(Some(tagged()));
        worker.pipeline.fail_play = true;
        worker.load("http://example.com/track.mp3");
        assert_eq!(worker.state(), PlaybackState::Idle);
        assert!(worker.tags().is_empty());
        assert_eq!(states(&controller), vec![PlaybackState::Idle]);
    }

    #[test]
    fn play_and_pause_only_act_from_the_right_state() {
        let (mut worker, controller) = worker(None);

        worker.handle_command(Command::Play);
        worker.handle_command(Command::Pause);
        assert_eq!(worker.state(), PlaybackState::Idle);
        assert!(drain(&controller).is_empty());

        worker.load("a.ogg");
        worker.handle_command(Command::Play);
        worker.handle_command(Command::Pause);
        worker.handle_command(Command::Pause);
        worker.handle_command(Command::Play);
        assert_eq!(
            states(&controller),
            vec![
                PlaybackState::Playing,
                PlaybackState::Paused,
                PlaybackState::Playing
            ]
        );
    }

    #[test]
    fn stop_always_reports_idle_and_clears_tags() {
        let (mut worker, controller) = worker(Some(tagged()));
        worker.handle_command(Command::Stop);
        worker.load("a.ogg");
        worker.handle_command(Command::Pause);
        worker.handle_command(Command::Stop);

        assert_eq!(worker.state(), PlaybackState::Idle);
        assert!(worker.tags().is_empty());
        assert_eq!(worker.pipeline.state, Some(PipelineState::Null));
        assert_eq!(worker.retriever.cleanups, 2);
        assert_eq!(
            states(&controller),
            vec![
                PlaybackState::Idle,
                PlaybackState::Playing,
                PlaybackState::Paused,
                PlaybackState::Idle
            ]
        );
    }

    #[test]
    fn seek_past_duration_is_ignored() {
        let (mut worker, controller) = worker(None);
        worker.load("a.ogg");
        worker.handle_command(Command::SetPosition(181));
        worker.handle_command(Command::SetPosition(60));
        worker.handle_command(Command::SetPosition(180));
        assert_eq!(worker.pipeline.seeks, vec![60, 180]);

        drain(&controller);
        worker.handle_command(Command::GetPosition);
        let update = controller.updates_rx.try_recv().unwrap();
        assert_eq!(update.key, UpdateKey::Position);
        assert_eq!(update.value, UpdateValue::Seconds(180));
    }

    #[test]
    fn seek_while_idle_is_ignored() {
        let (mut worker, _controller) = worker(None);
        worker.handle_command(Command::SetPosition(0));
        worker.handle_command(Command::SetPosition(10));
        assert_eq!(worker.pipeline.seeks, vec![0]);
    }

    #[test]
    fn idle_queries_report_zero_and_empty() {
        let (mut worker, controller) = worker(Some(tagged()));
        for command in [
            Command::GetDuration,
            Command::GetPosition,
            Command::GetUri,
            Command::GetTitle,
        ] {
            worker.handle_command(command);
        }
        let values: Vec<UpdateValue> = drain(&controller).into_iter().map(|u| u.value).collect();
        assert_eq!(
            values,
            vec![
                UpdateValue::Seconds(0),
                UpdateValue::Seconds(0),
                UpdateValue::Text(String::new()),
                UpdateValue::Text(String::new()),
            ]
        );
    }

    #[test]
    fn set_volume_publishes_level() {
        let (mut worker, controller) = worker(None);
        worker.handle_command(Command::SetVolume(0.3));
        worker.handle_command(Command::GetVolume);
        let updates = drain(&controller);
        assert_eq!(updates.len(), 2);
        for update in updates {
            assert_eq!(update.key, UpdateKey::Volume);
            assert_eq!(update.value, UpdateValue::Level(0.3));
        }
    }

    #[test]
    fn end_of_stream_and_errors_stop_playback() {
        let (mut worker, controller) = worker(Some(tagged()));
        worker.load("a.ogg");
        worker.pipeline.events.push(PipelineEvent::EndOfStream);
        assert!(worker.run_once());
        assert_eq!(worker.state(), PlaybackState::Idle);

        controller.media.send("b.ogg".to_string()).unwrap();
        assert!(worker.run_once());
        assert_eq!(worker.state(), PlaybackState::Playing);
        worker
            .pipeline
            .events
            .push(PipelineEvent::Error("decoder exploded".to_string()));
        assert!(worker.run_once());
        assert_eq!(worker.state(), PlaybackState::Idle);
        assert!(worker.tags().is_empty());
    }

    #[test]
    fn media_waits_until_idle() {
        let (mut worker, controller) = worker(None);
        controller.media.send("first.ogg".to_string()).unwrap();
        controller.media.send("second.ogg".to_string()).unwrap();

        worker.run_once();
        assert!(worker.pipeline.source.as_deref().unwrap().ends_with(".mp3"));
        worker.retriever.fail = true;
        worker.run_once();
        worker.run_once();
        assert_eq!(worker.state(), PlaybackState::Playing);
        assert_eq!(controller.media.len(), 1);

        controller.commands.send(Command::Stop).unwrap();
        worker.run_once();
        assert_eq!(worker.pipeline.source.as_deref(), Some("second.ogg"));
        assert!(controller.media.is_empty());
    }

    #[test]
    fn commands_run_in_order_one_per_iteration() {
        let (mut worker, controller) = worker(None);
        worker.load("a.ogg");
        drain(&controller);
        controller.commands.send(Command::Pause).unwrap();
        controller.commands.send(Command::GetState).unwrap();
        controller.commands.send(Command::Play).unwrap();
        controller.commands.send(Command::GetState).unwrap();

        worker.run_once();
        assert_eq!(worker.state(), PlaybackState::Paused);
        for _ in 0..3 {
            worker.run_once();
        }
        assert_eq!(
            states(&controller),
            vec![
                PlaybackState::Paused,
                PlaybackState::Paused,
                PlaybackState::Playing,
                PlaybackState::Playing
            ]
        );
    }

    #[test]
    fn position_is_sampled_while_playing() {
        let (mut worker, controller) = worker(None);
        worker.position_interval = Some(Duration::ZERO);
        worker.run_once();
        assert!(drain(&controller).is_empty());

        worker.load("a.ogg");
        drain(&controller);
        worker.run_once();
        let updates = drain(&controller);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].key, UpdateKey::Position);
    }

    #[test]
    fn run_returns_when_controllers_are_gone() {
        let (worker, controller) = worker(None);
        drop(controller);
        let running = AtomicBool::new(true);
        worker.run(&running);
    }

    #[test]
    fn spawn_reports_backend_failure() {
        let (_controller, worker_end) = channels();
        let result = spawn(
            || -> Result<(FakePipeline, FakeRetriever, FakeTags), App> {
                Err(App::Init("no gstreamer here".to_string()))
            },
            worker_end,
            &Config::default(),
            Arc::new(AtomicBool::new(true)),
        );
        assert!(matches!(result, Err(App::Init(_))));
    }
}
