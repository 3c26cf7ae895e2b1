#![allow(dead_code)]

use gsplayer::error::App;
use gsplayer::player::{Pipeline, PipelineEvent, PipelineState, Retriever, TagReader, TrackTags};
use gsplayer::{Config, Player};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// What the scripted pipeline has been told to do, shared with the test thread.
#[derive(Debug, Default)]
pub struct PipelineLog {
    pub state: Option<PipelineState>,
    pub source: Option<String>,
    pub volume: f64,
    pub duration: u64,
    pub position: u64,
    pub pending: Vec<PipelineEvent>,
    pub stall: Duration,
}

#[derive(Clone, Default)]
pub struct ScriptedPipeline {
    pub log: Arc<Mutex<PipelineLog>>,
}

impl ScriptedPipeline {
    pub fn with_duration(duration: u64) -> Self {
        let pipeline = Self::default();
        {
            let mut log = pipeline.log.lock().unwrap();
            log.duration = duration;
            log.volume = 1.0;
        }
        pipeline
    }

    pub fn emit(&self, event: PipelineEvent) {
        self.log.lock().unwrap().pending.push(event);
    }

    pub fn stall_for(&self, stall: Duration) {
        self.log.lock().unwrap().stall = stall;
    }
}

impl Pipeline for ScriptedPipeline {
    fn set_source(&mut self, uri: &str) -> Result<(), App> {
        self.log.lock().unwrap().source = Some(uri.to_string());
        Ok(())
    }

    fn set_state(&mut self, state: PipelineState) -> Result<(), App> {
        let mut log = self.log.lock().unwrap();
        if state == PipelineState::Null {
            log.position = 0;
        }
        log.state = Some(state);
        Ok(())
    }

    fn seek(&mut self, seconds: u64) -> Result<(), App> {
        self.log.lock().unwrap().position = seconds;
        Ok(())
    }

    fn volume(&self) -> f64 {
        self.log.lock().unwrap().volume
    }

    fn set_volume(&mut self, level: f64) {
        self.log.lock().unwrap().volume = level;
    }

    fn position(&self) -> Option<u64> {
        Some(self.log.lock().unwrap().position)
    }

    fn duration(&self) -> Option<u64> {
        Some(self.log.lock().unwrap().duration)
    }

    fn poll_events(&mut self) -> Vec<PipelineEvent> {
        let stall = std::mem::take(&mut self.log.lock().unwrap().stall);
        if !stall.is_zero() {
            thread::sleep(stall);
        }
        std::mem::take(&mut self.log.lock().unwrap().pending)
    }
}

/// Retrieval that either always fails or hands back a fixed path.
pub struct StubRetriever {
    pub path: Option<PathBuf>,
}

impl Retriever for StubRetriever {
    fn fetch(&mut self, uri: &str) -> Result<PathBuf, App> {
        self.path
            .clone()
            .ok_or_else(|| App::Fetch(format!("offline: {uri}")))
    }

    fn cleanup(&mut self) {}
}

pub struct StubTags(pub TrackTags);

impl TagReader for StubTags {
    fn read(&self, _path: &Path) -> Result<TrackTags, App> {
        Ok(self.0.clone())
    }
}

pub fn song_tags() -> TrackTags {
    TrackTags {
        title: Some("Song".to_string()),
        artist: Some("Band".to_string()),
        album: Some("Record".to_string()),
    }
}

pub fn test_config() -> Config {
    Config {
        wait_timeout_ms: 300,
        tick_ms: 1,
        ..Config::default()
    }
}

/// A player whose retrieval fails, so every URI is played as given.
pub fn offline_player(pipeline: &ScriptedPipeline) -> Player {
    offline_player_with(pipeline, &test_config())
}

pub fn offline_player_with(pipeline: &ScriptedPipeline, config: &Config) -> Player {
    let pipeline = pipeline.clone();
    Player::with_backend(config, move || {
        Ok((
            pipeline,
            StubRetriever { path: None },
            StubTags(TrackTags::default()),
        ))
    })
    .unwrap()
}

/// A player that "downloads" everything to `/tmp/track.mp3` tagged with [`song_tags`].
pub fn tagged_player(pipeline: &ScriptedPipeline) -> Player {
    let pipeline = pipeline.clone();
    Player::with_backend(&test_config(), move || {
        Ok((
            pipeline,
            StubRetriever {
                path: Some(PathBuf::from("/tmp/track.mp3")),
            },
            StubTags(song_tags()),
        ))
    })
    .unwrap()
}

/// Polls `check` until it holds or `timeout` passes.
pub fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}
