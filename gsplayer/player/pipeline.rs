use crate::error::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Null,
    Paused,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    EndOfStream,
    Error(String),
}

/// The media engine the worker drives. Only the worker thread ever touches it.
pub trait Pipeline {
    fn set_source(&mut self, uri: &str) -> Result<(), App>;

    fn set_state(&mut self, state: PipelineState) -> Result<(), App>;

    /// Flushing seek to an absolute position.
    fn seek(&mut self, seconds: u64) -> Result<(), App>;

    fn volume(&self) -> f64;

    fn set_volume(&mut self, level: f64);

    /// Whole seconds, `None` when the engine cannot answer yet.
    fn position(&self) -> Option<u64>;

    fn duration(&self) -> Option<u64>;

    /// Runs pending engine work and hands back the events it produced.
    fn poll_events(&mut self) -> Vec<PipelineEvent>;
}
