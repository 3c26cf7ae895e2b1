//! Process-side control of a GStreamer playback worker.
//!
//! A [`Player`] owns nothing but channel endpoints. The worker thread it
//! spawns owns the pipeline and answers queries through a shared update
//! channel; see [`player::controller`] for how answers are matched to queries.

pub mod config;
pub mod error;
pub mod player;

pub use config::Config;
pub use error::App;
pub use player::{PlaybackState, Player};
