use std::fmt;
use std::str::FromStr;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(PlaybackState::Idle),
            "playing" => Ok(PlaybackState::Playing),
            "paused" => Ok(PlaybackState::Paused),
            other => Err(format!("Unknown playback state: {other}")),
        }
    }
}

/// Work item for the playback worker. Replies, if any, come back on the update channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Stop,
    SetPosition(u64),
    SetVolume(f64),
    GetState,
    GetDuration,
    GetPosition,
    GetUri,
    GetTitle,
    GetArtist,
    GetAlbum,
    GetVolume,
}

impl Command {
    /// Key of the update a getter command answers with.
    pub fn reply_key(&self) -> Option<UpdateKey> {
        match self {
            Command::GetState => Some(UpdateKey::State),
            Command::GetDuration => Some(UpdateKey::Duration),
            Command::GetPosition => Some(UpdateKey::Position),
            Command::GetUri => Some(UpdateKey::Uri),
            Command::GetTitle => Some(UpdateKey::Title),
            Command::GetArtist => Some(UpdateKey::Artist),
            Command::GetAlbum => Some(UpdateKey::Album),
            Command::GetVolume => Some(UpdateKey::Volume),
            Command::Play | Command::Pause | Command::Stop => Some(UpdateKey::State),
            Command::SetPosition(_) | Command::SetVolume(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKey {
    State,
    Volume,
    Position,
    Duration,
    Title,
    Artist,
    Album,
    Uri,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateValue {
    State(PlaybackState),
    Seconds(u64),
    Level(f64),
    Text(String),
}

impl UpdateValue {
    pub fn into_state(self) -> Option<PlaybackState> {
        match self {
            UpdateValue::State(state) => Some(state),
            _ => None,
        }
    }

    pub fn into_seconds(self) -> Option<u64> {
        match self {
            UpdateValue::Seconds(seconds) => Some(seconds),
            _ => None,
        }
    }

    pub fn into_level(self) -> Option<f64> {
        match self {
            UpdateValue::Level(level) => Some(level),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            UpdateValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// One observation published by the worker, stamped when it was published.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub key: UpdateKey,
    pub value: UpdateValue,
    pub timestamp: Instant,
}
