use flexi_logger::FlexiLoggerError;
use glib::BoolError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum App {
    #[error("Network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("GStreamer initialization error: {0}")]
    Init(String),

    #[error("GStreamer element error: {0}")]
    Element(String),

    #[error("GStreamer pipeline error: {0}")]
    Pipeline(String),

    #[error("GStreamer state error: {0}")]
    State(String),

    #[error("GStreamer seek error: {0}")]
    Seek(String),

    #[error("TOML parsing error: {0}")]
    TomlParsing(String),

    #[error("Logger initialization error: {0}")]
    Logger(String),

    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<reqwest::Error> for App {
    fn from(error: reqwest::Error) -> Self {
        App::Network(error.to_string())
    }
}

impl From<io::Error> for App {
    fn from(error: io::Error) -> Self {
        App::Io(error.to_string())
    }
}

impl From<toml::de::Error> for App {
    fn from(error: toml::de::Error) -> Self {
        App::TomlParsing(error.to_string())
    }
}

impl From<lofty::error::LoftyError> for App {
    fn from(error: lofty::error::LoftyError) -> Self {
        App::Metadata(error.to_string())
    }
}

impl From<FlexiLoggerError> for App {
    fn from(error: FlexiLoggerError) -> Self {
        App::Logger(error.to_string())
    }
}

impl From<BoolError> for App {
    fn from(error: BoolError) -> Self {
        App::Pipeline(error.message.to_string())
    }
}

impl From<glib::Error> for App {
    fn from(error: glib::Error) -> Self {
        App::Init(error.to_string())
    }
}
