pub mod channels;
pub mod command;
pub mod controller;
pub mod gst_logic;
pub mod network;
pub mod pipeline;
pub mod tags;
pub mod worker;

pub use self::command::{Command, PlaybackState, Update, UpdateKey, UpdateValue};
pub use self::pipeline::{Pipeline, PipelineEvent, PipelineState};
pub use controller::Player;
pub use gst_logic::GstPipeline;
pub use network::{HttpRetriever, Retriever};
pub use tags::{LoftyTagReader, TagReader, TrackTags};
