use crate::error::App;
use crate::player::pipeline::{Pipeline, PipelineEvent, PipelineState};
use glib::{ControlFlow, MainContext};
use gstreamer::bus::BusWatchGuard;
use gstreamer::prelude::*;
use gstreamer::{ClockTime, Element, MessageView, SeekFlags};
use log::{debug, error, info};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A `playbin` whose bus is watched from a main context owned by this value.
///
/// Must be created and used on one thread: the worker thread.
pub struct GstPipeline {
    playbin: Element,
    context: MainContext,
    events: Rc<RefCell<VecDeque<PipelineEvent>>>,
    _bus_watch: BusWatchGuard,
}

impl GstPipeline {
    pub fn new(audio_sink: Option<&str>) -> Result<Self, App> {
        gstreamer::init()?;
        let playbin = gstreamer::ElementFactory::make("playbin")
            .name("player")
            .build()
            .map_err(|_| App::Element("Failed to create playbin element".to_string()))?;

        if let Some(description) = audio_sink {
            let sink = gstreamer::parse::bin_from_description(description, true)
                .map_err(|e| App::Element(format!("Invalid audio sink '{description}': {e}")))?;
            playbin.set_property("audio-sink", &sink);
            info!("Using audio sink: {}", description);
        }

        let bus = playbin
            .bus()
            .ok_or_else(|| App::Pipeline("Failed to get GStreamer bus".to_string()))?;

        let context = MainContext::new();
        let events = Rc::new(RefCell::new(VecDeque::new()));
        let bus_watch = context.with_thread_default(|| {
            let events = Rc::clone(&events);
            bus.add_watch_local(move |_, msg| {
                match msg.view() {
                    MessageView::Eos(_) => {
                        debug!("EOS message received");
                        events.borrow_mut().push_back(PipelineEvent::EndOfStream);
                    }
                    MessageView::Error(err) => {
                        let description = match err.debug() {
                            Some(debug) => format!("{} ({debug})", err.error()),
                            None => err.error().to_string(),
                        };
                        events
                            .borrow_mut()
                            .push_back(PipelineEvent::Error(description));
                    }
                    _ => (),
                }
                ControlFlow::Continue
            })
        })??;

        info!("GStreamer created successfully.");
        Ok(Self {
            playbin,
            context,
            events,
            _bus_watch: bus_watch,
        })
    }
}

impl Pipeline for GstPipeline {
    fn set_source(&mut self, uri: &str) -> Result<(), App> {
        self.playbin.set_property("uri", uri);
        Ok(())
    }

    fn set_state(&mut self, state: PipelineState) -> Result<(), App> {
        let target = match state {
            PipelineState::Null => gstreamer::State::Null,
            PipelineState::Paused => gstreamer::State::Paused,
            PipelineState::Playing => gstreamer::State::Playing,
        };
        self.playbin
            .set_state(target)
            .map_err(|_| App::State(format!("Failed to set pipeline to {target:?}")))?;
        Ok(())
    }

    fn seek(&mut self, seconds: u64) -> Result<(), App> {
        self.playbin
            .seek_simple(SeekFlags::FLUSH, ClockTime::from_seconds(seconds))
            .map_err(|e| App::Seek(e.message.to_string()))
    }

    fn volume(&self) -> f64 {
        self.playbin.property::<f64>("volume")
    }

    fn set_volume(&mut self, level: f64) {
        self.playbin.set_property("volume", level);
    }

    fn position(&self) -> Option<u64> {
        self.playbin
            .query_position::<ClockTime>()
            .map(ClockTime::seconds)
    }

    fn duration(&self) -> Option<u64> {
        self.playbin
            .query_duration::<ClockTime>()
            .map(ClockTime::seconds)
    }

    fn poll_events(&mut self) -> Vec<PipelineEvent> {
        while self.context.pending() {
            self.context.iteration(false);
        }
        self.events.borrow_mut().drain(..).collect()
    }
}

impl Drop for GstPipeline {
    fn drop(&mut self) {
        if let Err(e) = self.playbin.set_state(gstreamer::State::Null) {
            error!("Failed to release pipeline: {}", e);
        }
    }
}
