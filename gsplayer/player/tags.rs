use crate::error::App;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::Accessor;
use std::borrow::Cow;
use std::path::Path;

/// Title, artist and album of the loaded media, when the file carries them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl TrackTags {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.album.is_none()
    }
}

pub trait TagReader {
    fn read(&self, path: &Path) -> Result<TrackTags, App>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read(&self, path: &Path) -> Result<TrackTags, App> {
        let tagged_file = Probe::open(path)?.guess_file_type()?.read()?;
        let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        else {
            return Ok(TrackTags::default());
        };

        Ok(TrackTags {
            title: tag.title().map(Cow::into_owned),
            artist: tag.artist().map(Cow::into_owned),
            album: tag.album().map(Cow::into_owned),
        })
    }
}
