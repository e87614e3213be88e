use poise::serenity_prelude::ChannelId;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Playlist a track was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub title: String,
    pub url: String,
}

/// A single playable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub url: String,
    pub duration: Option<Duration>,
    pub playlist: Option<PlaylistRef>,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            duration: None,
            playlist: None,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Outcome of a search. Empty when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub tracks: Vec<Track>,
    pub playlist: Option<PlaylistRef>,
}

impl SearchResult {
    pub fn has_tracks(&self) -> bool {
        !self.tracks.is_empty()
    }
}

/// How a query string should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// URL when it looks like one, text search otherwise.
    #[default]
    Auto,
    /// Always a text search, even for URL-like input.
    Search,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub requested_by: String,
    pub mode: SearchMode,
}

/// Looping policy applied when the current track ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Queue,
    Autoplay,
}

impl RepeatMode {
    pub const ALL: [RepeatMode; 4] = [
        RepeatMode::Off,
        RepeatMode::Track,
        RepeatMode::Queue,
        RepeatMode::Autoplay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::Track => "track",
            RepeatMode::Queue => "queue",
            RepeatMode::Autoplay => "autoplay",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown repeat mode `{0}`")]
pub struct UnknownRepeatMode(pub String);

impl FromStr for RepeatMode {
    type Err = UnknownRepeatMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        RepeatMode::ALL
            .into_iter()
            .find(|mode| mode.name() == lowered)
            .ok_or_else(|| UnknownRepeatMode(s.to_string()))
    }
}

/// Conversation-scoped data carried by a guild queue.
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    /// Text channel that receives "started playing" announcements.
    pub channel_id: ChannelId,
}

/// Options applied when a guild queue is created.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub metadata: NodeMetadata,
    /// Percentage, 0-100.
    pub volume: u8,
    pub buffering_timeout: Duration,
    pub leave_on_end: bool,
}

/// What `play` enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayOutcome {
    pub track: Track,
    pub playlist: Option<PlaylistRef>,
}
