//! Audio-queue engine. Commands only see the [`MusicEngine`] and
//! [`QueueHandle`] traits; [`Player`] implements them on top of songbird.

pub mod driver;
pub mod engine;
pub mod events;
pub mod node;
pub mod progress;
pub mod queue;
pub mod source;
pub mod track;

use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId};
use std::sync::Arc;

pub use engine::Player;
pub use track::{
    NodeMetadata, NodeOptions, PlayOutcome, PlaylistRef, RepeatMode, SearchMode, SearchOptions,
    SearchResult, Track,
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Failed to join voice channel: {0}")]
    Join(String),

    #[error("No previous track in history")]
    NoHistory,

    #[error("Search returned no tracks")]
    NoResults,

    #[error("Failed to resolve track: {0}")]
    Resolve(String),

    #[error("Track control failed: {0}")]
    Control(String),
}

/// Entry point of the audio engine, shared by every guild.
#[async_trait]
pub trait MusicEngine: Send + Sync {
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<SearchResult, EngineError>;

    /// Enqueues `result` into the guild queue, creating it (and joining
    /// `voice_channel`) when absent. Playlists are enqueued whole, other
    /// results contribute their first track.
    async fn play(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        result: SearchResult,
        options: NodeOptions,
    ) -> Result<PlayOutcome, EngineError>;

    async fn queue(&self, guild_id: GuildId) -> Option<Arc<dyn QueueHandle>>;

    /// Stops playback and forgets the guild queue.
    async fn delete_queue(&self, guild_id: GuildId) -> bool;
}

/// A single guild's playback queue.
#[async_trait]
pub trait QueueHandle: Send + Sync {
    /// Pending tracks, next first.
    async fn tracks(&self) -> Vec<Track>;
    async fn clear(&self) -> Result<(), EngineError>;
    async fn shuffle(&self);

    async fn previous_track(&self) -> Option<Track>;
    /// Replays the most recent history entry.
    async fn previous(&self) -> Result<Track, EngineError>;

    /// Skips to pending track `index`, returning it.
    async fn jump(&self, index: usize) -> Option<Track>;
    async fn remove(&self, index: usize) -> Option<Track>;

    async fn progress_bar(&self) -> Option<String>;
    async fn set_paused(&self, paused: bool) -> bool;
    async fn skip(&self) -> bool;

    async fn set_repeat_mode(&self, mode: RepeatMode);

    async fn current_track(&self) -> Option<Track>;
    /// True while a track is loaded, paused or not.
    async fn is_playing(&self) -> bool;
}
