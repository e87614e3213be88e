//! Voice backend behind a [`GuildNode`]: opens streams, controls the
//! playing track and talks to the text channel.

use super::events::{PlayableNotifier, TrackEndNotifier};
use super::node::GuildNode;
use super::source::YtDlp;
use super::track::Track;
use super::EngineError;
use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId, Http};
use songbird::input::{Compose, Input, LiveInput, YoutubeDl};
use songbird::tracks::{ControlError, TrackHandle};
use songbird::{Call, Event, Songbird, TrackEvent};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::warn;

/// Control over one started track.
#[async_trait]
pub trait Playback: Send + Sync {
    fn stop(&self);
    fn set_paused(&self, paused: bool) -> bool;
    async fn position(&self) -> Option<Duration>;
}

/// A track the driver accepted.
pub struct Started {
    pub playback: Arc<dyn Playback>,
    /// Resolves once audio is flowing.
    pub ready: oneshot::Receiver<()>,
}

#[async_trait]
pub trait VoiceDriver: Send + Sync {
    /// Opens `track` and starts it. End events go to `node`, tagged with
    /// `generation`.
    async fn start(
        &self,
        track: &Track,
        volume: u8,
        node: Weak<GuildNode>,
        generation: u64,
    ) -> Result<Started, EngineError>;

    /// Candidates for autoplay after `seed`.
    async fn related(&self, seed: &Track) -> Result<Vec<Track>, EngineError>;

    async fn announce(&self, channel_id: ChannelId, content: String);

    /// Disconnects from voice.
    async fn leave(&self);
}

#[async_trait]
impl Playback for TrackHandle {
    fn stop(&self) {
        let _ = TrackHandle::stop(self);
    }

    fn set_paused(&self, paused: bool) -> bool {
        let result = if paused { self.pause() } else { self.play() };
        result.is_ok()
    }

    async fn position(&self) -> Option<Duration> {
        self.get_info().await.ok().map(|info| info.position)
    }
}

/// One guild's songbird call, fed by yt-dlp.
pub struct SongbirdDriver {
    pub guild_id: GuildId,
    pub call: Arc<Mutex<Call>>,
    pub manager: Arc<Songbird>,
    pub http: Arc<Http>,
    pub http_client: reqwest::Client,
    pub source: YtDlp,
}

fn register_events(
    handle: &TrackHandle,
    node: Weak<GuildNode>,
    generation: u64,
) -> Result<oneshot::Receiver<()>, ControlError> {
    for (event, errored) in [(TrackEvent::End, false), (TrackEvent::Error, true)] {
        let notifier = TrackEndNotifier {
            node: node.clone(),
            generation,
            errored,
        };
        handle.add_event(Event::Track(event), notifier)?;
    }

    let (ready_tx, ready_rx) = oneshot::channel();
    handle.add_event(
        Event::Track(TrackEvent::Playable),
        PlayableNotifier::new(ready_tx),
    )?;
    Ok(ready_rx)
}

#[async_trait]
impl VoiceDriver for SongbirdDriver {
    async fn start(
        &self,
        track: &Track,
        volume: u8,
        node: Weak<GuildNode>,
        generation: u64,
    ) -> Result<Started, EngineError> {
        let mut ytdl = YoutubeDl::new_ytdl_like(
            self.source.program(),
            self.http_client.clone(),
            track.url.clone(),
        );
        let stream = ytdl
            .create_async()
            .await
            .map_err(|e| EngineError::Resolve(format!("{}: {}", track.url, e)))?;
        let input = Input::Live(LiveInput::Raw(stream), Some(Box::new(ytdl)));

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };
        if let Err(e) = handle.set_volume(f32::from(volume) / 100.0) {
            warn!("[{}] Failed to set volume: {}", self.guild_id, e);
        }

        match register_events(&handle, node, generation) {
            Ok(ready) => Ok(Started {
                playback: Arc::new(handle),
                ready,
            }),
            Err(e) => {
                let _ = handle.stop();
                Err(EngineError::Control(e.to_string()))
            }
        }
    }

    async fn related(&self, seed: &Track) -> Result<Vec<Track>, EngineError> {
        self.source.related(seed).await
    }

    async fn announce(&self, channel_id: ChannelId, content: String) {
        if let Err(e) = channel_id.say(&self.http, content).await {
            warn!("[{}] Failed to announce track: {}", self.guild_id, e);
        }
    }

    async fn leave(&self) {
        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("[{}] Failed to leave voice channel: {}", self.guild_id, e);
        }
    }
}
