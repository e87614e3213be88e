use super::node::GuildNode;
use serenity::async_trait;
use songbird::{Event, EventContext, EventHandler as VoiceEventHandler};
use std::sync::{Mutex, Weak};
use tokio::sync::oneshot;
use tracing::error;

/// Fires when a track stops on its own: end of stream or playback error.
pub struct TrackEndNotifier {
    pub node: Weak<GuildNode>,
    pub generation: u64,
    pub errored: bool,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let node = self.node.upgrade()?;
        if self.errored {
            if let EventContext::Track(track_list) = ctx {
                for (state, _) in track_list.iter() {
                    error!("[{}] Track errored: {:?}", node.guild_id(), state.playing);
                }
            }
        }
        // The next track may take a while to resolve; keep the driver free.
        let generation = self.generation;
        tokio::spawn(async move { node.on_track_end(generation).await });
        None
    }
}

/// Signals the buffering watchdog that audio is flowing.
pub struct PlayableNotifier {
    ready: Mutex<Option<oneshot::Sender<()>>>,
}

impl PlayableNotifier {
    pub fn new(ready: oneshot::Sender<()>) -> Self {
        Self {
            ready: Mutex::new(Some(ready)),
        }
    }
}

#[async_trait]
impl VoiceEventHandler for PlayableNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        let sender = self.ready.lock().ok().and_then(|mut slot| slot.take());
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
        None
    }
}
