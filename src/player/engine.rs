use super::driver::SongbirdDriver;
use super::node::{GuildNode, NodeRegistry};
use super::source::YtDlp;
use super::track::{NodeOptions, PlayOutcome, SearchOptions, SearchResult};
use super::{EngineError, MusicEngine, QueueHandle};
use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId, Http};
use songbird::Songbird;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Guild queues backed by songbird voice connections and yt-dlp.
pub struct Player {
    nodes: Arc<NodeRegistry>,
    manager: Arc<Songbird>,
    http: Arc<Http>,
    http_client: reqwest::Client,
    source: YtDlp,
}

impl Player {
    pub fn new(
        manager: Arc<Songbird>,
        http: Arc<Http>,
        http_client: reqwest::Client,
        source: YtDlp,
    ) -> Self {
        Self {
            nodes: Arc::new(Mutex::new(HashMap::new())),
            manager,
            http,
            http_client,
            source,
        }
    }

    /// Returns the guild node, joining `voice_channel` when there is none yet.
    async fn node_or_join(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        options: NodeOptions,
    ) -> Result<Arc<GuildNode>, EngineError> {
        let mut nodes = self.nodes.lock().await;
        if let Some(node) = nodes.get(&guild_id) {
            return Ok(node.clone());
        }

        let call = self
            .manager
            .join(guild_id, voice_channel)
            .await
            .map_err(|e| EngineError::Join(e.to_string()))?;
        {
            let mut handler = call.lock().await;
            if let Err(e) = handler.deafen(true).await {
                warn!("[{}] Failed to self-deafen: {}", guild_id, e);
            }
        }

        info!("[{}] Created queue in voice channel {}", guild_id, voice_channel);
        let driver = SongbirdDriver {
            guild_id,
            call,
            manager: self.manager.clone(),
            http: self.http.clone(),
            http_client: self.http_client.clone(),
            source: self.source.clone(),
        };
        let node = GuildNode::new(
            guild_id,
            Arc::new(driver),
            Arc::downgrade(&self.nodes),
            options,
        );
        nodes.insert(guild_id, node.clone());
        Ok(node)
    }
}

#[async_trait]
impl MusicEngine for Player {
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<SearchResult, EngineError> {
        self.source.search(query, &options).await
    }

    async fn play(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        result: SearchResult,
        options: NodeOptions,
    ) -> Result<PlayOutcome, EngineError> {
        let SearchResult { mut tracks, playlist } = result;
        if tracks.is_empty() {
            return Err(EngineError::NoResults);
        }
        if playlist.is_none() {
            tracks.truncate(1);
        }
        let outcome = PlayOutcome {
            track: tracks[0].clone(),
            playlist,
        };

        let node = self
            .node_or_join(guild_id, voice_channel, options.clone())
            .await?;
        if node.enqueue(tracks.clone()).await.is_err() {
            // Left voice after the lookup; the registry no longer holds it.
            debug!("[{}] Queue went away while enqueuing, rejoining", guild_id);
            let node = self.node_or_join(guild_id, voice_channel, options).await?;
            node.enqueue(tracks).await?;
        }
        Ok(outcome)
    }

    async fn queue(&self, guild_id: GuildId) -> Option<Arc<dyn QueueHandle>> {
        let nodes = self.nodes.lock().await;
        nodes
            .get(&guild_id)
            .map(|node| node.clone() as Arc<dyn QueueHandle>)
    }

    async fn delete_queue(&self, guild_id: GuildId) -> bool {
        let node = self.nodes.lock().await.remove(&guild_id);
        match node {
            Some(node) => {
                node.destroy().await;
                info!("[{}] Deleted queue", guild_id);
                true
            }
            None => false,
        }
    }
}
