//! Seam between the command layer and the chat gateway.

use crate::Error;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use serenity::{ChannelId, CreateEmbed, CreateMessage, GuildId, Message, ShardManager};
use std::sync::Arc;
use std::time::Duration;

/// The parts of an inbound chat message the bot looks at.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub content: String,
    pub author_name: String,
    pub author_is_bot: bool,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    /// Voice channel the author is connected to, if any.
    pub voice_channel: Option<ChannelId>,
}

impl Inbound {
    pub fn from_message(ctx: &serenity::Context, message: &Message) -> Self {
        let voice_channel = message
            .guild_id
            .and_then(|guild_id| ctx.cache.guild(guild_id))
            .and_then(|guild| {
                guild
                    .voice_states
                    .get(&message.author.id)
                    .and_then(|vs| vs.channel_id)
            });

        Self {
            content: message.content.clone(),
            author_name: message.author.name.clone(),
            author_is_bot: message.author.bot,
            guild_id: message.guild_id,
            channel_id: message.channel_id,
            voice_channel,
        }
    }
}

/// Titled embed made of inline fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEmbed {
    pub title: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
}

impl FieldEmbed {
    pub fn to_embed(&self) -> CreateEmbed {
        self.fields.iter().fold(
            CreateEmbed::new()
                .title(&self.title)
                .description(&self.description)
                .color(0x5865F2),
            |embed, (name, value)| embed.field(name, value, true),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Embed(FieldEmbed),
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

/// Outbound side of the gateway, scoped to one inbound message.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Reply to the inbound message.
    async fn reply(&self, reply: Reply) -> Result<(), Error>;
    /// Post in the inbound message's channel without referencing it.
    async fn send(&self, content: String) -> Result<(), Error>;
    /// Heartbeat latency of the shard that delivered the message.
    async fn latency(&self) -> Option<Duration>;
}

pub struct MessageResponder<'a> {
    ctx: &'a serenity::Context,
    message: &'a Message,
    shard_manager: Arc<ShardManager>,
}

impl<'a> MessageResponder<'a> {
    pub fn new(
        ctx: &'a serenity::Context,
        message: &'a Message,
        shard_manager: Arc<ShardManager>,
    ) -> Self {
        Self {
            ctx,
            message,
            shard_manager,
        }
    }
}

#[async_trait]
impl Responder for MessageResponder<'_> {
    async fn reply(&self, reply: Reply) -> Result<(), Error> {
        match reply {
            Reply::Text(text) => {
                self.message.reply(&self.ctx.http, text).await?;
            }
            Reply::Embed(embed) => {
                let builder = CreateMessage::new()
                    .embed(embed.to_embed())
                    .reference_message(self.message);
                self.message
                    .channel_id
                    .send_message(&self.ctx.http, builder)
                    .await?;
            }
        }
        Ok(())
    }

    async fn send(&self, content: String) -> Result<(), Error> {
        self.message.channel_id.say(&self.ctx.http, content).await?;
        Ok(())
    }

    async fn latency(&self) -> Option<Duration> {
        let runners = self.shard_manager.runners.lock().await;
        runners.get(&self.ctx.shard_id)?.latency
    }
}
