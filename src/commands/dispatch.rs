//! Routes parsed commands to the audio engine and answers through the gateway.

use super::format::{format_enqueued, format_track};
use super::help::help_embed;
use super::parser::{parse, Invocation};
use super::{CommandKind, Requirement};
use crate::config::DISCORD_MESSAGE_LIMIT;
use crate::gateway::{Inbound, Reply, Responder};
use crate::player::{
    MusicEngine, NodeMetadata, NodeOptions, QueueHandle, RepeatMode, SearchMode, SearchOptions,
    SearchResult,
};
use crate::Error;
use poise::serenity_prelude::GuildId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const NO_QUEUE: &str = "❌ There is nothing on the queue";
const NOTHING_PLAYING: &str = "❌ Nothing is currently playing";
const QUERY_REQUIRED: &str = "❌ Search or URL query is required";
const NOT_IN_VOICE: &str = "❌ You must be in a voice channel to play music";
const NO_RESULTS: &str = "❌ No results";
const PLAY_FAILED: &str = "❌ Unable to play the requested track";
const EMPTY_QUEUE: &str = "❌ There are no tracks in the queue";
const NO_HISTORY: &str = "❌ There is no previous track to play";
const PREVIOUS_FAILED: &str = "❌ Unable to play the previous track";
const CLEARED: &str = "Successfully cleared the queue!";
const CLEAR_FAILED: &str = "❌ Unable to clear the queue";
const INVALID_INTEGER: &str = "❌ Invalid integer";
const JUMP_FAILED: &str = "❌ Unable to jump to the selected track!";
const REMOVE_FAILED: &str = "❌ Unable to remove selected track!";
const LOOP_USAGE: &str = "❌ Must provide one of the following mode: [off, track, queue, autoplay]";
const PAUSED: &str = "Successfully paused the music";
const RESUMED: &str = "Successfully resumed the music";
const SKIPPING: &str = "Skipping the current music...";
const SHUFFLED: &str = "Successfully shuffled the queue";
const STOPPED: &str = "Stopped the music";

/// Options handed to the engine when `play` creates a guild queue.
#[derive(Debug, Clone)]
pub struct PlaybackDefaults {
    pub volume: u8,
    pub buffering_timeout: Duration,
    pub leave_on_end: bool,
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            volume: 20,
            buffering_timeout: Duration::from_secs(3),
            leave_on_end: false,
        }
    }
}

pub struct Dispatcher {
    engine: Arc<dyn MusicEngine>,
    prefix: String,
    playback: PlaybackDefaults,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<dyn MusicEngine>,
        prefix: impl Into<String>,
        playback: PlaybackDefaults,
    ) -> Self {
        Self {
            engine,
            prefix: prefix.into(),
            playback,
        }
    }

    /// Handles one inbound message. Non-commands and unknown commands are
    /// ignored without a reply; only gateway failures are returned.
    pub async fn handle(&self, inbound: &Inbound, responder: &dyn Responder) -> Result<(), Error> {
        if inbound.author_is_bot {
            return Ok(());
        }
        let Some(guild_id) = inbound.guild_id else {
            return Ok(());
        };
        let Some(invocation) = parse(&inbound.content, &self.prefix) else {
            return Ok(());
        };
        let Some(kind) = CommandKind::from_name(&invocation.name) else {
            debug!("Ignoring unknown command {:?}", invocation.name);
            return Ok(());
        };
        debug!(
            "[{}] {} ran {} {:?}",
            guild_id,
            inbound.author_name,
            kind.name(),
            invocation.args
        );

        match kind {
            CommandKind::Ping => {
                let latency = responder.latency().await.unwrap_or_default();
                responder
                    .reply(format!("Ping: {}ms", latency.as_millis()).into())
                    .await
            }
            CommandKind::Help => responder.reply(Reply::Embed(help_embed(&self.prefix))).await,
            CommandKind::Play => self.play(inbound, guild_id, &invocation, responder).await,
            _ => {
                let Some(queue) = self.guard(kind, guild_id, responder).await? else {
                    return Ok(());
                };
                let reply = self.run_on_queue(kind, guild_id, &invocation, &*queue).await;
                responder.reply(reply.into()).await
            }
        }
    }

    /// Resolves the guild queue, answering with the matching error when a
    /// precondition of `kind` does not hold.
    async fn guard(
        &self,
        kind: CommandKind,
        guild_id: GuildId,
        responder: &dyn Responder,
    ) -> Result<Option<Arc<dyn QueueHandle>>, Error> {
        let Some(queue) = self.engine.queue(guild_id).await else {
            responder.reply(NO_QUEUE.into()).await?;
            return Ok(None);
        };
        if kind.requirement() == Requirement::Playing && !queue.is_playing().await {
            responder.reply(NOTHING_PLAYING.into()).await?;
            return Ok(None);
        }
        Ok(Some(queue))
    }

    async fn play(
        &self,
        inbound: &Inbound,
        guild_id: GuildId,
        invocation: &Invocation,
        responder: &dyn Responder,
    ) -> Result<(), Error> {
        let query = invocation.rest();
        if query.is_empty() {
            return responder.reply(QUERY_REQUIRED.into()).await;
        }
        let Some(voice_channel) = inbound.voice_channel else {
            return responder.reply(NOT_IN_VOICE.into()).await;
        };

        let options = SearchOptions {
            requested_by: inbound.author_name.clone(),
            mode: SearchMode::Auto,
        };
        let result = match self.engine.search(&query, options).await {
            Ok(result) => result,
            Err(e) => {
                warn!("[{}] Search for {:?} failed: {}", guild_id, query, e);
                SearchResult::default()
            }
        };
        if !result.has_tracks() {
            return responder.send(NO_RESULTS.to_string()).await;
        }

        let node_options = NodeOptions {
            metadata: NodeMetadata {
                channel_id: inbound.channel_id,
            },
            volume: self.playback.volume,
            buffering_timeout: self.playback.buffering_timeout,
            leave_on_end: self.playback.leave_on_end,
        };
        match self
            .engine
            .play(guild_id, voice_channel, result, node_options)
            .await
        {
            Ok(outcome) => {
                responder
                    .send(format!(
                        "{} was successfully added to queue",
                        format_enqueued(&outcome)
                    ))
                    .await
            }
            Err(e) => {
                error!("[{}] Failed to play {:?}: {}", guild_id, query, e);
                responder.reply(PLAY_FAILED.into()).await
            }
        }
    }

    async fn run_on_queue(
        &self,
        kind: CommandKind,
        guild_id: GuildId,
        invocation: &Invocation,
        queue: &dyn QueueHandle,
    ) -> String {
        match kind {
            CommandKind::Queue => list_tracks(queue).await,
            CommandKind::Previous => {
                // Read before stepping back so the reply names the right track.
                let Some(track) = queue.previous_track().await else {
                    return NO_HISTORY.to_string();
                };
                match queue.previous().await {
                    Ok(_) => format!("Playing previous song: {}", format_track(&track)),
                    Err(e) => {
                        warn!("[{}] Failed to step back: {}", guild_id, e);
                        PREVIOUS_FAILED.to_string()
                    }
                }
            }
            CommandKind::Clear => match queue.clear().await {
                Ok(()) => CLEARED.to_string(),
                Err(e) => {
                    warn!("[{}] Failed to clear queue: {}", guild_id, e);
                    CLEAR_FAILED.to_string()
                }
            },
            CommandKind::Jump => {
                let Some(position) = parse_position(&invocation.args) else {
                    return INVALID_INTEGER.to_string();
                };
                let jumped = match to_index(position) {
                    Some(index) => queue.jump(index).await,
                    None => None,
                };
                match jumped {
                    Some(track) => format!("Successfully jumped to {}!", format_track(&track)),
                    None => JUMP_FAILED.to_string(),
                }
            }
            CommandKind::Remove => {
                let Some(position) = parse_position(&invocation.args) else {
                    return INVALID_INTEGER.to_string();
                };
                let removed = match to_index(position) {
                    Some(index) => queue.remove(index).await,
                    None => None,
                };
                match removed {
                    Some(track) => format!("Successfully removed {}", format_track(&track)),
                    None => REMOVE_FAILED.to_string(),
                }
            }
            CommandKind::Loop => {
                let mode = invocation
                    .args
                    .first()
                    .and_then(|arg| arg.parse::<RepeatMode>().ok());
                let Some(mode) = mode else {
                    return LOOP_USAGE.to_string();
                };
                queue.set_repeat_mode(mode).await;
                format!(
                    "Successfully set repeat/loop mode to: **{}**",
                    mode.name().to_uppercase()
                )
            }
            CommandKind::NowPlaying => {
                let Some(track) = queue.current_track().await else {
                    return NOTHING_PLAYING.to_string();
                };
                let progress = queue.progress_bar().await.unwrap_or_default();
                format!("Currently Playing: {}\n{}", format_track(&track), progress)
            }
            CommandKind::Pause => {
                if !queue.set_paused(true).await {
                    debug!("[{}] Pause had no effect", guild_id);
                }
                PAUSED.to_string()
            }
            CommandKind::Resume => {
                if !queue.set_paused(false).await {
                    debug!("[{}] Resume had no effect", guild_id);
                }
                RESUMED.to_string()
            }
            CommandKind::Skip => {
                queue.skip().await;
                SKIPPING.to_string()
            }
            CommandKind::Shuffle => {
                queue.shuffle().await;
                SHUFFLED.to_string()
            }
            CommandKind::Stop => {
                self.engine.delete_queue(guild_id).await;
                STOPPED.to_string()
            }
            // Answered before any queue lookup.
            CommandKind::Ping | CommandKind::Help | CommandKind::Play => String::new(),
        }
    }
}

/// 1-based position from the leading integer of the first argument;
/// anything after the digits is ignored (`2abc` is 2, `1.5` is 1).
fn parse_position(args: &[String]) -> Option<i64> {
    let arg = args.first()?.trim();
    let end = arg
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(arg.len(), |(i, _)| i);
    arg[..end].parse().ok()
}

fn to_index(position: i64) -> Option<usize> {
    usize::try_from(position.checked_sub(1)?).ok()
}

/// Numbered listing, cut short to fit one message.
async fn list_tracks(queue: &dyn QueueHandle) -> String {
    let tracks = queue.tracks().await;
    if tracks.is_empty() {
        return EMPTY_QUEUE.to_string();
    }

    let mut listing = String::new();
    for (index, track) in tracks.iter().enumerate() {
        let line = format!("{}. {}", index + 1, format_track(track));
        let remaining = tracks.len() - index;
        let footer = format!("\n…and {} more", remaining);
        // The last line needs no room for a footer after it.
        let reserved = if remaining == 1 { 0 } else { footer.len() };
        if listing.len() + line.len() + 1 + reserved > DISCORD_MESSAGE_LIMIT {
            listing.push_str(&footer);
            break;
        }
        if !listing.is_empty() {
            listing.push('\n');
        }
        listing.push_str(&line);
    }
    listing
}
