use crate::commands::PlaybackDefaults;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub command_prefix: String,
    pub status_message: String,
    pub ytdlp_path: String,

    // Playback options applied to new guild queues
    pub default_volume: u8,
    pub buffering_timeout: Duration,
    pub leave_on_end: bool,
}

const DEFAULT_PREFIX: &str = "m!";
const DEFAULT_VOLUME: u8 = 20;
const DEFAULT_BUFFERING_TIMEOUT: Duration = Duration::from_secs(3);

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let discord_token = env::var("DISCORD_TOKEN")
            .or_else(|_| env::var("TOKEN"))
            .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?;

        let command_prefix = env::var("COMMAND_PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string());
        if command_prefix.trim().is_empty() {
            anyhow::bail!("COMMAND_PREFIX must not be empty");
        }

        let buffering_timeout = match env::var("BUFFERING_TIMEOUT") {
            Ok(raw) => humantime::parse_duration(&raw)
                .map_err(|e| anyhow::anyhow!("BUFFERING_TIMEOUT is not a valid duration: {}", e))?,
            Err(_) => DEFAULT_BUFFERING_TIMEOUT,
        };

        Ok(Config {
            discord_token,
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| format!("{}help", command_prefix)),
            command_prefix,
            ytdlp_path: env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            default_volume: env::var("DEFAULT_VOLUME")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|v| v.min(100) as u8)
                .unwrap_or(DEFAULT_VOLUME),
            buffering_timeout,
            leave_on_end: env::var("LEAVE_ON_END")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        })
    }

    pub fn playback(&self) -> PlaybackDefaults {
        PlaybackDefaults {
            volume: self.default_volume,
            buffering_timeout: self.buffering_timeout,
            leave_on_end: self.leave_on_end,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("command_prefix", &self.command_prefix)
            .field("status_message", &self.status_message)
            .field("ytdlp_path", &self.ytdlp_path)
            .field("default_volume", &self.default_volume)
            .field("buffering_timeout", &self.buffering_timeout)
            .field("leave_on_end", &self.leave_on_end)
            .finish()
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
