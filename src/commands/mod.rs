//! Prefixed text commands and their dispatch.

pub mod dispatch;
pub mod format;
pub mod help;
pub mod parser;

#[cfg(test)]
mod testing;

pub use dispatch::{Dispatcher, PlaybackDefaults};
pub use parser::{parse, Invocation};

/// Every command the bot answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Ping,
    Help,
    Play,
    Queue,
    Previous,
    Clear,
    Jump,
    Remove,
    Loop,
    NowPlaying,
    Pause,
    Resume,
    Skip,
    Shuffle,
    Stop,
}

/// What has to hold before a command body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    None,
    /// The guild has a queue.
    Queue,
    /// The guild has a queue with a loaded track.
    Playing,
}

impl CommandKind {
    pub const ALL: [CommandKind; 15] = [
        CommandKind::Ping,
        CommandKind::Help,
        CommandKind::Play,
        CommandKind::Queue,
        CommandKind::Previous,
        CommandKind::Clear,
        CommandKind::Jump,
        CommandKind::Remove,
        CommandKind::Loop,
        CommandKind::NowPlaying,
        CommandKind::Pause,
        CommandKind::Resume,
        CommandKind::Skip,
        CommandKind::Shuffle,
        CommandKind::Stop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Ping => "ping",
            CommandKind::Help => "help",
            CommandKind::Play => "play",
            CommandKind::Queue => "queue",
            CommandKind::Previous => "previous",
            CommandKind::Clear => "clear",
            CommandKind::Jump => "jump",
            CommandKind::Remove => "remove",
            CommandKind::Loop => "loop",
            CommandKind::NowPlaying => "nowplaying",
            CommandKind::Pause => "pause",
            CommandKind::Resume => "resume",
            CommandKind::Skip => "skip",
            CommandKind::Shuffle => "shuffle",
            CommandKind::Stop => "stop",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    pub fn requirement(self) -> Requirement {
        match self {
            CommandKind::Ping | CommandKind::Help | CommandKind::Play => Requirement::None,
            CommandKind::Queue
            | CommandKind::Previous
            | CommandKind::Clear
            | CommandKind::Jump
            | CommandKind::Remove
            | CommandKind::Shuffle
            | CommandKind::Stop => Requirement::Queue,
            CommandKind::Loop
            | CommandKind::NowPlaying
            | CommandKind::Pause
            | CommandKind::Resume
            | CommandKind::Skip => Requirement::Playing,
        }
    }
}
