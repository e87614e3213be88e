use crate::gateway::FieldEmbed;

/// One line of the help listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelpEntry {
    pub signature: &'static str,
    pub description: &'static str,
}

const fn entry(signature: &'static str, description: &'static str) -> HelpEntry {
    HelpEntry {
        signature,
        description,
    }
}

/// Rendered in this order.
pub const HELP_ENTRIES: &[HelpEntry] = &[
    entry("clear", "Clears the queue"),
    entry("help", "Displays the commands for this bot"),
    entry("jump <track num>", "Jump to a specific track"),
    entry("loop", "Set the loop mode for the queue"),
    entry("nowplaying", "Display the title of the current audio playing"),
    entry("pause", "Pause the music"),
    entry("play", "Play the music"),
    entry("previous", "Replay the previous track"),
    entry("remove <track num>", "Remove specific track"),
    entry("queue", "Displays the queue"),
    entry("resume", "Resumes paused music"),
    entry("shuffle", "Shuffles the queue"),
    entry("skip", "Skips the current music"),
    entry("stop", "Stop the player"),
];

pub fn help_embed(prefix: &str) -> FieldEmbed {
    FieldEmbed {
        title: "Command list".to_string(),
        description: format!("Prefix is `{}`", prefix),
        fields: HELP_ENTRIES
            .iter()
            .map(|entry| (entry.signature.to_string(), entry.description.to_string()))
            .collect(),
    }
}
