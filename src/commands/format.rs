use crate::player::{PlayOutcome, Track};

/// `[**title**](<url>)`; the angle brackets keep Discord from unfurling the link.
pub fn format_track(track: &Track) -> String {
    format!("[**{}**](<{}>)", track.title, track.url)
}

/// Confirmation for `play`: playlists are summarised instead of listed.
pub fn format_enqueued(outcome: &PlayOutcome) -> String {
    match outcome.playlist.as_ref().or(outcome.track.playlist.as_ref()) {
        Some(playlist) => format!(
            "Multiple tracks from [**{}**](<{}>)",
            playlist.title, playlist.url
        ),
        None => format_track(&outcome.track),
    }
}
