//! Per-guild queue bookkeeping, independent of the voice driver.

use super::track::{RepeatMode, Track};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;

/// Maximum number of finished tracks kept for `previous`.
pub const HISTORY_LIMIT: usize = 100;

/// Why the current track is being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The track played to its end.
    Finished,
    /// A user skipped or jumped past it.
    Skipped,
}

#[derive(Debug, Default)]
pub struct QueueState {
    tracks: VecDeque<Track>,
    /// Oldest first.
    history: Vec<Track>,
    current: Option<Track>,
    repeat_mode: RepeatMode,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracks(&self) -> &VecDeque<Track> {
        &self.tracks
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[Track] {
        &self.history
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    pub fn enqueue(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.tracks.extend(tracks);
    }

    /// Drops pending tracks. History and the current track are kept.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.tracks.make_contiguous().shuffle(rng);
    }

    /// Most recently finished track.
    pub fn previous_track(&self) -> Option<&Track> {
        self.history.last()
    }

    /// Makes the last history entry current again and puts the interrupted
    /// track back at the front of the pending list.
    pub fn step_back(&mut self) -> Option<Track> {
        let previous = self.history.pop()?;
        if let Some(current) = self.current.take() {
            self.tracks.push_front(current);
        }
        self.current = Some(previous.clone());
        Some(previous)
    }

    /// Moves pending track `index` to the front. The caller skips the
    /// current track afterwards.
    pub fn bring_to_front(&mut self, index: usize) -> Option<Track> {
        let track = self.tracks.remove(index)?;
        self.tracks.push_front(track.clone());
        Some(track)
    }

    pub fn remove(&mut self, index: usize) -> Option<Track> {
        self.tracks.remove(index)
    }

    /// Starts the next pending track when nothing is current.
    pub fn start_if_idle(&mut self) -> Option<Track> {
        if self.current.is_some() {
            return None;
        }
        self.current = self.tracks.pop_front();
        self.current.clone()
    }

    /// Retires the current track and returns the one that replaces it.
    pub fn advance(&mut self, reason: Advance) -> Option<Track> {
        if let Some(finished) = self.current.take() {
            if reason == Advance::Finished && self.repeat_mode == RepeatMode::Track {
                self.current = Some(finished.clone());
                return Some(finished);
            }
            if self.repeat_mode == RepeatMode::Queue {
                self.tracks.push_back(finished.clone());
            }
            self.push_history(finished);
        }
        self.current = self.tracks.pop_front();
        self.current.clone()
    }

    /// True once the queue ran dry under autoplay.
    pub fn wants_autoplay(&self) -> bool {
        self.repeat_mode == RepeatMode::Autoplay && self.current.is_none() && self.tracks.is_empty()
    }

    /// Whether `url` was already heard or is on the way.
    pub fn knows(&self, url: &str) -> bool {
        self.current.iter().any(|t| t.url == url)
            || self.tracks.iter().any(|t| t.url == url)
            || self.history.iter().any(|t| t.url == url)
    }

    fn push_history(&mut self, track: Track) {
        self.history.push(track);
        if self.history.len() > HISTORY_LIMIT {
            let overflow = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..overflow);
        }
    }
}
