//! In-memory engine and gateway doubles for dispatcher tests.

use crate::gateway::{Inbound, Reply, Responder};
use crate::player::progress;
use crate::player::queue::{Advance, QueueState};
use crate::player::{
    EngineError, MusicEngine, NodeOptions, PlayOutcome, PlaylistRef, QueueHandle, RepeatMode,
    SearchOptions, SearchResult, Track,
};
use crate::Error;
use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn track(name: &str) -> Track {
    Track::new(name, format!("https://example.com/{}", name))
}

pub fn inbound(content: &str) -> Inbound {
    Inbound {
        content: content.to_string(),
        author_name: "tester".to_string(),
        author_is_bot: false,
        guild_id: Some(GuildId::new(1)),
        channel_id: ChannelId::new(2),
        voice_channel: Some(ChannelId::new(3)),
    }
}

#[derive(Default)]
pub struct RecordingResponder {
    replies: Mutex<Vec<Reply>>,
    sent: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl RecordingResponder {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Default::default()
        }
    }

    pub fn replies(&self) -> Vec<Reply> {
        self.replies.lock().unwrap().clone()
    }

    /// Plain-text replies.
    pub fn texts(&self) -> Vec<String> {
        self.replies()
            .into_iter()
            .filter_map(|reply| match reply {
                Reply::Text(text) => Some(text),
                Reply::Embed(_) => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_silent(&self) -> bool {
        self.replies.lock().unwrap().is_empty() && self.sent.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl Responder for RecordingResponder {
    async fn reply(&self, reply: Reply) -> Result<(), Error> {
        self.replies.lock().unwrap().push(reply);
        Ok(())
    }

    async fn send(&self, content: String) -> Result<(), Error> {
        self.sent.lock().unwrap().push(content);
        Ok(())
    }

    async fn latency(&self) -> Option<Duration> {
        self.latency
    }
}

/// Queue double driven by the real [`QueueState`].
#[derive(Default)]
pub struct FakeQueue {
    state: Mutex<QueueState>,
    paused: AtomicBool,
    clear_fails: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeQueue {
    pub fn idle(names: &[&str]) -> Self {
        let queue = Self::default();
        queue.state.lock().unwrap().enqueue(names.iter().map(|n| track(n)));
        queue
    }

    pub fn playing(names: &[&str]) -> Self {
        let queue = Self::idle(names);
        queue.state.lock().unwrap().start_if_idle();
        queue
    }

    fn enqueue(&self, tracks: Vec<Track>) {
        let mut state = self.state.lock().unwrap();
        state.enqueue(tracks);
        state.start_if_idle();
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn current_title(&self) -> Option<String> {
        self.state.lock().unwrap().current().map(|t| t.title.clone())
    }

    pub fn repeat(&self) -> RepeatMode {
        self.state.lock().unwrap().repeat_mode()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn fail_clear(&self) {
        self.clear_fails.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueHandle for FakeQueue {
    async fn tracks(&self) -> Vec<Track> {
        self.state.lock().unwrap().tracks().iter().cloned().collect()
    }

    async fn clear(&self) -> Result<(), EngineError> {
        self.record("clear");
        if self.clear_fails.load(Ordering::SeqCst) {
            return Err(EngineError::Control("clear refused".into()));
        }
        self.state.lock().unwrap().clear();
        Ok(())
    }

    async fn shuffle(&self) {
        self.record("shuffle");
        self.state.lock().unwrap().shuffle(&mut rand::rng());
    }

    async fn previous_track(&self) -> Option<Track> {
        self.state.lock().unwrap().previous_track().cloned()
    }

    async fn previous(&self) -> Result<Track, EngineError> {
        self.record("previous");
        self.state
            .lock()
            .unwrap()
            .step_back()
            .ok_or(EngineError::NoHistory)
    }

    async fn jump(&self, index: usize) -> Option<Track> {
        self.record(format!("jump {}", index));
        let mut state = self.state.lock().unwrap();
        let target = state.bring_to_front(index)?;
        state.advance(Advance::Skipped);
        Some(target)
    }

    async fn remove(&self, index: usize) -> Option<Track> {
        self.record(format!("remove {}", index));
        self.state.lock().unwrap().remove(index)
    }

    async fn progress_bar(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        let current = state.current()?;
        Some(progress::render(Duration::ZERO, current.duration))
    }

    async fn set_paused(&self, paused: bool) -> bool {
        self.record(format!("paused {}", paused));
        if self.state.lock().unwrap().current().is_none() {
            return false;
        }
        self.paused.store(paused, Ordering::SeqCst);
        true
    }

    async fn skip(&self) -> bool {
        self.record("skip");
        let mut state = self.state.lock().unwrap();
        if state.current().is_none() {
            return false;
        }
        state.advance(Advance::Skipped);
        true
    }

    async fn set_repeat_mode(&self, mode: RepeatMode) {
        self.record(format!("repeat {}", mode));
        self.state.lock().unwrap().set_repeat_mode(mode);
    }

    async fn current_track(&self) -> Option<Track> {
        self.state.lock().unwrap().current().cloned()
    }

    async fn is_playing(&self) -> bool {
        self.state.lock().unwrap().current().is_some()
    }
}

/// Engine double holding at most one guild queue.
#[derive(Default)]
pub struct FakeEngine {
    queue: Mutex<Option<Arc<FakeQueue>>>,
    results: SearchResult,
    calls: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn with_queue(queue: Arc<FakeQueue>) -> Self {
        Self {
            queue: Mutex::new(Some(queue)),
            ..Default::default()
        }
    }

    pub fn with_results(tracks: Vec<Track>, playlist: Option<PlaylistRef>) -> Self {
        Self {
            results: SearchResult { tracks, playlist },
            ..Default::default()
        }
    }

    /// Search, play and delete calls, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fake_queue(&self) -> Option<Arc<FakeQueue>> {
        self.queue.lock().unwrap().clone()
    }
}

#[async_trait]
impl MusicEngine for FakeEngine {
    async fn search(
        &self,
        query: &str,
        _options: SearchOptions,
    ) -> Result<SearchResult, EngineError> {
        self.calls.lock().unwrap().push(format!("search {}", query));
        Ok(self.results.clone())
    }

    async fn play(
        &self,
        _guild_id: GuildId,
        _voice_channel: ChannelId,
        result: SearchResult,
        _options: NodeOptions,
    ) -> Result<PlayOutcome, EngineError> {
        let SearchResult { mut tracks, playlist } = result;
        if playlist.is_none() {
            tracks.truncate(1);
        }
        let first = tracks.first().cloned().ok_or(EngineError::NoResults)?;
        self.calls
            .lock()
            .unwrap()
            .push(format!("play {}", tracks.len()));

        let queue = self
            .queue
            .lock()
            .unwrap()
            .get_or_insert_with(|| Arc::new(FakeQueue::default()))
            .clone();
        queue.enqueue(tracks);

        Ok(PlayOutcome {
            track: first,
            playlist,
        })
    }

    async fn queue(&self, _guild_id: GuildId) -> Option<Arc<dyn QueueHandle>> {
        self.fake_queue().map(|queue| queue as Arc<dyn QueueHandle>)
    }

    async fn delete_queue(&self, _guild_id: GuildId) -> bool {
        self.calls.lock().unwrap().push("delete".to_string());
        self.queue.lock().unwrap().take().is_some()
    }
}
