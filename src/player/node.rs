//! Guild queue driven through a [`VoiceDriver`].

use super::driver::{Playback, Started, VoiceDriver};
use super::progress;
use super::queue::{Advance, QueueState};
use super::track::{NodeOptions, RepeatMode, Track};
use super::{EngineError, QueueHandle};
use async_trait::async_trait;
use poise::serenity_prelude::GuildId;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

pub type NodeRegistry = Mutex<HashMap<GuildId, Arc<GuildNode>>>;

#[derive(Default)]
struct NodeInner {
    state: QueueState,
    playback: Option<Arc<dyn Playback>>,
    /// Bumped whenever the current track changes, so stale starts and
    /// driver events can be told apart.
    generation: u64,
    destroyed: bool,
}

impl NodeInner {
    /// Stops the loaded track and claims a new generation.
    fn retire(&mut self) -> u64 {
        self.generation += 1;
        if let Some(playback) = self.playback.take() {
            playback.stop();
        }
        self.generation
    }

    fn is_idle(&self) -> bool {
        self.state.current().is_none() && self.state.tracks().is_empty()
    }
}

pub struct GuildNode {
    guild_id: GuildId,
    driver: Arc<dyn VoiceDriver>,
    registry: Weak<NodeRegistry>,
    options: NodeOptions,
    inner: Mutex<NodeInner>,
    this: Weak<GuildNode>,
}

impl GuildNode {
    pub fn new(
        guild_id: GuildId,
        driver: Arc<dyn VoiceDriver>,
        registry: Weak<NodeRegistry>,
        options: NodeOptions,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            guild_id,
            driver,
            registry,
            options,
            inner: Mutex::new(NodeInner::default()),
            this: this.clone(),
        })
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Adds tracks and starts playback when idle. Fails once the node has
    /// left voice.
    pub async fn enqueue(&self, tracks: Vec<Track>) -> Result<(), EngineError> {
        let (first, generation) = {
            let mut inner = self.inner.lock().await;
            if inner.destroyed {
                return Err(EngineError::NotConnected);
            }
            inner.state.enqueue(tracks);
            let Some(first) = inner.state.start_if_idle() else {
                return Ok(());
            };
            (first, inner.retire())
        };
        self.play_from(Some(first), generation).await;
        Ok(())
    }

    /// Stops playback and leaves voice. The node is unusable afterwards.
    pub async fn destroy(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.destroyed = true;
            inner.retire();
            inner.state = QueueState::new();
        }
        self.driver.leave().await;
    }

    pub(crate) async fn on_track_end(&self, generation: u64) {
        let (next, generation) = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                debug!("[{}] Ignoring end of a replaced track", self.guild_id);
                return;
            }
            inner.playback = None;
            let next = inner.state.advance(Advance::Finished);
            (next, inner.retire())
        };
        self.play_from(next, generation).await;
    }

    async fn on_buffering_timeout(&self, generation: u64) {
        let (next, generation) = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return;
            }
            warn!(
                "[{}] Track did not start within {:?}, skipping",
                self.guild_id, self.options.buffering_timeout
            );
            let next = inner.state.advance(Advance::Skipped);
            (next, inner.retire())
        };
        self.play_from(next, generation).await;
    }

    /// Starts `next`, falling through to later tracks when one fails to load
    /// and to autoplay when the queue runs dry. The node lock is only held
    /// between driver calls; a newer generation cancels the chain.
    async fn play_from(&self, mut next: Option<Track>, mut generation: u64) {
        let mut autoplayed = false;
        loop {
            let track = match next.take() {
                Some(track) => track,
                None if !autoplayed => {
                    autoplayed = true;
                    match self.autoplay(generation).await {
                        Some(track) => track,
                        None => break,
                    }
                }
                None => break,
            };

            let started = self
                .driver
                .start(&track, self.options.volume, self.this.clone(), generation)
                .await;
            match started {
                Ok(started) => {
                    self.install(&track, started, generation).await;
                    return;
                }
                Err(e) => {
                    error!("[{}] {}", self.guild_id, e);
                    let mut inner = self.inner.lock().await;
                    if inner.generation != generation {
                        return;
                    }
                    next = inner.state.advance(Advance::Skipped);
                    generation = inner.retire();
                }
            }
        }

        let mut inner = self.inner.lock().await;
        if inner.generation == generation {
            self.go_idle(&mut inner);
        }
    }

    /// Keeps a started track unless something replaced it meanwhile.
    async fn install(&self, track: &Track, started: Started, generation: u64) {
        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                debug!("[{}] Dropping stale start of {}", self.guild_id, track.title);
                started.playback.stop();
                return;
            }
            inner.playback = Some(started.playback);
        }
        self.spawn_buffering_watchdog(generation, started.ready);
        debug!("[{}] Playing {} ({})", self.guild_id, track.title, track.url);

        self.driver
            .announce(
                self.options.metadata.channel_id,
                format!("Started playing **{}**", track),
            )
            .await;
    }

    fn spawn_buffering_watchdog(&self, generation: u64, ready: oneshot::Receiver<()>) {
        let node = self.this.clone();
        let timeout = self.options.buffering_timeout;
        tokio::spawn(async move {
            if tokio::time::timeout(timeout, ready).await.is_err() {
                if let Some(node) = node.upgrade() {
                    node.on_buffering_timeout(generation).await;
                }
            }
        });
    }

    /// Picks a related track once the queue ran dry under autoplay.
    async fn autoplay(&self, generation: u64) -> Option<Track> {
        let seed = {
            let inner = self.inner.lock().await;
            if inner.generation != generation || !inner.state.wants_autoplay() {
                return None;
            }
            inner.state.previous_track().cloned()?
        };

        let candidates = match self.driver.related(&seed).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("[{}] Autoplay lookup failed: {}", self.guild_id, e);
                return None;
            }
        };

        let mut inner = self.inner.lock().await;
        if inner.generation != generation || !inner.state.wants_autoplay() {
            return None;
        }
        let pick = candidates
            .into_iter()
            .find(|track| !inner.state.knows(&track.url))?;
        info!("[{}] Autoplay picked {}", self.guild_id, pick.title);
        inner.state.enqueue([pick]);
        inner.state.advance(Advance::Skipped)
    }

    /// Nothing left to play: stop, and leave voice when configured to.
    fn go_idle(&self, inner: &mut NodeInner) {
        let generation = inner.retire();
        if !self.options.leave_on_end {
            return;
        }
        let Some(node) = self.this.upgrade() else {
            return;
        };
        tokio::spawn(node.leave_if_idle(generation));
    }

    /// Deletes the queue unless it was replaced or got new work since it
    /// went idle.
    async fn leave_if_idle(self: Arc<Self>, generation: u64) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        {
            let mut nodes = registry.lock().await;
            let registered = nodes
                .get(&self.guild_id)
                .is_some_and(|node| Arc::ptr_eq(node, &self));
            if !registered {
                return;
            }
            let mut inner = self.inner.lock().await;
            if inner.generation != generation || !inner.is_idle() {
                return;
            }
            inner.destroyed = true;
            nodes.remove(&self.guild_id);
        }
        info!("[{}] Queue finished, leaving voice channel", self.guild_id);
        self.destroy().await;
    }
}

#[async_trait]
impl QueueHandle for GuildNode {
    async fn tracks(&self) -> Vec<Track> {
        self.inner.lock().await.state.tracks().iter().cloned().collect()
    }

    async fn clear(&self) -> Result<(), EngineError> {
        self.inner.lock().await.state.clear();
        Ok(())
    }

    async fn shuffle(&self) {
        let mut inner = self.inner.lock().await;
        inner.state.shuffle(&mut rand::rng());
    }

    async fn previous_track(&self) -> Option<Track> {
        self.inner.lock().await.state.previous_track().cloned()
    }

    async fn previous(&self) -> Result<Track, EngineError> {
        let (previous, generation) = {
            let mut inner = self.inner.lock().await;
            let previous = inner.state.step_back().ok_or(EngineError::NoHistory)?;
            (previous, inner.retire())
        };
        self.play_from(Some(previous.clone()), generation).await;
        Ok(previous)
    }

    async fn jump(&self, index: usize) -> Option<Track> {
        let (target, next, generation) = {
            let mut inner = self.inner.lock().await;
            let target = inner.state.bring_to_front(index)?;
            let next = inner.state.advance(Advance::Skipped);
            (target, next, inner.retire())
        };
        self.play_from(next, generation).await;
        Some(target)
    }

    async fn remove(&self, index: usize) -> Option<Track> {
        self.inner.lock().await.state.remove(index)
    }

    async fn progress_bar(&self) -> Option<String> {
        let (playback, total) = {
            let inner = self.inner.lock().await;
            let current = inner.state.current()?;
            (inner.playback.clone()?, current.duration)
        };
        let position = playback.position().await?;
        Some(progress::render(position, total))
    }

    async fn set_paused(&self, paused: bool) -> bool {
        let inner = self.inner.lock().await;
        inner
            .playback
            .as_ref()
            .is_some_and(|playback| playback.set_paused(paused))
    }

    async fn skip(&self) -> bool {
        let (next, generation) = {
            let mut inner = self.inner.lock().await;
            if inner.state.current().is_none() {
                return false;
            }
            let next = inner.state.advance(Advance::Skipped);
            (next, inner.retire())
        };
        self.play_from(next, generation).await;
        true
    }

    async fn set_repeat_mode(&self, mode: RepeatMode) {
        self.inner.lock().await.state.set_repeat_mode(mode);
    }

    async fn current_track(&self) -> Option<Track> {
        self.inner.lock().await.state.current().cloned()
    }

    async fn is_playing(&self) -> bool {
        self.inner.lock().await.state.current().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::track::NodeMetadata;
    use poise::serenity_prelude::ChannelId;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    const NEVER: Duration = Duration::from_secs(600);

    type Log = Arc<StdMutex<Vec<String>>>;

    fn track(name: &str) -> Track {
        Track::new(name, format!("https://example.com/{}", name))
    }

    struct FakePlayback {
        title: String,
        log: Log,
    }

    #[async_trait]
    impl Playback for FakePlayback {
        fn stop(&self) {
            self.log.lock().unwrap().push(format!("stop {}", self.title));
        }

        fn set_paused(&self, _paused: bool) -> bool {
            true
        }

        async fn position(&self) -> Option<Duration> {
            Some(Duration::ZERO)
        }
    }

    /// Records driver calls; tracks named in `broken` fail to load.
    #[derive(Default)]
    struct FakeDriver {
        log: Log,
        broken: Vec<&'static str>,
        related: Vec<Track>,
        gate: Option<Arc<Notify>>,
        generations: StdMutex<Vec<u64>>,
        ready: StdMutex<Vec<oneshot::Sender<()>>>,
    }

    impl FakeDriver {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn logged(&self, entry: &str) -> bool {
            self.log().iter().any(|line| line == entry)
        }

        fn last_generation(&self) -> u64 {
            *self.generations.lock().unwrap().last().unwrap()
        }
    }

    #[async_trait]
    impl VoiceDriver for FakeDriver {
        async fn start(
            &self,
            track: &Track,
            _volume: u8,
            _node: Weak<GuildNode>,
            generation: u64,
        ) -> Result<Started, EngineError> {
            if let Some(gate) = &self.gate {
                self.log.lock().unwrap().push(format!("open {}", track.title));
                gate.notified().await;
            }
            if self.broken.iter().any(|name| *name == track.title) {
                self.log.lock().unwrap().push(format!("fail {}", track.title));
                return Err(EngineError::Resolve(track.url.clone()));
            }
            self.log.lock().unwrap().push(format!("start {}", track.title));
            self.generations.lock().unwrap().push(generation);

            let (ready_tx, ready_rx) = oneshot::channel();
            self.ready.lock().unwrap().push(ready_tx);
            Ok(Started {
                playback: Arc::new(FakePlayback {
                    title: track.title.clone(),
                    log: self.log.clone(),
                }),
                ready: ready_rx,
            })
        }

        async fn related(&self, _seed: &Track) -> Result<Vec<Track>, EngineError> {
            Ok(self.related.clone())
        }

        async fn announce(&self, _channel_id: ChannelId, content: String) {
            self.log.lock().unwrap().push(content);
        }

        async fn leave(&self) {
            self.log.lock().unwrap().push("leave".to_string());
        }
    }

    fn options(buffering_timeout: Duration, leave_on_end: bool) -> NodeOptions {
        NodeOptions {
            metadata: NodeMetadata {
                channel_id: ChannelId::new(2),
            },
            volume: 20,
            buffering_timeout,
            leave_on_end,
        }
    }

    fn registered_node(
        driver: &Arc<FakeDriver>,
        options: NodeOptions,
    ) -> (Arc<GuildNode>, Arc<NodeRegistry>) {
        let registry: Arc<NodeRegistry> = Arc::new(Mutex::new(HashMap::new()));
        let node = GuildNode::new(
            GuildId::new(1),
            driver.clone(),
            Arc::downgrade(&registry),
            options,
        );
        registry
            .try_lock()
            .unwrap()
            .insert(GuildId::new(1), node.clone());
        (node, registry)
    }

    async fn wait_until(done: impl Fn() -> bool) {
        for _ in 0..400 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_enqueue_starts_and_announces() {
        let driver = Arc::new(FakeDriver::default());
        let (node, _registry) = registered_node(&driver, options(NEVER, false));

        node.enqueue(vec![track("a"), track("b")]).await.unwrap();

        assert_eq!(driver.log(), vec!["start a", "Started playing **a**"]);
        assert_eq!(node.current_track().await, Some(track("a")));
        assert_eq!(node.tracks().await, vec![track("b")]);
    }

    #[tokio::test]
    async fn test_failed_track_falls_through_to_next() {
        let driver = Arc::new(FakeDriver {
            broken: vec!["a"],
            ..Default::default()
        });
        let (node, _registry) = registered_node(&driver, options(NEVER, false));

        node.enqueue(vec![track("a"), track("b")]).await.unwrap();

        assert_eq!(
            driver.log(),
            vec!["fail a", "start b", "Started playing **b**"]
        );
        assert_eq!(node.current_track().await, Some(track("b")));
        assert_eq!(node.previous_track().await, Some(track("a")));
    }

    #[tokio::test]
    async fn test_stale_end_event_is_ignored() {
        let driver = Arc::new(FakeDriver::default());
        let (node, _registry) = registered_node(&driver, options(NEVER, false));
        node.enqueue(vec![track("a"), track("b"), track("c")])
            .await
            .unwrap();
        let first = driver.last_generation();

        assert!(node.skip().await);
        node.on_track_end(first).await;
        assert_eq!(node.current_track().await, Some(track("b")));
        assert!(!driver.logged("start c"));

        node.on_track_end(driver.last_generation()).await;
        assert_eq!(node.current_track().await, Some(track("c")));
        assert!(driver.logged("start c"));
    }

    #[tokio::test]
    async fn test_buffering_timeout_skips_track() {
        let driver = Arc::new(FakeDriver::default());
        let (node, _registry) = registered_node(&driver, options(NEVER, false));
        node.enqueue(vec![track("a"), track("b")]).await.unwrap();

        node.on_buffering_timeout(driver.last_generation()).await;

        assert_eq!(
            driver.log(),
            vec![
                "start a",
                "Started playing **a**",
                "stop a",
                "start b",
                "Started playing **b**"
            ]
        );
    }

    #[tokio::test]
    async fn test_buffering_watchdog_fires() {
        let driver = Arc::new(FakeDriver::default());
        let (node, _registry) =
            registered_node(&driver, options(Duration::from_millis(10), false));
        node.enqueue(vec![track("a"), track("b")]).await.unwrap();

        wait_until(|| driver.logged("start b")).await;
        assert!(driver.logged("stop a"));
        assert!(driver.logged("start b"));
    }

    #[tokio::test]
    async fn test_autoplay_picks_unheard_related_track() {
        let driver = Arc::new(FakeDriver {
            related: vec![track("a"), track("x")],
            ..Default::default()
        });
        let (node, _registry) = registered_node(&driver, options(NEVER, false));
        node.enqueue(vec![track("a")]).await.unwrap();
        node.set_repeat_mode(RepeatMode::Autoplay).await;

        node.on_track_end(driver.last_generation()).await;

        assert_eq!(node.current_track().await, Some(track("x")));
        assert_eq!(driver.log().last().unwrap(), "Started playing **x**");
    }

    #[tokio::test]
    async fn test_queue_runs_dry_without_autoplay() {
        let driver = Arc::new(FakeDriver {
            related: vec![track("x")],
            ..Default::default()
        });
        let (node, registry) = registered_node(&driver, options(NEVER, false));
        node.enqueue(vec![track("a")]).await.unwrap();

        node.on_track_end(driver.last_generation()).await;
        tokio::task::yield_now().await;

        assert!(!node.is_playing().await);
        assert!(!driver.logged("start x"));
        assert!(!driver.logged("leave"));
        assert_eq!(registry.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_leave_on_end_deletes_queue() {
        let driver = Arc::new(FakeDriver::default());
        let (node, registry) = registered_node(&driver, options(NEVER, true));
        node.enqueue(vec![track("a")]).await.unwrap();

        node.on_track_end(driver.last_generation()).await;
        wait_until(|| driver.logged("leave")).await;

        assert!(driver.logged("leave"));
        assert!(registry.lock().await.is_empty());
        assert!(matches!(
            node.enqueue(vec![track("b")]).await,
            Err(EngineError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_leave_on_end_keeps_queue_with_new_work() {
        let driver = Arc::new(FakeDriver::default());
        let (node, registry) = registered_node(&driver, options(NEVER, true));
        node.enqueue(vec![track("a")]).await.unwrap();

        // Runs before the spawned leave task gets a turn.
        node.on_track_end(driver.last_generation()).await;
        node.enqueue(vec![track("b")]).await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(!driver.logged("leave"));
        assert_eq!(registry.lock().await.len(), 1);
        assert_eq!(node.current_track().await, Some(track("b")));
    }

    #[tokio::test]
    async fn test_commands_are_served_while_a_track_loads() {
        let gate = Arc::new(Notify::new());
        let driver = Arc::new(FakeDriver {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let (node, _registry) = registered_node(&driver, options(NEVER, false));

        let loading = tokio::spawn({
            let node = node.clone();
            async move { node.enqueue(vec![track("a"), track("b")]).await }
        });
        wait_until(|| driver.logged("open a")).await;

        let playing = tokio::time::timeout(Duration::from_secs(1), node.is_playing()).await;
        assert_eq!(playing.ok(), Some(true));
        let pending = tokio::time::timeout(Duration::from_secs(1), node.tracks()).await;
        assert_eq!(pending.ok(), Some(vec![track("b")]));

        gate.notify_one();
        loading.await.unwrap().unwrap();
        assert!(driver.logged("start a"));
    }

    #[tokio::test]
    async fn test_previous_restarts_history_entry() {
        let driver = Arc::new(FakeDriver::default());
        let (node, _registry) = registered_node(&driver, options(NEVER, false));
        node.enqueue(vec![track("a"), track("b")]).await.unwrap();
        node.skip().await;

        assert_eq!(node.previous().await.unwrap(), track("a"));
        assert_eq!(node.current_track().await, Some(track("a")));
        assert_eq!(node.tracks().await, vec![track("b")]);
        assert_eq!(driver.log().last().unwrap(), "Started playing **a**");
    }
}
