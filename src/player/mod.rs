//! Playback session manager: the single authority for what is playing,
//! where, and how it got there.
//!
//! Three clocks are kept in sync: engine-reported transport state, the
//! application's last-known state, and the durable history store. The engine
//! is ground truth for transport; the in-memory [`PlayerState`] is a cache
//! that reconciles against it and the history store is the only thing that
//! survives process death.


use crate::database::{Database, Episode, PlaybackSession, Podcast};
use crate::engine::{
    EngineEvent, EngineEventReceiver, MediaItem, PlaybackEngine, TransportState,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Fixed skip offsets.
const SKIP_FORWARD_MS: i64 = 30_000;
const SKIP_BACKWARD_MS: i64 = 10_000;

/// Transport poll cadence while playing or buffering.
const TICK_INTERVAL_MS: u64 = 500;

/// Durable saves on the ticker path happen roughly this often, via a modulo
/// check against wall-clock time rather than a separate timer.
const PROGRESS_SAVE_INTERVAL_MS: i64 = 10_000;

/// Grace period before a pause is durably persisted. Pausing and immediately
/// playing something else must not persist the abandoned pause (it would
/// reorder "recently played" surfaces mid-interaction).
const PAUSE_SAVE_GRACE_MS: u64 = 10_000;

/// A save at or past this fraction of the duration marks the episode
/// completed.
const COMPLETION_THRESHOLD: f64 = 0.95;

/// Canonical player state. Owned exclusively by the session manager and
/// published as whole snapshots, so consumers never observe a half-applied
/// transition.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerState {
    pub is_playing: bool,
    pub duration_ms: i64,
    pub position_ms: i64,
    pub buffered_position_ms: i64,
    /// None means no active session: nothing rendered, no ticker running.
    pub current_episode: Option<Episode>,
    pub current_podcast: Option<Podcast>,
    pub is_loading: bool,
    /// Upcoming episodes, in play order. The current episode is not in here.
    pub queue: Vec<Episode>,
    pub is_liked: bool,
    pub playback_speed: f32,
    /// Epoch ms deadline after which the ticker pauses playback.
    pub sleep_timer_end: Option<i64>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            is_playing: false,
            duration_ms: 0,
            position_ms: 0,
            buffered_position_ms: 0,
            current_episode: None,
            current_podcast: None,
            is_loading: false,
            queue: Vec::new(),
            is_liked: false,
            playback_speed: 1.0,
            sleep_timer_end: None,
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn media_item_for(episode: &Episode, podcast: Option<&Podcast>) -> MediaItem {
    MediaItem {
        episode_id: episode.id.clone(),
        audio_url: episode.audio_url.clone(),
        title: episode.title.clone(),
        artist: podcast.map(|p| p.title.clone()),
        artwork_url: episode
            .image_url
            .clone()
            .or_else(|| podcast.and_then(|p| p.image_url.clone())),
    }
}

pub struct PlaybackSessionManager {
    db: Arc<Database>,
    engine: RwLock<Option<Arc<dyn PlaybackEngine>>>,
    state_tx: watch::Sender<PlayerState>,
    /// Serializes snapshot-replace publishes so concurrent writers can't
    /// lose updates.
    publish_lock: Mutex<()>,
    /// The engine's current item index as last reconciled.
    engine_index: Mutex<usize>,
    ticker: Mutex<Option<CancellationToken>>,
    pending_pause_save: Mutex<Option<CancellationToken>>,
    on_ended: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
    weak_self: Weak<PlaybackSessionManager>,
}

impl PlaybackSessionManager {
    pub fn new(db: Arc<Database>) -> Arc<Self> {
        let (state_tx, _) = watch::channel(PlayerState::default());
        Arc::new_cyclic(|weak| Self {
            db,
            engine: RwLock::new(None),
            state_tx,
            publish_lock: Mutex::new(()),
            engine_index: Mutex::new(0),
            ticker: Mutex::new(None),
            pending_pause_save: Mutex::new(None),
            on_ended: Mutex::new(None),
            weak_self: weak.clone(),
        })
    }

    /// Read-only observable state stream for the UI layer.
    pub fn state(&self) -> watch::Receiver<PlayerState> {
        self.state_tx.subscribe()
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> PlayerState {
        self.state_tx.borrow().clone()
    }

    /// Register the queue-refill callback. Invoked synchronously whenever the
    /// engine reports end-of-media.
    pub fn set_on_ended(&self, callback: Arc<dyn Fn() + Send + Sync>) {
        *self.on_ended.lock().unwrap() = Some(callback);
    }

    /// Connect the media engine and start consuming its event stream. Runs a
    /// reconciliation pass immediately: the engine may have kept playing
    /// while this process was gone.
    pub fn attach_engine(&self, engine: Arc<dyn PlaybackEngine>, events: EngineEventReceiver) {
        *self.engine.write().unwrap() = Some(engine);

        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            run_event_loop(weak, events).await;
        });

        self.sync_from_engine();
    }

    fn engine(&self) -> Option<Arc<dyn PlaybackEngine>> {
        self.engine.read().unwrap().clone()
    }

    /// Replace the published state with a modified copy of the current
    /// snapshot.
    fn publish<F: FnOnce(&mut PlayerState)>(&self, f: F) {
        let _guard = self.publish_lock.lock().unwrap();
        let mut next = self.state_tx.borrow().clone();
        f(&mut next);
        let _ = self.state_tx.send_replace(next);
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Load and play an episode.
    ///
    /// No-op when the same episode is already loaded and playing. The start
    /// position is the max of durable saved progress (unless completed) and
    /// any in-memory position for the same episode, passed atomically at load
    /// time, never a separate seek after load.
    pub fn play_episode(&self, episode: &Episode, podcast: &Podcast) {
        let Some(engine) = self.engine() else {
            log::warn!("play_episode ignored: engine not connected");
            return;
        };

        let snapshot = self.snapshot();
        let same_episode = snapshot
            .current_episode
            .as_ref()
            .is_some_and(|e| e.id == episode.id);
        if same_episode && engine.is_playing() {
            log::info!("play_episode no-op: {} is already playing", episode.id);
            return;
        }

        self.cancel_pending_pause_save();

        let mut start_ms: i64 = 0;
        let mut is_liked = false;
        match self.db.get_history_item(&episode.id) {
            Ok(Some(row)) => {
                is_liked = row.is_liked;
                if !row.is_completed {
                    start_ms = row.position_ms;
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("History lookup for {} failed: {}", episode.id, e),
        }
        // A rapid re-trigger can hold a fresher position in memory than the
        // last durable save.
        if same_episode {
            start_ms = start_ms.max(snapshot.position_ms);
        }

        // A fresh play re-opens the mini player on next launch.
        if let Err(e) = self.db.set_player_dismissed(false) {
            log::warn!("Failed to clear dismissed flag: {}", e);
        }

        *self.engine_index.lock().unwrap() = 0;
        engine.set_media_item(media_item_for(episode, Some(podcast)), start_ms);
        engine.prepare();
        engine.play();

        let duration_ms = if episode.duration > 0 {
            episode.duration * 1000
        } else {
            0
        };

        self.publish(|s| {
            s.current_episode = Some(episode.clone());
            s.current_podcast = Some(podcast.clone());
            s.is_loading = true;
            s.position_ms = start_ms;
            s.buffered_position_ms = start_ms;
            s.duration_ms = duration_ms;
            s.is_liked = is_liked;
            s.queue.clear();
        });
    }

    /// Resume transport. When the engine lost its media (process killed in
    /// the background) but cached state still has an episode, the media item
    /// is rebuilt from cached state and reloaded at the cached position
    /// first.
    pub fn resume(&self) {
        let Some(engine) = self.engine() else {
            log::warn!("resume ignored: engine not connected");
            return;
        };

        self.cancel_pending_pause_save();

        let snapshot = self.snapshot();
        if engine.media_item_count() == 0 {
            let Some(episode) = snapshot.current_episode.as_ref() else {
                return;
            };
            log::info!("Rebuilding media item for {} from cached state", episode.id);
            *self.engine_index.lock().unwrap() = 0;
            engine.set_media_item(
                media_item_for(episode, snapshot.current_podcast.as_ref()),
                snapshot.position_ms,
            );
            // Restore the upcoming queue into the engine as well so index
            // mapping survives the reload.
            for queued in &snapshot.queue {
                engine.add_media_item(media_item_for(queued, snapshot.current_podcast.as_ref()));
            }
            engine.prepare();
        }
        engine.play();
    }

    pub fn pause(&self) {
        let Some(engine) = self.engine() else {
            return;
        };
        engine.pause();
    }

    /// Seek and persist immediately: seeks are user-significant events worth
    /// an unconditional save, independent of the ticker cadence.
    pub fn seek_to(&self, position_ms: i64) {
        let Some(engine) = self.engine() else {
            return;
        };
        engine.seek_to(position_ms);
        self.publish(|s| {
            s.position_ms = position_ms;
            s.buffered_position_ms = s.buffered_position_ms.max(position_ms);
        });
        self.save_progress();
    }

    pub fn skip_forward(&self) {
        self.skip_by(SKIP_FORWARD_MS);
    }

    pub fn skip_backward(&self) {
        self.skip_by(-SKIP_BACKWARD_MS);
    }

    fn skip_by(&self, offset_ms: i64) {
        let Some(engine) = self.engine() else {
            return;
        };
        let duration = engine.duration_ms();
        let mut target = (engine.position_ms() + offset_ms).max(0);
        if duration > 0 {
            target = target.min(duration);
        }
        self.seek_to(target);
    }

    /// Tear down the session: stop the engine, drop its media, stop the
    /// ticker and reset state. Sets the durable dismissed flag so the next
    /// launch does not auto-restore this session.
    pub fn clear_session(&self) {
        self.stop_ticker();
        self.cancel_pending_pause_save();

        if let Some(engine) = self.engine() {
            engine.stop();
            engine.clear_media_items();
        }
        *self.engine_index.lock().unwrap() = 0;

        if let Err(e) = self.db.set_player_dismissed(true) {
            log::warn!("Failed to set dismissed flag: {}", e);
        }

        self.publish(|s| *s = PlayerState::default());
    }

    /// Cold-start hydration: populate state from the most recent history row
    /// and the persisted queue mirror, without starting playback. Suppressed
    /// while the dismissed flag is set.
    pub fn restore_last_session(&self) {
        match self.db.is_player_dismissed() {
            Ok(true) => {
                log::info!("Player was dismissed; skipping session restore");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                log::warn!("Dismissed flag lookup failed: {}", e);
                return;
            }
        }

        let row = match self.db.get_last_played_session() {
            Ok(Some(row)) => row,
            Ok(None) => return,
            Err(e) => {
                log::warn!("Last session lookup failed: {}", e);
                return;
            }
        };

        let episode = row.to_episode();
        let podcast = row.to_podcast();
        let queue: Vec<Episode> = self
            .db
            .get_queue_items()
            .unwrap_or_default()
            .iter()
            .filter(|item| item.episode_id != row.episode_id)
            .map(|item| item.to_episode())
            .collect();

        log::info!(
            "Restored session: {} at {}ms ({} queued)",
            episode.title,
            row.position_ms,
            queue.len()
        );

        self.publish(|s| {
            s.current_episode = Some(episode);
            s.current_podcast = Some(podcast);
            s.position_ms = if row.is_completed { 0 } else { row.position_ms };
            s.duration_ms = row.duration_ms;
            s.buffered_position_ms = 0;
            s.is_playing = false;
            s.is_loading = false;
            s.is_liked = row.is_liked;
            s.queue = queue;
        });
    }

    /// Reconciliation pass, run whenever the engine connection is
    /// (re)established.
    ///
    /// If the engine has loaded media but the application has no cached
    /// episode, metadata is rehydrated from the history store while the
    /// engine's numeric transport values are trusted as-is. Otherwise the
    /// engine's numeric fields win wherever they are authoritative (nonzero).
    pub fn sync_from_engine(&self) {
        let Some(engine) = self.engine() else {
            return;
        };

        let snapshot = self.snapshot();
        if engine.media_item_count() > 0 && snapshot.current_episode.is_none() {
            let Some(item) = engine.current_media_item() else {
                return;
            };
            let (episode, podcast) = match self.db.get_history_item(&item.episode_id) {
                Ok(Some(row)) => (row.to_episode(), Some(row.to_podcast())),
                _ => {
                    // No cached row; fall back to what the engine itself
                    // carries.
                    let mut episode = Episode::new(
                        item.episode_id.clone(),
                        item.title.clone(),
                        item.audio_url.clone(),
                    );
                    episode.image_url = item.artwork_url.clone();
                    (episode, None)
                }
            };

            *self.engine_index.lock().unwrap() = engine.current_item_index();
            self.publish(|s| {
                s.current_episode = Some(episode);
                s.current_podcast = podcast;
                s.position_ms = engine.position_ms();
                s.duration_ms = engine.duration_ms();
                s.buffered_position_ms = engine.buffered_position_ms();
                s.is_playing = engine.is_playing();
                s.is_loading = false;
            });
        } else {
            self.publish(|s| {
                let position = engine.position_ms();
                if position > 0 {
                    s.position_ms = position;
                }
                let duration = engine.duration_ms();
                if duration > 0 {
                    s.duration_ms = duration;
                }
                let buffered = engine.buffered_position_ms();
                if buffered > 0 {
                    s.buffered_position_ms = buffered;
                }
                s.is_playing = engine.is_playing();
            });
        }

        if engine.is_playing() {
            self.start_ticker();
        }
    }

    // ========================================================================
    // Supplements: speed, like, sleep timer
    // ========================================================================

    pub fn set_playback_speed(&self, speed: f32) {
        if let Some(engine) = self.engine() {
            engine.set_playback_speed(speed);
        }
        self.publish(|s| s.playback_speed = speed);
    }

    pub fn toggle_like(&self) {
        let snapshot = self.snapshot();
        let Some(episode) = snapshot.current_episode.as_ref() else {
            return;
        };
        let liked = !snapshot.is_liked;
        if let Err(e) = self.db.set_liked(&episode.id, liked) {
            log::warn!("Failed to persist like for {}: {}", episode.id, e);
        }
        self.publish(|s| s.is_liked = liked);
    }

    /// Arm (or clear, with `None`) the sleep timer. The ticker pauses
    /// playback once wall clock passes the deadline.
    pub fn set_sleep_timer(&self, end_ms: Option<i64>) {
        self.publish(|s| s.sleep_timer_end = end_ms);
    }

    // ========================================================================
    // Queue plumbing (called by the queue manager)
    // ========================================================================

    /// Append an episode to the live engine queue and the state mirror.
    pub(crate) fn append_to_engine_queue(&self, episode: &Episode, podcast: &Podcast) {
        let Some(engine) = self.engine() else {
            log::warn!("append_to_engine_queue ignored: engine not connected");
            return;
        };
        engine.add_media_item(media_item_for(episode, Some(podcast)));
        self.publish(|s| s.queue.push(episode.clone()));
    }

    /// Jump to an episode already in the upcoming queue, by queue position.
    /// No reload and no position reset for items in between.
    pub(crate) fn skip_to_queued(&self, queue_index: usize) {
        let Some(engine) = self.engine() else {
            return;
        };
        let snapshot = self.snapshot();
        if queue_index >= snapshot.queue.len() {
            return;
        }

        // The outgoing episode keeps its progress; it was skipped, not
        // finished.
        self.save_progress();

        let target = *self.engine_index.lock().unwrap() + 1 + queue_index;
        engine.seek_to_item(target);
        engine.play();
        self.shift_queue_to(target);
    }

    /// Advance into the first upcoming queue item, if the engine has one.
    /// Returns whether playback moved.
    pub(crate) fn advance_into_queue(&self) -> bool {
        let Some(engine) = self.engine() else {
            return false;
        };
        let snapshot = self.snapshot();
        if snapshot.queue.is_empty() {
            return false;
        }
        let target = *self.engine_index.lock().unwrap() + 1;
        if target >= engine.media_item_count() {
            return false;
        }
        engine.seek_to_item(target);
        engine.play();
        self.shift_queue_to(target);
        true
    }

    /// Reconcile state after the engine's current item index moved forward:
    /// pop the passed-over queue entries, promote the last one to current and
    /// drop their persisted mirror rows.
    fn shift_queue_to(&self, index: usize) {
        let steps = {
            let mut guard = self.engine_index.lock().unwrap();
            let old = *guard;
            if index <= old {
                *guard = index;
                return;
            }
            *guard = index;
            index - old
        };

        let snapshot = self.snapshot();
        let mut queue = snapshot.queue.clone();
        let mut current = snapshot.current_episode.clone();

        for _ in 0..steps {
            if queue.is_empty() {
                break;
            }
            // The episode leaving the current slot no longer needs its
            // crash-recovery row.
            if let Some(outgoing) = current.as_ref() {
                if let Err(e) = self.db.remove_queue_item(&outgoing.id) {
                    log::warn!("Failed to drop queue row for {}: {}", outgoing.id, e);
                }
            }
            current = Some(queue.remove(0));
        }

        let podcast = current
            .as_ref()
            .and_then(|episode| self.resolve_podcast_for(&episode.id))
            .or(snapshot.current_podcast.clone());

        let is_liked = current
            .as_ref()
            .and_then(|episode| self.db.get_history_item(&episode.id).ok().flatten())
            .map(|row| row.is_liked)
            .unwrap_or(false);

        self.publish(|s| {
            s.queue = queue;
            s.current_episode = current;
            s.current_podcast = podcast;
            s.position_ms = 0;
            s.buffered_position_ms = 0;
            s.is_liked = is_liked;
        });
    }

    /// Best-effort podcast metadata for an episode entering the current slot:
    /// a subscription row when we have one, else the queue mirror's
    /// denormalized columns.
    fn resolve_podcast_for(&self, episode_id: &str) -> Option<Podcast> {
        let row = self
            .db
            .get_queue_items()
            .unwrap_or_default()
            .into_iter()
            .find(|item| item.episode_id == episode_id)?;
        let podcast_id = row.podcast_id.clone()?;

        if let Ok(subs) = self.db.get_subscriptions() {
            if let Some(sub) = subs.iter().find(|s| s.podcast_id == podcast_id) {
                return Some(sub.to_podcast());
            }
        }

        let mut podcast = Podcast::new(podcast_id, row.podcast_title.unwrap_or_default());
        podcast.image_url = row.image_url;
        Some(podcast)
    }

    // ========================================================================
    // Engine event handling
    // ========================================================================

    fn on_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::IsPlayingChanged(true) => {
                self.cancel_pending_pause_save();
                self.publish(|s| {
                    s.is_playing = true;
                    s.is_loading = false;
                });
                self.start_ticker();
            }
            EngineEvent::IsPlayingChanged(false) => {
                self.publish(|s| s.is_playing = false);
                self.stop_ticker();
                self.schedule_pause_save();
            }
            EngineEvent::StateChanged(TransportState::Buffering) => {
                self.publish(|s| s.is_loading = true);
                self.start_ticker();
            }
            EngineEvent::StateChanged(TransportState::Ready) => {
                let duration = self.engine().map(|e| e.duration_ms()).unwrap_or(0);
                self.publish(|s| {
                    s.is_loading = false;
                    if duration > 0 {
                        s.duration_ms = duration;
                    }
                });
            }
            EngineEvent::StateChanged(TransportState::Ended) => {
                self.handle_playback_ended();
            }
            EngineEvent::StateChanged(TransportState::Idle) => {}
            EngineEvent::MediaItemTransition(index) => {
                // The engine advanced itself (gapless transition): the
                // outgoing episode finished.
                self.save_completed();
                self.shift_queue_to(index);
            }
        }
    }

    /// Natural end of media: the engine exhausted its live queue.
    fn handle_playback_ended(&self) {
        self.stop_ticker();
        self.cancel_pending_pause_save();
        self.save_completed();

        self.publish(|s| {
            s.is_playing = false;
            s.is_loading = false;
            s.position_ms = 0;
        });

        // Refill fires synchronously with the ended signal.
        let callback = self.on_ended.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    // ========================================================================
    // Progress persistence
    // ========================================================================

    /// Whole-row upsert of the current session. Write failures are logged and
    /// swallowed; persistence is best effort, bounded by the save cadence.
    fn save_progress(&self) {
        let snapshot = self.snapshot();
        let (Some(episode), Some(podcast)) = (
            snapshot.current_episode.as_ref(),
            snapshot.current_podcast.as_ref(),
        ) else {
            return;
        };

        let mut row = PlaybackSession::from_snapshot(
            episode,
            podcast,
            snapshot.position_ms,
            snapshot.duration_ms,
            now_ms(),
        );
        row.is_liked = snapshot.is_liked;
        if snapshot.duration_ms > 0
            && snapshot.position_ms as f64 >= snapshot.duration_ms as f64 * COMPLETION_THRESHOLD
        {
            row.is_completed = true;
        }

        if let Err(e) = self.db.upsert_history(&row) {
            log::warn!("Progress save for {} failed: {}", episode.id, e);
        }
    }

    /// Persist the current episode as completed, position reset.
    fn save_completed(&self) {
        let snapshot = self.snapshot();
        let (Some(episode), Some(podcast)) = (
            snapshot.current_episode.as_ref(),
            snapshot.current_podcast.as_ref(),
        ) else {
            return;
        };

        let mut row =
            PlaybackSession::from_snapshot(episode, podcast, 0, snapshot.duration_ms, now_ms());
        row.is_completed = true;
        row.is_liked = snapshot.is_liked;

        if let Err(e) = self.db.upsert_history(&row) {
            log::warn!("Completion save for {} failed: {}", episode.id, e);
        }
    }

    /// Delayed durable save after a pause. Cancelled when playback resumes or
    /// another episode loads within the grace window.
    fn schedule_pause_save(&self) {
        if self.snapshot().current_episode.is_none() {
            return;
        }
        self.cancel_pending_pause_save();

        let token = CancellationToken::new();
        *self.pending_pause_save.lock().unwrap() = Some(token.clone());

        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(PAUSE_SAVE_GRACE_MS)) => {
                    if let Some(manager) = weak.upgrade() {
                        manager.save_progress();
                        *manager.pending_pause_save.lock().unwrap() = None;
                    }
                }
            }
        });
    }

    fn cancel_pending_pause_save(&self) {
        if let Some(token) = self.pending_pause_save.lock().unwrap().take() {
            token.cancel();
        }
    }

    // ========================================================================
    // Progress ticker
    // ========================================================================

    /// Start the transport poll loop. Runs only while the engine reports
    /// playing or buffering; restarting playback spawns a fresh task rather
    /// than resuming a parked one.
    fn start_ticker(&self) {
        let mut guard = self.ticker.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *guard = Some(token.clone());
        drop(guard);

        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(manager) = weak.upgrade() else { break; };
                        manager.on_tick();
                    }
                }
            }
        });
    }

    fn stop_ticker(&self) {
        if let Some(token) = self.ticker.lock().unwrap().take() {
            token.cancel();
        }
    }

    fn on_tick(&self) {
        let Some(engine) = self.engine() else {
            return;
        };

        let position = engine.position_ms();
        let duration = engine.duration_ms();
        let buffered = engine.buffered_position_ms();
        let is_playing = engine.is_playing();

        self.publish(|s| {
            s.position_ms = position;
            if duration > 0 {
                s.duration_ms = duration;
            }
            s.buffered_position_ms = buffered;
            s.is_playing = is_playing;
        });

        let snapshot = self.snapshot();
        if let Some(deadline) = snapshot.sleep_timer_end {
            if now_ms() >= deadline {
                log::info!("Sleep timer elapsed; pausing");
                engine.pause();
                self.publish(|s| s.sleep_timer_end = None);
                return;
            }
        }

        // Opportunistic durable save, roughly once per save interval of
        // wall clock.
        if now_ms() % PROGRESS_SAVE_INTERVAL_MS < TICK_INTERVAL_MS as i64 {
            self.save_progress();
        }
    }
}

/// Event loop consuming the engine's ordered callback stream. Events are
/// handled one at a time, preserving delivery order.
async fn run_event_loop(weak: Weak<PlaybackSessionManager>, mut events: EngineEventReceiver) {
    while let Some(event) = events.recv().await {
        let Some(manager) = weak.upgrade() else {
            break;
        };
        manager.on_engine_event(event);
    }
    log::info!("Engine event channel closed");
}
