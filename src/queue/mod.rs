//! Queue manager: the only component that talks to both the smart queue
//! engine and the playback session manager, keeping the persisted queue
//! mirror and the live engine queue consistent.

pub mod smart;


use crate::database::{Database, Episode, Podcast};
use crate::player::PlaybackSessionManager;
use smart::{SmartQueueEngine, SortHint};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct QueueManager {
    inner: Arc<QueueManagerInner>,
}

struct QueueManagerInner {
    db: Arc<Database>,
    session: Arc<PlaybackSessionManager>,
    smart: SmartQueueEngine,
    /// Best-effort in-flight guard: duplicate end-of-media signals must not
    /// overlap refills. Always reset, including on an empty batch.
    is_refilling: AtomicBool,
}

impl QueueManager {
    pub fn new(
        db: Arc<Database>,
        session: Arc<PlaybackSessionManager>,
        smart: SmartQueueEngine,
    ) -> Self {
        let inner = Arc::new(QueueManagerInner {
            db,
            session,
            smart,
            is_refilling: AtomicBool::new(false),
        });

        // Auto-refill: registered once, fired synchronously by the session
        // manager whenever the engine reports end-of-media.
        let weak = Arc::downgrade(&inner);
        inner.session.set_on_ended(Arc::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                QueueManagerInner::refill(inner).await;
            });
        }));

        Self { inner }
    }

    /// Queue-replacing play.
    ///
    /// When the target episode is already in the live queue for the same
    /// podcast, playback jumps to its index without reloading. Otherwise the
    /// persisted queue is cleared, the new episode becomes its single item
    /// and playback starts with a queue of exactly one; auto-refill fills
    /// the rest reactively instead of blocking time-to-first-audio on an
    /// upfront batch fetch.
    pub fn play_episode(&self, episode: &Episode, podcast: &Podcast) {
        let snapshot = self.inner.session.snapshot();
        if let Some(index) = snapshot.queue.iter().position(|e| e.id == episode.id) {
            let same_podcast = self
                .inner
                .db
                .get_queue_items()
                .unwrap_or_default()
                .iter()
                .any(|item| {
                    item.episode_id == episode.id
                        && item.podcast_id.as_deref() == Some(podcast.id.as_str())
                });
            if same_podcast {
                log::info!("{} already queued; skipping to index {}", episode.id, index);
                self.inner.session.skip_to_queued(index);
                return;
            }
        }

        if let Err(e) = self.inner.db.clear_queue() {
            log::warn!("Failed to clear persisted queue: {}", e);
        }
        if let Err(e) = self.inner.db.enqueue_item(episode, Some(podcast)) {
            log::warn!("Failed to persist queue item {}: {}", episode.id, e);
        }
        self.inner.session.play_episode(episode, podcast);
    }

    /// Queue-appending add. A missing podcast is logged and ignored so no
    /// partial queue entry lands in the store.
    pub fn add_to_queue(&self, episode: &Episode, podcast: Option<&Podcast>) {
        let Some(podcast) = podcast else {
            log::warn!(
                "add_to_queue ignored: no podcast for episode {}",
                episode.id
            );
            return;
        };
        if let Err(e) = self.inner.db.enqueue_item(episode, Some(podcast)) {
            log::warn!("Failed to persist queue item {}: {}", episode.id, e);
        }
        self.inner.session.append_to_engine_queue(episode, podcast);
    }

    /// Remove an upcoming episode from the persisted mirror. (The engine-side
    /// item stays; it is skipped over by index bookkeeping.)
    pub fn remove_from_queue(&self, episode_id: &str) {
        if let Err(e) = self.inner.db.remove_queue_item(episode_id) {
            log::warn!("Failed to remove queue item {}: {}", episode_id, e);
        }
    }

    #[cfg(test)]
    pub(crate) async fn run_refill(&self) {
        QueueManagerInner::refill(self.inner.clone()).await;
    }

    #[cfg(test)]
    pub(crate) fn is_refilling(&self) -> bool {
        self.inner.is_refilling.load(Ordering::SeqCst)
    }
}

impl QueueManagerInner {
    /// Compute and apply the next queue batch after end-of-media.
    ///
    /// Every fetched candidate is written to both the persisted queue and the
    /// live engine queue, in smart-engine order, then playback advances into
    /// the batch. An empty batch leaves the queue dry, a user-visible
    /// terminal state, not an error.
    async fn refill(inner: Arc<QueueManagerInner>) {
        if inner.is_refilling.swap(true, Ordering::SeqCst) {
            log::info!("Refill already in flight; ignoring duplicate end-of-media");
            return;
        }

        let snapshot = inner.session.snapshot();
        let (Some(episode), Some(podcast)) = (
            snapshot.current_episode.clone(),
            snapshot.current_podcast.clone(),
        ) else {
            inner.is_refilling.store(false, Ordering::SeqCst);
            return;
        };

        let sort_hint = match inner.db.get_setting("episode_sort_order") {
            Ok(Some(value)) if value == "oldest" => SortHint::OldestFirst,
            _ => SortHint::NewestFirst,
        };

        let batch = inner.smart.next_episodes(&episode, &podcast, sort_hint).await;

        if batch.is_empty() {
            log::info!("Queue refill found nothing after {}; queue runs dry", episode.id);
        } else {
            log::info!("Queue refill: {} episodes after {}", batch.len(), episode.id);
            for candidate in &batch {
                if let Err(e) = inner.db.enqueue_item(candidate, Some(&podcast)) {
                    log::warn!("Failed to persist refill item {}: {}", candidate.id, e);
                }
                inner.session.append_to_engine_queue(candidate, &podcast);
            }
            inner.session.advance_into_queue();
        }

        inner.is_refilling.store(false, Ordering::SeqCst);
    }
}
