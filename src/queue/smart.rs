//! Smart queue continuation: chronological in-show continuation, then
//! genre-based discovery across subscriptions and the trending catalog once
//! a show runs out of newer episodes.

use crate::catalog::Catalog;
use crate::database::{Database, Episode, Podcast};
use std::collections::HashSet;
use std::sync::Arc;

/// How many in-show successors to queue at once.
pub const CONTINUATION_BATCH: usize = 20;

/// How many trending shows to consider during genre fallback.
const TRENDING_LIMIT: usize = 20;

/// Browse-surface sort preference. Carried through the contract but
/// deliberately ignored for continuation: episode N's natural successor is
/// N+1 in publish order even when the browse view shows newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortHint {
    #[default]
    NewestFirst,
    OldestFirst,
}

pub struct SmartQueueEngine {
    db: Arc<Database>,
    catalog: Arc<dyn Catalog>,
    region: String,
}

impl SmartQueueEngine {
    pub fn new(db: Arc<Database>, catalog: Arc<dyn Catalog>, region: impl Into<String>) -> Self {
        Self {
            db,
            catalog,
            region: region.into(),
        }
    }

    /// Compute the next batch of episodes to queue after `current` finishes.
    ///
    /// Never fails: any catalog or store trouble, and plain exhaustion, all
    /// yield an empty batch. An empty batch is a terminal end-of-queue state,
    /// not an error.
    pub async fn next_episodes(
        &self,
        current: &Episode,
        podcast: &Podcast,
        _sort_hint: SortHint,
    ) -> Vec<Episode> {
        // Phase 1: in-show continuation, always oldest to newest.
        let mut episodes = self.catalog.get_episodes(&podcast.id).await;
        episodes.sort_by_key(|e| e.published_date);

        let Some(index) = episodes.iter().position(|e| e.id == current.id) else {
            log::warn!(
                "Episode {} not found in show {}; cannot continue",
                current.id,
                podcast.id
            );
            return Vec::new();
        };

        let next: Vec<Episode> = episodes
            .into_iter()
            .skip(index + 1)
            .take(CONTINUATION_BATCH)
            .collect();
        if !next.is_empty() {
            return next;
        }

        // Phase 2: the show is exhausted going forward.
        log::info!(
            "Show '{}' exhausted after '{}'; trying genre fallback",
            podcast.title,
            current.title
        );
        self.genre_fallback(podcast).await
    }

    /// Cross-show discovery: genre-matching subscriptions in subscription
    /// order, then the trending feed for the genre. Single-episode batches.
    async fn genre_fallback(&self, podcast: &Podcast) -> Vec<Episode> {
        let completed = match self.db.get_completed_episode_ids() {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!("Completed-episode lookup failed: {}", e);
                HashSet::new()
            }
        };

        let subscriptions = match self.db.get_subscriptions() {
            Ok(subs) => subs,
            Err(e) => {
                log::warn!("Subscription lookup failed: {}", e);
                Vec::new()
            }
        };

        for sub in &subscriptions {
            // The catalog can expose the same show under multiple ids, so the
            // current show is excluded by title as well as id.
            if sub.podcast_id == podcast.id || sub.title.eq_ignore_ascii_case(&podcast.title) {
                continue;
            }
            if !sub.genre.eq_ignore_ascii_case(&podcast.genre) {
                continue;
            }
            if let Some(pick) = self.newest_unplayed(&sub.podcast_id, &completed).await {
                log::info!(
                    "Genre fallback: '{}' from subscribed show '{}'",
                    pick.title,
                    sub.title
                );
                return vec![pick];
            }
        }

        let trending = self
            .catalog
            .get_trending_podcasts(&self.region, TRENDING_LIMIT, Some(&podcast.genre))
            .await;
        for show in &trending {
            if show.id == podcast.id || show.title.eq_ignore_ascii_case(&podcast.title) {
                continue;
            }
            if let Some(pick) = self.newest_unplayed(&show.id, &completed).await {
                log::info!(
                    "Genre fallback: '{}' from trending show '{}'",
                    pick.title,
                    show.title
                );
                return vec![pick];
            }
        }

        log::info!("Genre fallback exhausted for '{}'", podcast.genre);
        Vec::new()
    }

    /// Newest episode of a show that isn't marked completed. Partially-played
    /// episodes stay eligible for rediscovery.
    async fn newest_unplayed(
        &self,
        podcast_id: &str,
        completed: &HashSet<String>,
    ) -> Option<Episode> {
        let mut episodes = self.catalog.get_episodes(podcast_id).await;
        episodes.sort_by(|a, b| b.published_date.cmp(&a.published_date));
        episodes.into_iter().find(|e| !completed.contains(&e.id))
    }
}
