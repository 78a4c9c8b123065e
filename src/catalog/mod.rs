//! Network-backed episode catalog.
//!
//! Every call is fail-soft: transport or parse errors are logged and mapped
//! to empty results. Nothing on this boundary raises an exception into the
//! player core, and nothing is retried; the next user action triggers a
//! fresh attempt.

use crate::database::models::{Episode, Podcast};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;

/// Upper bound on a single episode listing.
pub const EPISODE_FETCH_LIMIT: usize = 1000;

/// Upper bound on a streamed feed body (8 MiB).
const MAX_FEED_BYTES: usize = 8 * 1024 * 1024;

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Full episode list for a show, up to [`EPISODE_FETCH_LIMIT`] items.
    /// Ordering is unspecified by contract, so callers must re-sort.
    async fn get_episodes(&self, podcast_id: &str) -> Vec<Episode>;

    /// Trending shows for a region, optionally narrowed to a category.
    async fn get_trending_podcasts(
        &self,
        region: &str,
        limit: usize,
        category: Option<&str>,
    ) -> Vec<Podcast>;

    /// Latest episode per show, for "new episodes" catch-up surfaces.
    async fn sync_subscriptions(&self, podcast_ids: &[String]) -> HashMap<String, Episode>;
}

// ── Catalog API DTOs ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PodcastLookupResponse {
    podcast: PodcastDto,
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    podcasts: Vec<PodcastDto>,
}

#[derive(Debug, Deserialize)]
struct PodcastDto {
    id: i64,
    title: String,
    author: Option<String>,
    image: Option<String>,
    artwork: Option<String>,
    description: Option<String>,
    genre: Option<String>,
    feed_url: Option<String>,
}

impl PodcastDto {
    fn into_podcast(self) -> Podcast {
        Podcast {
            id: self.id.to_string(),
            title: self.title,
            artist: self.author,
            image_url: self.artwork.clone().or_else(|| self.image.clone()),
            fallback_image_url: self.image,
            description: self.description,
            genre: self.genre.unwrap_or_else(|| "Podcast".to_string()),
            latest_episode: None,
            resume_progress: None,
        }
    }
}

/// HTTP catalog: show lookup and trending via the JSON API, episode listings
/// by fetching and parsing the show's RSS feed.
pub struct HttpCatalog {
    client: reqwest::Client,
    api_base: String,
}

impl HttpCatalog {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    async fn lookup_podcast(&self, podcast_id: &str) -> Result<PodcastDto, String> {
        let url = format!("{}/podcasts/{}", self.api_base, podcast_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Failed to fetch podcast {}: {}", podcast_id, e))?;

        if !response.status().is_success() {
            return Err(format!(
                "Podcast lookup failed with status: {}",
                response.status()
            ));
        }

        let body: PodcastLookupResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse podcast lookup: {}", e))?;

        Ok(body.podcast)
    }

    /// Stream a feed body with a hard size cap.
    async fn fetch_feed_body(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Failed to fetch feed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Feed fetch failed with status: {}", response.status()));
        }

        let mut stream = response.bytes_stream();
        let mut body: Vec<u8> = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| format!("Error reading feed stream: {}", e))?;
            if body.len() + chunk.len() > MAX_FEED_BYTES {
                return Err(format!("Feed exceeds {} byte limit", MAX_FEED_BYTES));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }

    async fn episodes_from_feed(&self, podcast_id: &str) -> Result<Vec<Episode>, String> {
        let podcast = self.lookup_podcast(podcast_id).await?;
        let feed_url = podcast
            .feed_url
            .ok_or_else(|| format!("Podcast {} has no feed url", podcast_id))?;

        let body = self.fetch_feed_body(&feed_url).await?;
        let feed = feed_rs::parser::parse(body.as_slice())
            .map_err(|e| format!("Failed to parse feed: {}", e))?;

        log::info!(
            "Parsed {} entries from feed for podcast {}",
            feed.entries.len(),
            podcast_id
        );

        let episodes = feed
            .entries
            .into_iter()
            .filter_map(map_feed_entry)
            .take(EPISODE_FETCH_LIMIT)
            .collect();

        Ok(episodes)
    }
}

/// Map one feed entry to an episode; entries without an audio enclosure are
/// skipped.
fn map_feed_entry(entry: feed_rs::model::Entry) -> Option<Episode> {
    // Get audio URL from enclosure
    let audio_url = entry
        .media
        .first()
        .and_then(|m| m.content.first())
        .and_then(|c| c.url.as_ref())
        .map(|u| u.to_string())
        .or_else(|| {
            entry
                .links
                .iter()
                .find(|l| l.media_type.as_deref() == Some("audio/mpeg"))
                .map(|l| l.href.clone())
        })?;

    let title = entry.title.map(|t| t.content).unwrap_or_default();
    let description = entry.summary.map(|s| s.content);
    let published_date = entry
        .published
        .map(|d| d.timestamp_millis())
        .unwrap_or(0);

    let duration = entry
        .media
        .first()
        .and_then(|m| m.content.first())
        .and_then(|c| c.duration.map(|d| d.as_secs() as i64))
        .unwrap_or(0);

    let image_url = entry
        .media
        .first()
        .and_then(|m| m.thumbnails.first())
        .map(|t| t.image.uri.clone());

    Some(Episode {
        id: entry.id,
        title,
        description,
        audio_url,
        image_url,
        duration,
        published_date,
        chapters_url: None,
        transcript_url: None,
        persons: Vec::new(),
        transcripts: Vec::new(),
    })
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn get_episodes(&self, podcast_id: &str) -> Vec<Episode> {
        match self.episodes_from_feed(podcast_id).await {
            Ok(episodes) => episodes,
            Err(e) => {
                log::warn!("Episode listing for {} failed: {}", podcast_id, e);
                Vec::new()
            }
        }
    }

    async fn get_trending_podcasts(
        &self,
        region: &str,
        limit: usize,
        category: Option<&str>,
    ) -> Vec<Podcast> {
        let mut url = format!(
            "{}/trending?region={}&limit={}",
            self.api_base, region, limit
        );
        if let Some(category) = category {
            url.push_str(&format!("&category={}", category));
        }

        let result: Result<TrendingResponse, String> = async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| format!("Failed to fetch trending: {}", e))?;

            if !response.status().is_success() {
                return Err(format!(
                    "Trending fetch failed with status: {}",
                    response.status()
                ));
            }

            response
                .json()
                .await
                .map_err(|e| format!("Failed to parse trending: {}", e))
        }
        .await;

        match result {
            Ok(body) => body
                .podcasts
                .into_iter()
                .map(PodcastDto::into_podcast)
                .collect(),
            Err(e) => {
                log::warn!("Trending fetch failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn sync_subscriptions(&self, podcast_ids: &[String]) -> HashMap<String, Episode> {
        let mut latest: HashMap<String, Episode> = HashMap::new();

        for podcast_id in podcast_ids {
            let episodes = self.get_episodes(podcast_id).await;
            if let Some(newest) = episodes.into_iter().max_by_key(|e| e.published_date) {
                latest.insert(podcast_id.clone(), newest);
            }
        }

        latest
    }
}
