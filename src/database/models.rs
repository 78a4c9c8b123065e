use serde::{Deserialize, Serialize};

/// Episode metadata as served by the catalog. Immutable value object:
/// recreated on every refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Opaque id; the catalog's numeric id rendered as a string.
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub audio_url: String,
    /// Episode art; falls back to the podcast art when absent.
    pub image_url: Option<String>,
    /// Duration in seconds; 0 when the catalog doesn't know.
    pub duration: i64,
    /// Publish date in epoch milliseconds; 0 when unknown.
    pub published_date: i64,
    pub chapters_url: Option<String>,
    pub transcript_url: Option<String>,
    pub persons: Vec<EpisodePerson>,
    pub transcripts: Vec<EpisodeTranscript>,
}

/// Podcasting 2.0 `<podcast:person>` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodePerson {
    pub name: String,
    pub role: Option<String>,
    pub image_url: Option<String>,
}

/// Podcasting 2.0 `<podcast:transcript>` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeTranscript {
    pub url: String,
    pub mime_type: Option<String>,
}

impl Episode {
    /// Bare episode with only the fields every catalog source provides.
    pub fn new(id: impl Into<String>, title: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            audio_url: audio_url.into(),
            image_url: None,
            duration: 0,
            published_date: 0,
            chapters_url: None,
            transcript_url: None,
            persons: Vec::new(),
            transcripts: Vec::new(),
        }
    }
}

/// Show-level metadata. Immutable value object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Podcast {
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub image_url: Option<String>,
    /// Secondary art source used when `image_url` 404s or is missing.
    pub fallback_image_url: Option<String>,
    pub description: Option<String>,
    /// Primary category as free text. The catalog defaults this to "Podcast".
    pub genre: String,
    pub latest_episode: Option<Episode>,
    /// 0..1 resume hint for list surfaces; not authoritative.
    pub resume_progress: Option<f32>,
}

impl Podcast {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            image_url: None,
            fallback_image_url: None,
            description: None,
            genre: "Podcast".to_string(),
            latest_episode: None,
            resume_progress: None,
        }
    }
}

/// Durable playback progress row, one per episode id (upsert semantics).
///
/// Display metadata is denormalized so resuming after process death never
/// needs a network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub episode_id: String,
    pub podcast_id: String,
    pub episode_title: String,
    pub podcast_title: Option<String>,
    pub audio_url: String,
    pub image_url: Option<String>,
    pub position_ms: i64,
    pub duration_ms: i64,
    /// Epoch milliseconds of the last progress write; drives "recently
    /// played" ordering.
    pub last_played_at: i64,
    pub is_completed: bool,
    /// Marks writes not yet pushed anywhere else; local-only today.
    pub is_dirty: bool,
    pub is_liked: bool,
}

impl PlaybackSession {
    /// Denormalize the live (episode, podcast) pair into a history row.
    pub fn from_snapshot(
        episode: &Episode,
        podcast: &Podcast,
        position_ms: i64,
        duration_ms: i64,
        last_played_at: i64,
    ) -> Self {
        Self {
            episode_id: episode.id.clone(),
            podcast_id: podcast.id.clone(),
            episode_title: episode.title.clone(),
            podcast_title: Some(podcast.title.clone()),
            audio_url: episode.audio_url.clone(),
            image_url: episode.image_url.clone().or_else(|| podcast.image_url.clone()),
            position_ms,
            duration_ms,
            last_played_at,
            is_completed: false,
            is_dirty: true,
            is_liked: false,
        }
    }

    /// Rebuild an episode snapshot from the cached metadata. Used by session
    /// restore, which must not touch the network.
    pub fn to_episode(&self) -> Episode {
        Episode {
            id: self.episode_id.clone(),
            title: self.episode_title.clone(),
            description: None,
            audio_url: self.audio_url.clone(),
            image_url: self.image_url.clone(),
            duration: self.duration_ms / 1000,
            published_date: 0,
            chapters_url: None,
            transcript_url: None,
            persons: Vec::new(),
            transcripts: Vec::new(),
        }
    }

    /// Rebuild a podcast snapshot from the cached metadata.
    pub fn to_podcast(&self) -> Podcast {
        let mut podcast = Podcast::new(
            self.podcast_id.clone(),
            self.podcast_title.clone().unwrap_or_default(),
        );
        podcast.image_url = self.image_url.clone();
        podcast
    }
}

/// Persisted queue row: a crash-recovery mirror of the live engine queue,
/// not the source of truth while the app is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Monotonically increasing insertion order (AUTOINCREMENT).
    pub position: i64,
    pub episode_id: String,
    pub title: String,
    pub podcast_id: Option<String>,
    pub podcast_title: Option<String>,
    pub image_url: Option<String>,
    pub audio_url: String,
    pub duration: i64,
    pub pub_date: i64,
    pub description: Option<String>,
}

impl QueueItem {
    /// Rebuild the episode snapshot this row mirrors.
    pub fn to_episode(&self) -> Episode {
        Episode {
            id: self.episode_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            audio_url: self.audio_url.clone(),
            image_url: self.image_url.clone(),
            duration: self.duration,
            published_date: self.pub_date,
            chapters_url: None,
            transcript_url: None,
            persons: Vec::new(),
            transcripts: Vec::new(),
        }
    }
}

/// Subscription row: a followed show, kept in subscription order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub podcast_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub image_url: Option<String>,
    pub fallback_image_url: Option<String>,
    pub description: Option<String>,
    pub genre: String,
    pub feed_url: Option<String>,
    pub subscribed_at: String,
}

impl Subscription {
    pub fn to_podcast(&self) -> Podcast {
        Podcast {
            id: self.podcast_id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            image_url: self.image_url.clone(),
            fallback_image_url: self.fallback_image_url.clone(),
            description: self.description.clone(),
            genre: self.genre.clone(),
            latest_episode: None,
            resume_progress: None,
        }
    }
}
