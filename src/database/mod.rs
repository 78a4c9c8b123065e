pub mod models;

#[cfg(test)]
mod tests;

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub use models::*;

/// Durable local store for playback progress, the queue mirror,
/// subscriptions, and app settings.
///
/// This is the only state that survives process death; the live engine and
/// the in-memory player state are caches reconcilable from it.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA cache_size=10000;
            PRAGMA temp_store=MEMORY;
        ",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        // Initialize schema
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            -- Per-episode playback progress. One row per episode id;
            -- every save is a whole-row replacement (latest write wins).
            CREATE TABLE IF NOT EXISTS listening_history (
                episode_id TEXT PRIMARY KEY,
                podcast_id TEXT NOT NULL,
                episode_title TEXT NOT NULL,
                podcast_title TEXT,
                audio_url TEXT NOT NULL,
                image_url TEXT,
                position_ms INTEGER NOT NULL DEFAULT 0,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                last_played_at INTEGER NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0,
                is_dirty INTEGER NOT NULL DEFAULT 1,
                is_liked INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_history_last_played
                ON listening_history(last_played_at DESC);
            CREATE INDEX IF NOT EXISTS idx_history_completed
                ON listening_history(is_completed);

            -- Crash-recovery mirror of the live engine queue. AUTOINCREMENT
            -- keeps positions unique and strictly increasing.
            CREATE TABLE IF NOT EXISTS queue_items (
                position INTEGER PRIMARY KEY AUTOINCREMENT,
                episode_id TEXT NOT NULL,
                title TEXT NOT NULL,
                podcast_id TEXT,
                podcast_title TEXT,
                image_url TEXT,
                audio_url TEXT NOT NULL,
                duration INTEGER NOT NULL DEFAULT 0,
                pub_date INTEGER NOT NULL DEFAULT 0,
                description TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_queue_episode ON queue_items(episode_id);

            -- Followed shows, in subscription order.
            CREATE TABLE IF NOT EXISTS subscriptions (
                podcast_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                artist TEXT,
                image_url TEXT,
                fallback_image_url TEXT,
                description TEXT,
                genre TEXT NOT NULL DEFAULT 'Podcast',
                feed_url TEXT,
                subscribed_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- App settings (key-value store)
            CREATE TABLE IF NOT EXISTS app_settings (
                key TEXT PRIMARY KEY,
                value TEXT,
                updated_at TEXT DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    // ========================================================================
    // Listening history
    // ========================================================================

    /// Whole-row upsert keyed by episode id; latest write wins.
    pub fn upsert_history(&self, session: &PlaybackSession) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO listening_history
                (episode_id, podcast_id, episode_title, podcast_title, audio_url,
                 image_url, position_ms, duration_ms, last_played_at,
                 is_completed, is_dirty, is_liked)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                session.episode_id,
                session.podcast_id,
                session.episode_title,
                session.podcast_title,
                session.audio_url,
                session.image_url,
                session.position_ms,
                session.duration_ms,
                session.last_played_at,
                session.is_completed as i32,
                session.is_dirty as i32,
                session.is_liked as i32,
            ],
        )?;
        Ok(())
    }

    pub fn get_history_item(&self, episode_id: &str) -> Result<Option<PlaybackSession>> {
        let conn = self.conn.lock().unwrap();
        let item = conn
            .query_row(
                "SELECT episode_id, podcast_id, episode_title, podcast_title, audio_url,
                        image_url, position_ms, duration_ms, last_played_at,
                        is_completed, is_dirty, is_liked
                 FROM listening_history WHERE episode_id = ?",
                params![episode_id],
                Self::map_session_row,
            )
            .optional()?;
        Ok(item)
    }

    /// Most recently played session, if any.
    pub fn get_last_played_session(&self) -> Result<Option<PlaybackSession>> {
        let conn = self.conn.lock().unwrap();
        let item = conn
            .query_row(
                "SELECT episode_id, podcast_id, episode_title, podcast_title, audio_url,
                        image_url, position_ms, duration_ms, last_played_at,
                        is_completed, is_dirty, is_liked
                 FROM listening_history
                 ORDER BY last_played_at DESC
                 LIMIT 1",
                [],
                Self::map_session_row,
            )
            .optional()?;
        Ok(item)
    }

    /// Recently-played rows, newest first.
    pub fn get_history(&self, limit: i64, offset: i64) -> Result<Vec<PlaybackSession>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT episode_id, podcast_id, episode_title, podcast_title, audio_url,
                    image_url, position_ms, duration_ms, last_played_at,
                    is_completed, is_dirty, is_liked
             FROM listening_history
             ORDER BY last_played_at DESC
             LIMIT ? OFFSET ?",
        )?;
        let items = stmt
            .query_map(params![limit, offset], Self::map_session_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn get_completed_episode_ids(&self) -> Result<HashSet<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT episode_id FROM listening_history WHERE is_completed = 1")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    pub fn set_liked(&self, episode_id: &str, liked: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE listening_history SET is_liked = ?, is_dirty = 1 WHERE episode_id = ?",
            params![liked as i32, episode_id],
        )?;
        Ok(())
    }

    /// Explicit "remove from history", the only hard delete on this table.
    pub fn delete_history_item(&self, episode_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM listening_history WHERE episode_id = ?",
            params![episode_id],
        )?;
        Ok(())
    }

    fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlaybackSession> {
        Ok(PlaybackSession {
            episode_id: row.get(0)?,
            podcast_id: row.get(1)?,
            episode_title: row.get(2)?,
            podcast_title: row.get(3)?,
            audio_url: row.get(4)?,
            image_url: row.get(5)?,
            position_ms: row.get(6)?,
            duration_ms: row.get(7)?,
            last_played_at: row.get(8)?,
            is_completed: row.get::<_, i32>(9)? == 1,
            is_dirty: row.get::<_, i32>(10)? == 1,
            is_liked: row.get::<_, i32>(11)? == 1,
        })
    }

    // ========================================================================
    // Queue mirror
    // ========================================================================

    /// Append an episode to the persisted queue. Returns the assigned
    /// position.
    pub fn enqueue_item(&self, episode: &Episode, podcast: Option<&Podcast>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO queue_items
                (episode_id, title, podcast_id, podcast_title, image_url,
                 audio_url, duration, pub_date, description)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                episode.id,
                episode.title,
                podcast.map(|p| p.id.clone()),
                podcast.map(|p| p.title.clone()),
                episode
                    .image_url
                    .clone()
                    .or_else(|| podcast.and_then(|p| p.image_url.clone())),
                episode.audio_url,
                episode.duration,
                episode.published_date,
                episode.description,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Queue rows in position order.
    pub fn get_queue_items(&self) -> Result<Vec<QueueItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT position, episode_id, title, podcast_id, podcast_title,
                    image_url, audio_url, duration, pub_date, description
             FROM queue_items
             ORDER BY position ASC",
        )?;
        let items = stmt
            .query_map([], |row| {
                Ok(QueueItem {
                    position: row.get(0)?,
                    episode_id: row.get(1)?,
                    title: row.get(2)?,
                    podcast_id: row.get(3)?,
                    podcast_title: row.get(4)?,
                    image_url: row.get(5)?,
                    audio_url: row.get(6)?,
                    duration: row.get(7)?,
                    pub_date: row.get(8)?,
                    description: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn remove_queue_item(&self, episode_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM queue_items WHERE episode_id = ?",
            params![episode_id],
        )?;
        Ok(())
    }

    /// Clear the persisted queue and reset the position counter so a fresh
    /// queue starts numbering from 1 again.
    pub fn clear_queue(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM queue_items", [])?;
        // sqlite_sequence only exists after the first AUTOINCREMENT insert
        conn.execute("DELETE FROM sqlite_sequence WHERE name = 'queue_items'", [])
            .ok();
        Ok(())
    }

    /// Startup cleanup: drop mirror rows for episodes already completed.
    /// Returns the number of rows removed.
    pub fn purge_completed_queue_items(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM queue_items WHERE episode_id IN
                (SELECT episode_id FROM listening_history WHERE is_completed = 1)",
            [],
        )?;
        Ok(count)
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub fn add_subscription(&self, podcast: &Podcast, feed_url: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO subscriptions
                (podcast_id, title, artist, image_url, fallback_image_url,
                 description, genre, feed_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                podcast.id,
                podcast.title,
                podcast.artist,
                podcast.image_url,
                podcast.fallback_image_url,
                podcast.description,
                podcast.genre,
                feed_url,
            ],
        )?;
        Ok(())
    }

    /// Subscriptions in subscription order (oldest first).
    pub fn get_subscriptions(&self) -> Result<Vec<Subscription>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT podcast_id, title, artist, image_url, fallback_image_url,
                    description, genre, feed_url, subscribed_at
             FROM subscriptions
             ORDER BY subscribed_at ASC, podcast_id ASC",
        )?;
        let subs = stmt
            .query_map([], |row| {
                Ok(Subscription {
                    podcast_id: row.get(0)?,
                    title: row.get(1)?,
                    artist: row.get(2)?,
                    image_url: row.get(3)?,
                    fallback_image_url: row.get(4)?,
                    description: row.get(5)?,
                    genre: row.get(6)?,
                    feed_url: row.get(7)?,
                    subscribed_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subs)
    }

    pub fn remove_subscription(&self, podcast_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM subscriptions WHERE podcast_id = ?",
            params![podcast_id],
        )?;
        Ok(())
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO app_settings (key, value, updated_at)
             VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// Durable "user closed the player" flag; suppresses auto-restore on the
    /// next launch until a new play clears it.
    pub fn set_player_dismissed(&self, dismissed: bool) -> Result<()> {
        self.set_setting("player_dismissed", if dismissed { "1" } else { "0" })
    }

    pub fn is_player_dismissed(&self) -> Result<bool> {
        Ok(self.get_setting("player_dismissed")?.as_deref() == Some("1"))
    }
}
