// Edge-case tests for the history, queue mirror, subscription and settings
// stores. Run with: cargo test --lib database::tests

#[cfg(test)]
mod history_tests {
    use crate::database::{Database, PlaybackSession};
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    fn session(episode_id: &str, position_ms: i64, last_played_at: i64) -> PlaybackSession {
        PlaybackSession {
            episode_id: episode_id.to_string(),
            podcast_id: "p1".to_string(),
            episode_title: format!("Episode {}", episode_id),
            podcast_title: Some("Test Show".to_string()),
            audio_url: format!("http://example.com/{}.mp3", episode_id),
            image_url: None,
            position_ms,
            duration_ms: 3_600_000,
            last_played_at,
            is_completed: false,
            is_dirty: true,
            is_liked: false,
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let (db, _temp) = setup_test_db();
        db.upsert_history(&session("e1", 45_000, 1000)).unwrap();

        let row = db.get_history_item("e1").unwrap().unwrap();
        assert_eq!(row.position_ms, 45_000);
        assert_eq!(row.podcast_title, Some("Test Show".to_string()));
    }

    #[test]
    fn test_upsert_is_whole_row_replacement() {
        let (db, _temp) = setup_test_db();
        db.upsert_history(&session("e1", 45_000, 1000)).unwrap();

        // Later write wins wholesale
        let mut updated = session("e1", 90_000, 2000);
        updated.is_completed = true;
        db.upsert_history(&updated).unwrap();

        let row = db.get_history_item("e1").unwrap().unwrap();
        assert_eq!(row.position_ms, 90_000);
        assert!(row.is_completed);

        // Still one row per episode id
        assert_eq!(db.get_history(100, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_last_played_ordering() {
        let (db, _temp) = setup_test_db();
        db.upsert_history(&session("e1", 0, 1000)).unwrap();
        db.upsert_history(&session("e2", 0, 3000)).unwrap();
        db.upsert_history(&session("e3", 0, 2000)).unwrap();

        let last = db.get_last_played_session().unwrap().unwrap();
        assert_eq!(last.episode_id, "e2");

        let history = db.get_history(10, 0).unwrap();
        let ids: Vec<&str> = history.iter().map(|s| s.episode_id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e3", "e1"]);
    }

    #[test]
    fn test_completed_episode_ids() {
        let (db, _temp) = setup_test_db();
        db.upsert_history(&session("e1", 0, 1000)).unwrap();
        let mut done = session("e2", 0, 2000);
        done.is_completed = true;
        db.upsert_history(&done).unwrap();

        let ids = db.get_completed_episode_ids().unwrap();
        assert!(ids.contains("e2"));
        assert!(!ids.contains("e1"));
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_set_liked() {
        let (db, _temp) = setup_test_db();
        db.upsert_history(&session("e1", 0, 1000)).unwrap();

        db.set_liked("e1", true).unwrap();
        assert!(db.get_history_item("e1").unwrap().unwrap().is_liked);

        db.set_liked("e1", false).unwrap();
        assert!(!db.get_history_item("e1").unwrap().unwrap().is_liked);
    }

    #[test]
    fn test_delete_history_item() {
        let (db, _temp) = setup_test_db();
        db.upsert_history(&session("e1", 0, 1000)).unwrap();
        db.delete_history_item("e1").unwrap();
        assert!(db.get_history_item("e1").unwrap().is_none());
    }

    #[test]
    fn test_get_missing_item() {
        let (db, _temp) = setup_test_db();
        assert!(db.get_history_item("nope").unwrap().is_none());
        assert!(db.get_last_played_session().unwrap().is_none());
    }
}

#[cfg(test)]
mod queue_tests {
    use crate::database::{Database, Episode, Podcast};
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    fn episode(id: &str) -> Episode {
        Episode::new(id, format!("Episode {}", id), format!("http://example.com/{}.mp3", id))
    }

    #[test]
    fn test_positions_strictly_increasing_no_gaps() {
        let (db, _temp) = setup_test_db();
        let podcast = Podcast::new("p1", "Test Show");

        for i in 0..5 {
            db.enqueue_item(&episode(&format!("e{}", i)), Some(&podcast))
                .unwrap();
        }

        let items = db.get_queue_items().unwrap();
        assert_eq!(items.len(), 5);
        let positions: Vec<i64> = items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_clear_resets_position_counter() {
        let (db, _temp) = setup_test_db();
        let podcast = Podcast::new("p1", "Test Show");

        db.enqueue_item(&episode("e1"), Some(&podcast)).unwrap();
        db.enqueue_item(&episode("e2"), Some(&podcast)).unwrap();
        db.clear_queue().unwrap();
        assert!(db.get_queue_items().unwrap().is_empty());

        let position = db.enqueue_item(&episode("e3"), Some(&podcast)).unwrap();
        assert_eq!(position, 1);
    }

    #[test]
    fn test_clear_empty_queue() {
        let (db, _temp) = setup_test_db();
        // Clearing before any insert must not error even though
        // sqlite_sequence doesn't exist yet
        db.clear_queue().unwrap();
    }

    #[test]
    fn test_denormalized_metadata() {
        let (db, _temp) = setup_test_db();
        let mut podcast = Podcast::new("p1", "Test Show");
        podcast.image_url = Some("http://example.com/show.jpg".to_string());

        db.enqueue_item(&episode("e1"), Some(&podcast)).unwrap();

        let items = db.get_queue_items().unwrap();
        assert_eq!(items[0].podcast_id, Some("p1".to_string()));
        assert_eq!(items[0].podcast_title, Some("Test Show".to_string()));
        // Episode art is absent, so the podcast art is used
        assert_eq!(items[0].image_url, Some("http://example.com/show.jpg".to_string()));
    }

    #[test]
    fn test_remove_queue_item() {
        let (db, _temp) = setup_test_db();
        let podcast = Podcast::new("p1", "Test Show");
        db.enqueue_item(&episode("e1"), Some(&podcast)).unwrap();
        db.enqueue_item(&episode("e2"), Some(&podcast)).unwrap();

        db.remove_queue_item("e1").unwrap();

        let items = db.get_queue_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].episode_id, "e2");
    }

    #[test]
    fn test_purge_completed_queue_items() {
        let (db, _temp) = setup_test_db();
        let podcast = Podcast::new("p1", "Test Show");
        db.enqueue_item(&episode("e1"), Some(&podcast)).unwrap();
        db.enqueue_item(&episode("e2"), Some(&podcast)).unwrap();

        let mut done = crate::database::PlaybackSession::from_snapshot(
            &episode("e1"),
            &podcast,
            0,
            1000,
            1,
        );
        done.is_completed = true;
        db.upsert_history(&done).unwrap();

        let purged = db.purge_completed_queue_items().unwrap();
        assert_eq!(purged, 1);
        assert_eq!(db.get_queue_items().unwrap().len(), 1);
    }

    #[test]
    fn test_queue_item_to_episode_roundtrip() {
        let (db, _temp) = setup_test_db();
        let podcast = Podcast::new("p1", "Test Show");
        let mut ep = episode("e1");
        ep.duration = 1800;
        ep.published_date = 1_700_000_000_000;
        db.enqueue_item(&ep, Some(&podcast)).unwrap();

        let restored = db.get_queue_items().unwrap()[0].to_episode();
        assert_eq!(restored.id, "e1");
        assert_eq!(restored.duration, 1800);
        assert_eq!(restored.published_date, 1_700_000_000_000);
    }
}

#[cfg(test)]
mod subscription_tests {
    use crate::database::{Database, Podcast};
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn test_add_and_list() {
        let (db, _temp) = setup_test_db();
        let mut podcast = Podcast::new("p1", "History Hour");
        podcast.genre = "History".to_string();
        db.add_subscription(&podcast, Some("http://example.com/feed.xml"))
            .unwrap();

        let subs = db.get_subscriptions().unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].genre, "History");
        assert_eq!(subs[0].feed_url, Some("http://example.com/feed.xml".to_string()));
    }

    #[test]
    fn test_resubscribe_replaces() {
        let (db, _temp) = setup_test_db();
        db.add_subscription(&Podcast::new("p1", "Old Title"), None)
            .unwrap();
        db.add_subscription(&Podcast::new("p1", "New Title"), None)
            .unwrap();

        let subs = db.get_subscriptions().unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].title, "New Title");
    }

    #[test]
    fn test_remove() {
        let (db, _temp) = setup_test_db();
        db.add_subscription(&Podcast::new("p1", "Show"), None).unwrap();
        db.remove_subscription("p1").unwrap();
        assert!(db.get_subscriptions().unwrap().is_empty());
    }

    #[test]
    fn test_default_genre() {
        let (db, _temp) = setup_test_db();
        db.add_subscription(&Podcast::new("p1", "Show"), None).unwrap();
        assert_eq!(db.get_subscriptions().unwrap()[0].genre, "Podcast");
    }
}

#[cfg(test)]
mod settings_tests {
    use crate::database::Database;
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn test_get_set() {
        let (db, _temp) = setup_test_db();
        assert!(db.get_setting("missing").unwrap().is_none());

        db.set_setting("episode_sort_order", "oldest").unwrap();
        assert_eq!(
            db.get_setting("episode_sort_order").unwrap(),
            Some("oldest".to_string())
        );
    }

    #[test]
    fn test_dismissed_flag() {
        let (db, _temp) = setup_test_db();
        assert!(!db.is_player_dismissed().unwrap());

        db.set_player_dismissed(true).unwrap();
        assert!(db.is_player_dismissed().unwrap());

        db.set_player_dismissed(false).unwrap();
        assert!(!db.is_player_dismissed().unwrap());
    }
}
