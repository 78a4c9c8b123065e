pub mod catalog;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod player;
pub mod queue;

use catalog::{Catalog, HttpCatalog};
use config::Config;
use database::{Database, Episode};
use engine::{EngineEventReceiver, PlaybackEngine};
use error::AppError;
use player::PlaybackSessionManager;
use queue::{smart::SmartQueueEngine, QueueManager};
use std::collections::HashMap;
use std::sync::Arc;

/// Initialize logging. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Wires the player core together: durable store, catalog client, playback
/// session manager and queue manager. The app shell constructs one of these
/// at startup, connects the platform engine bridge, and hands the pieces to
/// its UI layer.
pub struct PlayerRuntime {
    pub db: Arc<Database>,
    pub catalog: Arc<dyn Catalog>,
    pub session: Arc<PlaybackSessionManager>,
    pub queue: QueueManager,
}

impl PlayerRuntime {
    pub fn new(config: Config) -> Result<Self, AppError> {
        std::fs::create_dir_all(&config.data_dir).ok();
        let db_path = config.data_dir.join("earshot.db");
        let db = Arc::new(Database::new(&db_path)?);

        // Startup cleanup: drop stale mirror rows for episodes finished in a
        // previous run.
        match db.purge_completed_queue_items() {
            Ok(count) if count > 0 => {
                log::info!("Startup cleanup: removed {} completed episodes from queue", count)
            }
            Ok(_) => {}
            Err(e) => log::warn!("Failed to purge completed queue items: {}", e),
        }

        let catalog: Arc<dyn Catalog> = Arc::new(HttpCatalog::new(config.catalog.api_base.clone()));
        let session = PlaybackSessionManager::new(db.clone());
        let smart = SmartQueueEngine::new(db.clone(), catalog.clone(), config.catalog.region);
        let queue = QueueManager::new(db.clone(), session.clone(), smart);

        log::info!("Earshot player core initialized");

        Ok(Self {
            db,
            catalog,
            session,
            queue,
        })
    }

    /// Connect the platform's engine bridge. Also reconciles state against
    /// whatever the engine currently holds.
    pub fn connect_engine(&self, engine: Arc<dyn PlaybackEngine>, events: EngineEventReceiver) {
        self.session.attach_engine(engine, events);
    }

    /// Cold-start hydration of the last session, without starting playback.
    pub fn restore_last_session(&self) {
        self.session.restore_last_session();
    }

    /// Latest episode per subscribed show, for "new episodes" surfaces.
    pub async fn sync_new_episodes(&self) -> HashMap<String, Episode> {
        let ids: Vec<String> = match self.db.get_subscriptions() {
            Ok(subs) => subs.into_iter().map(|s| s.podcast_id).collect(),
            Err(e) => {
                log::warn!("Subscription lookup failed: {}", e);
                return HashMap::new();
            }
        };
        self.catalog.sync_subscriptions(&ids).await
    }
}
