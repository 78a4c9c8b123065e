#[cfg(test)]
pub mod mock;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One entry in the engine's live queue: the uri plus the display metadata
/// the platform media session renders (lock screen, notification).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub episode_id: String,
    pub audio_url: String,
    pub title: String,
    pub artist: Option<String>,
    pub artwork_url: Option<String>,
}

/// Engine-reported transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Closed set of engine callbacks, delivered in order over a single channel
/// into the session manager's event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(TransportState),
    IsPlayingChanged(bool),
    /// The engine advanced itself within its live queue (gapless
    /// transition); carries the new item index.
    MediaItemTransition(usize),
}

/// Sender half handed to whatever drives the real engine bridge.
pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
/// Receiver half consumed by the session manager.
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Create the event channel wiring an engine bridge to the session manager.
pub fn event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// Transport surface of the out-of-process media engine.
///
/// Commands are fire-and-forget and property reads return the bridge's
/// latest cached values, mirroring the platform media-controller model. The
/// engine is ground truth for transport status; the application state built
/// on top is a cache that reconciles against it.
pub trait PlaybackEngine: Send + Sync {
    /// Replace the live queue with a single item, positioned at
    /// `start_position_ms`. The start position is part of the load itself,
    /// never a separate seek afterwards.
    fn set_media_item(&self, item: MediaItem, start_position_ms: i64);

    /// Append an item to the live queue.
    fn add_media_item(&self, item: MediaItem);

    fn prepare(&self);
    fn play(&self);
    fn pause(&self);
    fn seek_to(&self, position_ms: i64);
    /// Jump to an item already in the live queue.
    fn seek_to_item(&self, index: usize);
    fn set_playback_speed(&self, speed: f32);
    fn stop(&self);
    fn clear_media_items(&self);

    fn is_playing(&self) -> bool;
    fn position_ms(&self) -> i64;
    fn buffered_position_ms(&self) -> i64;
    fn duration_ms(&self) -> i64;
    fn media_item_count(&self) -> usize;
    fn current_item_index(&self) -> usize;
    fn current_media_item(&self) -> Option<MediaItem>;
}
