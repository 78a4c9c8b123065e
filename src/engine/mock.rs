//! Scriptable in-memory engine used by the player and queue tests.

use super::{MediaItem, PlaybackEngine};
use std::sync::Mutex;

/// Recorded transport commands, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetMediaItem(MediaItem, i64),
    AddMediaItem(MediaItem),
    Prepare,
    Play,
    Pause,
    SeekTo(i64),
    SeekToItem(usize),
    SetPlaybackSpeed(f32),
    Stop,
    ClearMediaItems,
}

#[derive(Debug, Default)]
struct MockEngineState {
    calls: Vec<EngineCall>,
    items: Vec<MediaItem>,
    current_index: usize,
    is_playing: bool,
    position_ms: i64,
    buffered_position_ms: i64,
    duration_ms: i64,
}

/// In-memory engine double. Property reads reflect the scripted transport
/// state; every command is recorded for assertions.
#[derive(Debug, Default)]
pub struct MockEngine {
    state: Mutex<MockEngineState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn set_media_item_calls(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::SetMediaItem(_, _)))
            .count()
    }

    /// Script the transport values the bridge would report.
    pub fn script_transport(&self, is_playing: bool, position_ms: i64, duration_ms: i64) {
        let mut state = self.state.lock().unwrap();
        state.is_playing = is_playing;
        state.position_ms = position_ms;
        state.duration_ms = duration_ms;
        state.buffered_position_ms = position_ms;
    }
}

impl PlaybackEngine for MockEngine {
    fn set_media_item(&self, item: MediaItem, start_position_ms: i64) {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(EngineCall::SetMediaItem(item.clone(), start_position_ms));
        state.items = vec![item];
        state.current_index = 0;
        state.position_ms = start_position_ms;
    }

    fn add_media_item(&self, item: MediaItem) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::AddMediaItem(item.clone()));
        state.items.push(item);
    }

    fn prepare(&self) {
        self.state.lock().unwrap().calls.push(EngineCall::Prepare);
    }

    fn play(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::Play);
        state.is_playing = true;
    }

    fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::Pause);
        state.is_playing = false;
    }

    fn seek_to(&self, position_ms: i64) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::SeekTo(position_ms));
        state.position_ms = position_ms;
    }

    fn seek_to_item(&self, index: usize) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::SeekToItem(index));
        state.current_index = index;
        state.position_ms = 0;
    }

    fn set_playback_speed(&self, speed: f32) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(EngineCall::SetPlaybackSpeed(speed));
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::Stop);
        state.is_playing = false;
    }

    fn clear_media_items(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::ClearMediaItems);
        state.items.clear();
        state.current_index = 0;
        state.position_ms = 0;
        state.duration_ms = 0;
    }

    fn is_playing(&self) -> bool {
        self.state.lock().unwrap().is_playing
    }

    fn position_ms(&self) -> i64 {
        self.state.lock().unwrap().position_ms
    }

    fn buffered_position_ms(&self) -> i64 {
        self.state.lock().unwrap().buffered_position_ms
    }

    fn duration_ms(&self) -> i64 {
        self.state.lock().unwrap().duration_ms
    }

    fn media_item_count(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    fn current_item_index(&self) -> usize {
        self.state.lock().unwrap().current_index
    }

    fn current_media_item(&self) -> Option<MediaItem> {
        let state = self.state.lock().unwrap();
        state.items.get(state.current_index).cloned()
    }
}
