use tokio::sync::watch;
use tracing::debug;

/// The one video currently playing across the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub event_id: String,
    pub video_index: usize,
}

/// Owns the "currently playing" slot. Starting a video replaces whatever was
/// playing; every subscriber sees the change and can stop its own player.
pub struct PlaybackController {
    sender: watch::Sender<Option<NowPlaying>>,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackController {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<NowPlaying>> {
        self.sender.subscribe()
    }

    pub fn play(&self, event_id: &str, video_index: usize) {
        let next = NowPlaying {
            event_id: event_id.to_string(),
            video_index,
        };
        debug!(event_id, video_index, "playback started");
        self.sender.send_if_modified(|slot| {
            if slot.as_ref() == Some(&next) {
                return false;
            }
            *slot = Some(next);
            true
        });
    }

    /// Clears the slot only if `event_id` is the one playing.
    pub fn stop(&self, event_id: &str) {
        self.sender.send_if_modified(|slot| match slot {
            Some(playing) if playing.event_id == event_id => {
                *slot = None;
                true
            }
            _ => false,
        });
    }

    pub fn current(&self) -> Option<NowPlaying> {
        self.sender.borrow().clone()
    }
}
