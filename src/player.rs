use serde::Serialize;

use crate::model::{TrackId, clamp_pan, clamp_speed, clamp_volume};

/// Lifecycle of one playback resource.
///
/// `Error` is terminal for the instance; recovery is a fresh player with a
/// new generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Unloaded,
    Loading,
    Ready,
    Error,
}

/// Completion signal from the host media stack.
///
/// Every event carries the generation stamped on the load that caused it, so
/// a late completion from a torn-down or superseded player can be recognized
/// and discarded.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    Ready {
        track_id: TrackId,
        generation: u64,
        /// Total media duration reported by the host, in seconds.
        duration: f64,
    },
    Progress {
        track_id: TrackId,
        generation: u64,
        /// Local media time, in seconds.
        time: f64,
    },
    Failed {
        track_id: TrackId,
        generation: u64,
        message: String,
    },
}

impl PlayerEvent {
    pub fn track_id(&self) -> &str {
        match self {
            PlayerEvent::Ready { track_id, .. }
            | PlayerEvent::Progress { track_id, .. }
            | PlayerEvent::Failed { track_id, .. } => track_id,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            PlayerEvent::Ready { generation, .. }
            | PlayerEvent::Progress { generation, .. }
            | PlayerEvent::Failed { generation, .. } => *generation,
        }
    }
}

/// Seam to the host platform's media stack.
///
/// Every method is non-blocking by contract: `load` starts an asynchronous
/// fetch/decode whose outcome arrives later as a [`PlayerEvent`], and the
/// transport methods are fire-and-forget commands. The engine never touches
/// media bytes; urls are opaque to it.
pub trait MediaHost {
    fn load(&mut self, track_id: &str, generation: u64, url: &str);
    fn unload(&mut self, track_id: &str);
    fn play(&mut self, track_id: &str);
    fn pause(&mut self, track_id: &str);
    /// Seek to a local media time in seconds.
    fn seek(&mut self, track_id: &str, local: f64);
    fn set_volume(&mut self, track_id: &str, volume: f64);
    fn set_speed(&mut self, track_id: &str, speed: f64);
    fn set_pan(&mut self, track_id: &str, pan: f64);
    fn set_muted(&mut self, track_id: &str, muted: bool);
}

/// One playback resource bound to one track.
///
/// A url change requires a fresh player (teardown + re-create under a new
/// generation); every other property mutates the live instance through the
/// clamped setters.
#[derive(Debug)]
pub struct TrackPlayer {
    track_id: TrackId,
    url: String,
    generation: u64,
    state: PlayerState,
    duration: Option<f64>,
    /// Last local media time reported by the host.
    position: f64,
    /// Host failure message, kept for the per-track fault surface.
    error: Option<String>,
    released: bool,
}

impl TrackPlayer {
    /// Create and immediately start the asynchronous load under `generation`.
    pub fn load(host: &mut dyn MediaHost, track_id: TrackId, url: String, generation: u64) -> Self {
        tracing::debug!(track = %track_id, generation, "player load");
        host.load(&track_id, generation, &url);
        Self {
            track_id,
            url,
            generation,
            state: PlayerState::Loading,
            duration: None,
            position: 0.0,
            error: None,
            released: false,
        }
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == PlayerState::Ready
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Whether an event stamped `generation` belongs to this live instance.
    /// Events from earlier generations or arriving after release are stale.
    pub fn accepts(&self, generation: u64) -> bool {
        !self.released && generation == self.generation
    }

    pub fn on_ready(&mut self, duration: f64) {
        if self.state == PlayerState::Loading {
            self.state = PlayerState::Ready;
            self.duration = Some(duration);
            tracing::debug!(track = %self.track_id, duration, "player ready");
        }
    }

    pub fn on_progress(&mut self, time: f64) {
        if self.state == PlayerState::Ready {
            self.position = time;
        }
    }

    pub fn on_failed(&mut self, message: &str) {
        self.state = PlayerState::Error;
        self.error = Some(message.to_string());
        tracing::warn!(track = %self.track_id, message, "player failed");
    }

    /// The host's failure message, once the player has entered `Error`.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn play(&self, host: &mut dyn MediaHost) {
        if !self.released {
            host.play(&self.track_id);
        }
    }

    pub fn pause(&self, host: &mut dyn MediaHost) {
        if !self.released {
            host.pause(&self.track_id);
        }
    }

    /// Seek to a local time, clamped to `[0, duration]` once the duration is
    /// known.
    pub fn seek(&mut self, host: &mut dyn MediaHost, local: f64) {
        if self.released {
            return;
        }
        let mut local = local.max(0.0);
        if let Some(d) = self.duration {
            local = local.min(d);
        }
        self.position = local;
        host.seek(&self.track_id, local);
    }

    pub fn set_volume(&self, host: &mut dyn MediaHost, volume: f64) {
        if !self.released {
            host.set_volume(&self.track_id, clamp_volume(volume));
        }
    }

    pub fn set_speed(&self, host: &mut dyn MediaHost, speed: f64) {
        if !self.released {
            host.set_speed(&self.track_id, clamp_speed(speed));
        }
    }

    pub fn set_pan(&self, host: &mut dyn MediaHost, pan: f64) {
        if !self.released {
            host.set_pan(&self.track_id, clamp_pan(pan));
        }
    }

    pub fn set_muted(&self, host: &mut dyn MediaHost, muted: bool) {
        if !self.released {
            host.set_muted(&self.track_id, muted);
        }
    }

    /// Tear down the host resource. Idempotent: repeated calls are no-ops.
    /// Bumps the generation so any in-flight completion becomes stale.
    pub fn release(&mut self, host: &mut dyn MediaHost) {
        if self.released {
            return;
        }
        self.released = true;
        self.generation += 1;
        self.state = PlayerState::Unloaded;
        host.unload(&self.track_id);
        tracing::debug!(track = %self.track_id, "player released");
    }
}
