use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Legal playback-speed range shared by audio and video tracks.
pub const SPEED_RANGE: (f64, f64) = (0.5, 2.0);

pub fn clamp_volume(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

pub fn clamp_speed(v: f64) -> f64 {
    v.clamp(SPEED_RANGE.0, SPEED_RANGE.1)
}

pub fn clamp_pan(v: f64) -> f64 {
    v.clamp(-1.0, 1.0)
}

pub fn clamp_opacity(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Identifier of a track within one session. Unique per session.
pub type TrackId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
    Image,
}

/// One timed media element on the shared timeline.
///
/// Closed tagged union discriminated by `type`; every consumer matches
/// exhaustively. Base fields (`id`, `name`, `locked`, `hidden`, `start`,
/// `duration`, `layer`) are repeated per variant so each track record stays a
/// flat, self-contained wire object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Track {
    Audio(AudioTrack),
    Video(VideoTrack),
    Image(ImageTrack),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub id: TrackId,
    pub name: String,
    pub locked: bool,
    pub hidden: bool,
    /// Timeline offset in seconds, >= 0.
    pub start: f64,
    /// Clip length in seconds, > 0.
    pub duration: f64,
    pub layer: i32,
    pub url: String,
    /// 0..=1.
    pub volume: f64,
    /// 0.5..=2.0.
    pub speed: f64,
    /// -1..=1.
    pub pan: f64,
    pub muted: bool,
    pub solo: bool,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoTrack {
    pub id: TrackId,
    pub name: String,
    pub locked: bool,
    pub hidden: bool,
    pub start: f64,
    pub duration: f64,
    pub layer: i32,
    pub url: String,
    pub volume: f64,
    pub muted: bool,
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(flatten)]
    pub visual: VisualProperties,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageTrack {
    pub id: TrackId,
    pub name: String,
    pub locked: bool,
    pub hidden: bool,
    pub start: f64,
    pub duration: f64,
    pub layer: i32,
    pub url: String,
    #[serde(flatten)]
    pub visual: VisualProperties,
}

/// One property change applied to a track by id.
///
/// Edits that do not apply to the target's kind (pan on a video, opacity on
/// an audio track) are no-ops. Ranged numerics are clamped on application.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackEdit {
    Name(String),
    Locked(bool),
    Hidden(bool),
    Start(f64),
    Layer(i32),
    /// The only edit that forces a player reload downstream.
    Url(String),
    Volume(f64),
    Speed(f64),
    Pan(f64),
    Muted(bool),
    Solo(bool),
    Color(String),
    Opacity(f64),
    Position { x: f64, y: f64 },
    Size { width: f64, height: f64 },
    Scale(f64),
    ZIndex(i32),
    Highlight(bool),
}

/// Stage placement for video/image tracks.
///
/// `x`/`y`/`width`/`height` are percentages of the stage. `highlight` is
/// transient selection state: it is skipped by serde and excluded from
/// equality, so toggling it never persists and never opens a history entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VisualProperties {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    /// 0..=1.
    pub opacity: f64,
    pub z_index: i32,
    #[serde(skip)]
    pub highlight: bool,
}

impl Default for VisualProperties {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            scale: 1.0,
            opacity: 1.0,
            z_index: 0,
            highlight: false,
        }
    }
}

impl PartialEq for VisualProperties {
    fn eq(&self, other: &Self) -> bool {
        // `highlight` intentionally ignored.
        self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
            && self.scale == other.scale
            && self.opacity == other.opacity
            && self.z_index == other.z_index
    }
}

impl Track {
    pub fn kind(&self) -> TrackKind {
        match self {
            Track::Audio(_) => TrackKind::Audio,
            Track::Video(_) => TrackKind::Video,
            Track::Image(_) => TrackKind::Image,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Track::Audio(t) => &t.id,
            Track::Video(t) => &t.id,
            Track::Image(t) => &t.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: TrackId) {
        match self {
            Track::Audio(t) => t.id = id,
            Track::Video(t) => t.id = id,
            Track::Image(t) => t.id = id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Track::Audio(t) => &t.name,
            Track::Video(t) => &t.name,
            Track::Image(t) => &t.name,
        }
    }

    pub fn set_name(&mut self, name: String) {
        match self {
            Track::Audio(t) => t.name = name,
            Track::Video(t) => t.name = name,
            Track::Image(t) => t.name = name,
        }
    }

    pub fn locked(&self) -> bool {
        match self {
            Track::Audio(t) => t.locked,
            Track::Video(t) => t.locked,
            Track::Image(t) => t.locked,
        }
    }

    pub fn set_locked(&mut self, locked: bool) {
        match self {
            Track::Audio(t) => t.locked = locked,
            Track::Video(t) => t.locked = locked,
            Track::Image(t) => t.locked = locked,
        }
    }

    pub fn hidden(&self) -> bool {
        match self {
            Track::Audio(t) => t.hidden,
            Track::Video(t) => t.hidden,
            Track::Image(t) => t.hidden,
        }
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        match self {
            Track::Audio(t) => t.hidden = hidden,
            Track::Video(t) => t.hidden = hidden,
            Track::Image(t) => t.hidden = hidden,
        }
    }

    /// Timeline offset in seconds.
    pub fn start(&self) -> f64 {
        match self {
            Track::Audio(t) => t.start,
            Track::Video(t) => t.start,
            Track::Image(t) => t.start,
        }
    }

    pub fn set_start(&mut self, start: f64) {
        let start = start.max(0.0);
        match self {
            Track::Audio(t) => t.start = start,
            Track::Video(t) => t.start = start,
            Track::Image(t) => t.start = start,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            Track::Audio(t) => t.duration,
            Track::Video(t) => t.duration,
            Track::Image(t) => t.duration,
        }
    }

    /// Exclusive end of the track's timeline window.
    pub fn end(&self) -> f64 {
        self.start() + self.duration()
    }

    /// Whether `time` falls inside `[start, start + duration)`.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start() && time < self.end()
    }

    pub fn layer(&self) -> i32 {
        match self {
            Track::Audio(t) => t.layer,
            Track::Video(t) => t.layer,
            Track::Image(t) => t.layer,
        }
    }

    pub fn set_layer(&mut self, layer: i32) {
        match self {
            Track::Audio(t) => t.layer = layer,
            Track::Video(t) => t.layer = layer,
            Track::Image(t) => t.layer = layer,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Track::Audio(t) => &t.url,
            Track::Video(t) => &t.url,
            Track::Image(t) => &t.url,
        }
    }

    /// Audio-capable tracks participate in the audible mix.
    pub fn is_audio_capable(&self) -> bool {
        matches!(self, Track::Audio(_) | Track::Video(_))
    }

    /// Image tracks carry no mute flag and report `false`.
    pub fn muted(&self) -> bool {
        match self {
            Track::Audio(t) => t.muted,
            Track::Video(t) => t.muted,
            Track::Image(_) => false,
        }
    }

    /// Only audio tracks expose a solo flag.
    pub fn solo(&self) -> bool {
        match self {
            Track::Audio(t) => t.solo,
            Track::Video(_) | Track::Image(_) => false,
        }
    }

    pub fn volume(&self) -> f64 {
        match self {
            Track::Audio(t) => t.volume,
            Track::Video(t) => t.volume,
            Track::Image(_) => 0.0,
        }
    }

    pub fn speed(&self) -> f64 {
        match self {
            Track::Audio(t) => t.speed,
            Track::Video(t) => t.speed,
            Track::Image(_) => 1.0,
        }
    }

    pub fn visual(&self) -> Option<&VisualProperties> {
        match self {
            Track::Audio(_) => None,
            Track::Video(t) => Some(&t.visual),
            Track::Image(t) => Some(&t.visual),
        }
    }

    pub fn visual_mut(&mut self) -> Option<&mut VisualProperties> {
        match self {
            Track::Audio(_) => None,
            Track::Video(t) => Some(&mut t.visual),
            Track::Image(t) => Some(&mut t.visual),
        }
    }

    /// Range violations on placement are rejected (unlike ranged properties,
    /// which are clamped by [`Track::sanitize`]).
    pub fn validate(&self) -> EngineResult<()> {
        if !self.start().is_finite() || self.start() < 0.0 {
            return Err(EngineError::validation(format!(
                "track '{}' start must be finite and >= 0",
                self.name()
            )));
        }
        if !self.duration().is_finite() || self.duration() <= 0.0 {
            return Err(EngineError::validation(format!(
                "track '{}' duration must be finite and > 0",
                self.name()
            )));
        }
        Ok(())
    }

    /// Clamp every ranged property to its legal bounds. Out-of-range values
    /// are repaired, never rejected.
    pub fn sanitize(&mut self) {
        match self {
            Track::Audio(t) => {
                t.volume = clamp_volume(t.volume);
                t.speed = clamp_speed(t.speed);
                t.pan = clamp_pan(t.pan);
            }
            Track::Video(t) => {
                t.volume = clamp_volume(t.volume);
                t.speed = clamp_speed(t.speed);
                t.visual.opacity = clamp_opacity(t.visual.opacity);
            }
            Track::Image(t) => {
                t.visual.opacity = clamp_opacity(t.visual.opacity);
            }
        }
    }
}

impl AudioTrack {
    /// New audio track with neutral mix settings, placed at `start`.
    pub fn new(name: impl Into<String>, url: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            locked: false,
            hidden: false,
            start,
            duration,
            layer: 0,
            url: url.into(),
            volume: 1.0,
            speed: 1.0,
            pan: 0.0,
            muted: false,
            solo: false,
            color: "cyan".to_string(),
        }
    }
}

impl VideoTrack {
    pub fn new(name: impl Into<String>, url: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            locked: false,
            hidden: false,
            start,
            duration,
            layer: 0,
            url: url.into(),
            volume: 1.0,
            muted: false,
            speed: 1.0,
            thumbnail: None,
            visual: VisualProperties::default(),
        }
    }
}

impl ImageTrack {
    pub fn new(name: impl Into<String>, url: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            locked: false,
            hidden: false,
            start,
            duration,
            layer: 0,
            url: url.into(),
            visual: VisualProperties::default(),
        }
    }
}
