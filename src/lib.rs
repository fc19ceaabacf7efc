//! Timeline session engine for multitrack studio sessions.
//!
//! Coordinates heterogeneous media tracks (audio, video, image) along one
//! shared time axis: a [`Session`] registry of tracks, snapshot-based
//! undo/redo through [`History`], a [`PlaybackCoordinator`] that keeps
//! independently-loaded players phase-locked to one authoritative playhead,
//! and a pure [`draw_list`] resolver for visual layering.
//!
//! The engine never touches media bytes. All platform playback goes through
//! the [`MediaHost`] trait; urls are opaque strings handed to the host.

#![forbid(unsafe_code)]

pub mod compose;
pub mod error;
pub mod history;
pub mod model;
pub mod playback;
pub mod player;
pub mod session;

pub use compose::{DrawNode, draw_list};
pub use error::{EngineError, EngineResult};
pub use history::{History, HistoryOpts};
pub use model::{
    AudioTrack, ImageTrack, Track, TrackEdit, TrackId, TrackKind, VideoTrack, VisualProperties,
};
pub use playback::{CoordinatorOpts, PlaybackCoordinator};
pub use player::{MediaHost, PlayerEvent, PlayerState, TrackPlayer};
pub use session::{Session, Transport};
