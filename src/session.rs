use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::model::{
    Track, TrackEdit, TrackId, clamp_opacity, clamp_pan, clamp_speed, clamp_volume,
};

/// Global transport state. The [`PlaybackCoordinator`](crate::PlaybackCoordinator)
/// owns the live value; the copy on [`Session`] is the persisted snapshot it is
/// seeded from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
}

/// The complete ordered set of tracks plus playhead/transport state.
///
/// The Session is the unit of persistence and undo/redo. Vec order is
/// insertion order and serves as the tie-break for equal `layer`/`z_index`.
/// All mutation is expected to go through
/// [`History::set_state_with`](crate::History::set_state_with) on a cloned
/// present, so readers never observe a partially-updated registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    tracks: Vec<Track>,
    pub playhead: f64,
    pub transport: Transport,
    next_track_id: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            playhead: 0.0,
            transport: Transport::Idle,
            next_track_id: 1,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id() == id)
    }

    /// Validate placement, clamp ranged properties, assign a fresh unique id
    /// and append. Returns the assigned id.
    pub fn add_track(&mut self, mut track: Track) -> EngineResult<TrackId> {
        track.validate()?;
        track.sanitize();

        let id = format!("track-{}", self.next_track_id);
        self.next_track_id += 1;
        track.set_id(id.clone());

        tracing::debug!(id = %id, kind = ?track.kind(), "track added");
        self.tracks.push(track);
        Ok(id)
    }

    /// Remove by id. Absence is a no-op, not an error.
    pub fn remove_track(&mut self, id: &str) -> bool {
        match self.index_of(id) {
            Some(idx) => {
                self.tracks.remove(idx);
                tracing::debug!(id, "track removed");
                true
            }
            None => false,
        }
    }

    /// Apply one property edit. Ranged numerics are clamped, never rejected.
    /// Returns false when the track is missing or the edit does not apply to
    /// its kind.
    pub fn edit_track(&mut self, id: &str, edit: TrackEdit) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        apply_edit(&mut self.tracks[idx], edit)
    }

    /// Copy a track directly after its source, with a fresh id, a " (copy)"
    /// name suffix, and the start offset by one second.
    pub fn duplicate_track(&mut self, id: &str) -> Option<TrackId> {
        let idx = self.index_of(id)?;
        let mut copy = self.tracks[idx].clone();

        let new_id = format!("track-{}", self.next_track_id);
        self.next_track_id += 1;
        copy.set_id(new_id.clone());
        copy.set_name(format!("{} (copy)", copy.name()));
        copy.set_start(copy.start() + 1.0);
        if let Some(v) = copy.visual_mut() {
            v.highlight = false;
        }

        self.tracks.insert(idx + 1, copy);
        tracing::debug!(source = id, id = %new_id, "track duplicated");
        Some(new_id)
    }

    /// Swap with the previous track and renumber layers. No-op at the top.
    pub fn move_track_up(&mut self, id: &str) -> bool {
        match self.index_of(id) {
            Some(idx) if idx > 0 => {
                self.tracks.swap(idx - 1, idx);
                self.renumber_layers();
                true
            }
            _ => false,
        }
    }

    /// Swap with the next track and renumber layers. No-op at the bottom.
    pub fn move_track_down(&mut self, id: &str) -> bool {
        match self.index_of(id) {
            Some(idx) if idx + 1 < self.tracks.len() => {
                self.tracks.swap(idx, idx + 1);
                self.renumber_layers();
                true
            }
            _ => false,
        }
    }

    /// Stable reassignment of `layer` (and `z_index` for visual tracks) from
    /// the current vec order.
    pub fn renumber_layers(&mut self) {
        for (i, track) in self.tracks.iter_mut().enumerate() {
            track.set_layer(i as i32);
            if let Some(v) = track.visual_mut() {
                v.z_index = i as i32;
            }
        }
    }

    /// Whether any audio track is soloed.
    pub fn any_solo(&self) -> bool {
        self.tracks.iter().any(|t| t.solo())
    }

    /// Mute/solo resolution: while any track is soloed, only soloed tracks
    /// are audible regardless of their own mute flag; otherwise audibility is
    /// simply `!muted`. Image and hidden tracks are never audible.
    pub fn is_audible(&self, id: &str) -> bool {
        let Some(track) = self.track(id) else {
            return false;
        };
        if !track.is_audio_capable() || track.hidden() {
            return false;
        }
        if self.any_solo() {
            track.solo()
        } else {
            !track.muted()
        }
    }

    /// Exclusive end of the last track window, 0 for an empty session.
    pub fn timeline_end(&self) -> f64 {
        self.tracks.iter().map(Track::end).fold(0.0, f64::max)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.playhead.is_finite() || self.playhead < 0.0 {
            return Err(EngineError::validation(
                "playhead must be finite and >= 0",
            ));
        }
        for (i, track) in self.tracks.iter().enumerate() {
            track.validate()?;
            if self.tracks[..i].iter().any(|t| t.id() == track.id()) {
                return Err(EngineError::validation(format!(
                    "duplicate track id '{}'",
                    track.id()
                )));
            }
        }
        Ok(())
    }

    /// Serialize for the persistence boundary. Storage treats the result as
    /// opaque.
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::serde(e.to_string()))
    }

    /// Reconstruct from the persistence boundary, re-validating invariants.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let session: Session =
            serde_json::from_str(json).map_err(|e| EngineError::serde(e.to_string()))?;
        session.validate()?;
        Ok(session)
    }
}

fn apply_edit(track: &mut Track, edit: TrackEdit) -> bool {
    use crate::model::Track::*;
    match edit {
        TrackEdit::Name(name) => {
            track.set_name(name);
            true
        }
        TrackEdit::Locked(locked) => {
            track.set_locked(locked);
            true
        }
        TrackEdit::Hidden(hidden) => {
            track.set_hidden(hidden);
            true
        }
        TrackEdit::Start(start) => {
            if !start.is_finite() {
                return false;
            }
            track.set_start(start);
            true
        }
        TrackEdit::Layer(layer) => {
            track.set_layer(layer);
            true
        }
        TrackEdit::Url(url) => match track {
            Audio(t) => {
                t.url = url;
                true
            }
            Video(t) => {
                t.url = url;
                true
            }
            Image(t) => {
                t.url = url;
                true
            }
        },
        TrackEdit::Volume(v) => match track {
            Audio(t) => {
                t.volume = clamp_volume(v);
                true
            }
            Video(t) => {
                t.volume = clamp_volume(v);
                true
            }
            Image(_) => false,
        },
        TrackEdit::Speed(v) => match track {
            Audio(t) => {
                t.speed = clamp_speed(v);
                true
            }
            Video(t) => {
                t.speed = clamp_speed(v);
                true
            }
            Image(_) => false,
        },
        TrackEdit::Pan(v) => match track {
            Audio(t) => {
                t.pan = clamp_pan(v);
                true
            }
            Video(_) | Image(_) => false,
        },
        TrackEdit::Muted(m) => match track {
            Audio(t) => {
                t.muted = m;
                true
            }
            Video(t) => {
                t.muted = m;
                true
            }
            Image(_) => false,
        },
        TrackEdit::Solo(s) => match track {
            Audio(t) => {
                t.solo = s;
                true
            }
            Video(_) | Image(_) => false,
        },
        TrackEdit::Color(c) => match track {
            Audio(t) => {
                t.color = c;
                true
            }
            Video(_) | Image(_) => false,
        },
        TrackEdit::Opacity(v) => match track.visual_mut() {
            Some(visual) => {
                visual.opacity = clamp_opacity(v);
                true
            }
            None => false,
        },
        TrackEdit::Position { x, y } => match track.visual_mut() {
            Some(visual) => {
                visual.x = x;
                visual.y = y;
                true
            }
            None => false,
        },
        TrackEdit::Size { width, height } => match track.visual_mut() {
            Some(visual) => {
                visual.width = width;
                visual.height = height;
                true
            }
            None => false,
        },
        TrackEdit::Scale(s) => match track.visual_mut() {
            Some(visual) => {
                visual.scale = s;
                true
            }
            None => false,
        },
        TrackEdit::ZIndex(z) => match track.visual_mut() {
            Some(visual) => {
                visual.z_index = z;
                true
            }
            None => false,
        },
        TrackEdit::Highlight(h) => match track.visual_mut() {
            Some(visual) => {
                visual.highlight = h;
                true
            }
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AudioTrack, ImageTrack, VideoTrack};

    fn session_with(tracks: Vec<Track>) -> Session {
        let mut s = Session::new();
        for t in tracks {
            s.add_track(t).unwrap();
        }
        s
    }

    #[test]
    fn add_assigns_fresh_unique_ids() {
        let mut s = Session::new();
        let a = s
            .add_track(Track::Audio(AudioTrack::new("a", "u", 0.0, 5.0)))
            .unwrap();
        let b = s
            .add_track(Track::Audio(AudioTrack::new("b", "u", 0.0, 5.0)))
            .unwrap();
        assert_ne!(a, b);
        assert!(s.track(&a).is_some());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn add_rejects_bad_placement_but_clamps_ranges() {
        let mut s = Session::new();
        assert!(
            s.add_track(Track::Audio(AudioTrack::new("a", "u", -1.0, 5.0)))
                .is_err()
        );

        let mut loud = AudioTrack::new("a", "u", 0.0, 5.0);
        loud.volume = 9.0;
        let id = s.add_track(Track::Audio(loud)).unwrap();
        assert_eq!(s.track(&id).unwrap().volume(), 1.0);
    }

    #[test]
    fn ids_survive_removal_without_reuse() {
        let mut s = Session::new();
        let a = s
            .add_track(Track::Audio(AudioTrack::new("a", "u", 0.0, 5.0)))
            .unwrap();
        s.remove_track(&a);
        let b = s
            .add_track(Track::Audio(AudioTrack::new("b", "u", 0.0, 5.0)))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut s = Session::new();
        assert!(!s.remove_track("track-99"));
    }

    #[test]
    fn edit_clamps_out_of_range_values() {
        let mut s = session_with(vec![Track::Audio(AudioTrack::new("a", "u", 0.0, 5.0))]);
        let id = s.tracks()[0].id().to_string();

        assert!(s.edit_track(&id, TrackEdit::Volume(2.5)));
        assert!(s.edit_track(&id, TrackEdit::Speed(7.0)));
        assert!(s.edit_track(&id, TrackEdit::Pan(-3.0)));

        let t = s.track(&id).unwrap();
        assert_eq!(t.volume(), 1.0);
        assert_eq!(t.speed(), 2.0);
        let Track::Audio(a) = t else { unreachable!() };
        assert_eq!(a.pan, -1.0);
    }

    #[test]
    fn edit_wrong_kind_is_noop() {
        let mut s = session_with(vec![Track::Image(ImageTrack::new("i", "u", 0.0, 5.0))]);
        let id = s.tracks()[0].id().to_string();
        assert!(!s.edit_track(&id, TrackEdit::Pan(0.5)));
        assert!(!s.edit_track(&id, TrackEdit::Solo(true)));
        assert!(s.edit_track(&id, TrackEdit::Opacity(0.5)));
    }

    #[test]
    fn duplicate_inserts_after_source() {
        let mut s = session_with(vec![
            Track::Audio(AudioTrack::new("a", "u", 2.0, 5.0)),
            Track::Audio(AudioTrack::new("b", "u", 0.0, 5.0)),
        ]);
        let src = s.tracks()[0].id().to_string();

        let copy = s.duplicate_track(&src).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.tracks()[1].id(), copy);
        assert_eq!(s.tracks()[1].name(), "a (copy)");
        assert_eq!(s.tracks()[1].start(), 3.0);
    }

    #[test]
    fn move_up_down_renumbers_layers() {
        let mut s = session_with(vec![
            Track::Video(VideoTrack::new("v0", "u", 0.0, 5.0)),
            Track::Video(VideoTrack::new("v1", "u", 0.0, 5.0)),
        ]);
        s.renumber_layers();
        let bottom = s.tracks()[1].id().to_string();

        assert!(s.move_track_up(&bottom));
        assert_eq!(s.tracks()[0].id(), bottom);
        assert_eq!(s.tracks()[0].layer(), 0);
        assert_eq!(s.tracks()[0].visual().unwrap().z_index, 0);
        assert_eq!(s.tracks()[1].layer(), 1);

        // Already at the top.
        assert!(!s.move_track_up(&bottom));
    }

    #[test]
    fn solo_overrides_mute() {
        let mut a = AudioTrack::new("a", "u", 0.0, 5.0);
        a.muted = true;
        a.solo = true;
        let b = AudioTrack::new("b", "u", 0.0, 5.0);
        let s = session_with(vec![Track::Audio(a), Track::Audio(b)]);

        let (a_id, b_id) = (s.tracks()[0].id(), s.tracks()[1].id());
        // A is soloed: audible despite its own mute flag. B is silenced.
        assert!(s.is_audible(a_id));
        assert!(!s.is_audible(b_id));
    }

    #[test]
    fn no_solo_falls_back_to_mute_flags() {
        let mut a = AudioTrack::new("a", "u", 0.0, 5.0);
        a.muted = true;
        let b = AudioTrack::new("b", "u", 0.0, 5.0);
        let s = session_with(vec![Track::Audio(a), Track::Audio(b)]);

        assert!(!s.is_audible(s.tracks()[0].id()));
        assert!(s.is_audible(s.tracks()[1].id()));
    }

    #[test]
    fn images_are_never_audible() {
        let s = session_with(vec![Track::Image(ImageTrack::new("i", "u", 0.0, 5.0))]);
        assert!(!s.is_audible(s.tracks()[0].id()));
    }

    #[test]
    fn json_roundtrip_preserves_fields_and_order() {
        let mut s = session_with(vec![
            Track::Audio(AudioTrack::new("a", "https://cdn/a.mp3", 1.0, 4.0)),
            Track::Video(VideoTrack::new("v", "https://cdn/v.mp4", 0.0, 9.0)),
            Track::Image(ImageTrack::new("i", "https://cdn/i.png", 3.0, 2.0)),
        ]);
        s.playhead = 2.5;
        s.transport = Transport::Paused;

        let json = s.to_json().unwrap();
        let de = Session::from_json(&json).unwrap();
        assert_eq!(de, s);
        assert_eq!(
            de.tracks().iter().map(|t| t.id()).collect::<Vec<_>>(),
            s.tracks().iter().map(|t| t.id()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn from_json_rejects_duplicate_ids() {
        let mut s = session_with(vec![Track::Audio(AudioTrack::new("a", "u", 0.0, 5.0))]);
        let mut dup = s.tracks()[0].clone();
        dup.set_name("dup".to_string());
        s.tracks.push(dup);

        let json = serde_json::to_string(&s).unwrap();
        assert!(Session::from_json(&json).is_err());
    }

    #[test]
    fn timeline_end_is_last_window_edge() {
        let s = session_with(vec![
            Track::Audio(AudioTrack::new("a", "u", 0.0, 5.0)),
            Track::Audio(AudioTrack::new("b", "u", 10.0, 20.0)),
        ]);
        assert_eq!(s.timeline_end(), 30.0);
        assert_eq!(Session::new().timeline_end(), 0.0);
    }
}
