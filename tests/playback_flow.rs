use std::time::{Duration, Instant};

use trackdeck::{
    AudioTrack, MediaHost, PlaybackCoordinator, PlayerEvent, PlayerState, Session, Track,
    TrackEdit, Transport, VideoTrack,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Debug, Default)]
struct ScriptedHost {
    calls: Vec<String>,
    /// Generation stamped on the most recent load, per track.
    loads: Vec<(String, u64)>,
}

impl ScriptedHost {
    fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn generation_of(&self, track_id: &str) -> u64 {
        self.loads
            .iter()
            .rev()
            .find(|(id, _)| id == track_id)
            .map(|(_, g)| *g)
            .unwrap()
    }
}

impl MediaHost for ScriptedHost {
    fn load(&mut self, id: &str, generation: u64, url: &str) {
        self.calls.push(format!("load {id} {url}"));
        self.loads.push((id.to_string(), generation));
    }
    fn unload(&mut self, id: &str) {
        self.calls.push(format!("unload {id}"));
    }
    fn play(&mut self, id: &str) {
        self.calls.push(format!("play {id}"));
    }
    fn pause(&mut self, id: &str) {
        self.calls.push(format!("pause {id}"));
    }
    fn seek(&mut self, id: &str, local: f64) {
        self.calls.push(format!("seek {id} {local:.3}"));
    }
    fn set_volume(&mut self, id: &str, volume: f64) {
        self.calls.push(format!("volume {id} {volume:.3}"));
    }
    fn set_speed(&mut self, id: &str, speed: f64) {
        self.calls.push(format!("speed {id} {speed:.3}"));
    }
    fn set_pan(&mut self, id: &str, pan: f64) {
        self.calls.push(format!("pan {id} {pan:.3}"));
    }
    fn set_muted(&mut self, id: &str, muted: bool) {
        self.calls.push(format!("muted {id} {muted}"));
    }
}

fn studio_session() -> Session {
    let mut s = Session::new();
    s.add_track(Track::Audio(AudioTrack::new(
        "voice",
        "https://cdn.example/voice.mp3",
        0.0,
        20.0,
    )))
    .unwrap();
    s.add_track(Track::Audio(AudioTrack::new(
        "ambience",
        "https://cdn.example/rain.mp3",
        5.0,
        10.0,
    )))
    .unwrap();
    s.add_track(Track::Video(VideoTrack::new(
        "backdrop",
        "https://cdn.example/ocean.mp4",
        0.0,
        20.0,
    )))
    .unwrap();
    s
}

fn deliver_ready(c: &mut PlaybackCoordinator<ScriptedHost>, track_id: &str, duration: f64) {
    let generation = c.host().generation_of(track_id);
    c.handle_event(PlayerEvent::Ready {
        track_id: track_id.to_string(),
        generation,
        duration,
    });
}

#[test]
fn full_session_lifecycle() {
    init_tracing();
    let mut session = studio_session();
    let mut c = PlaybackCoordinator::new(ScriptedHost::default());

    c.prepare(&session);
    assert_eq!(c.transport(), Transport::Loading);
    assert_eq!(c.host().count("load"), 3);

    deliver_ready(&mut c, "track-1", 20.0);
    deliver_ready(&mut c, "track-2", 10.0);
    assert_eq!(c.transport(), Transport::Loading);
    deliver_ready(&mut c, "track-3", 20.0);
    assert_eq!(c.transport(), Transport::Ready);

    c.play().unwrap();
    assert_eq!(c.transport(), Transport::Playing);
    // Playhead 0: the ambience window [5, 15) has not opened yet.
    assert_eq!(c.host().count("play track-1"), 1);
    assert_eq!(c.host().count("play track-2"), 0);
    assert_eq!(c.host().count("play track-3"), 1);

    // The reference player's progress drives the shared playhead.
    let generation = c.host().generation_of("track-1");
    c.handle_event(PlayerEvent::Progress {
        track_id: "track-1".to_string(),
        generation,
        time: 6.0,
    });
    assert_eq!(c.playhead(), 6.0);

    // The next tick opens the ambience window.
    c.tick(Instant::now());
    assert_eq!(c.host().count("play track-2"), 1);

    c.pause().unwrap();
    assert_eq!(c.transport(), Transport::Paused);

    // Write the live state back into the document for persistence.
    session.playhead = c.playhead();
    session.transport = c.transport();
    let reloaded = Session::from_json(&session.to_json().unwrap()).unwrap();
    assert_eq!(reloaded.playhead, 6.0);
    assert_eq!(reloaded.transport, Transport::Paused);
}

#[test]
fn track_removal_mid_playback_goes_stale() {
    let mut session = studio_session();
    let mut c = PlaybackCoordinator::new(ScriptedHost::default());
    c.prepare(&session);

    let doomed_generation = c.host().generation_of("track-2");
    deliver_ready(&mut c, "track-1", 20.0);
    deliver_ready(&mut c, "track-3", 20.0);

    // The track is deleted while its media is still loading.
    session.remove_track("track-2");
    c.sync(&session);
    assert_eq!(c.host().count("unload track-2"), 1);
    // Its audibility requirement vanished with it.
    assert_eq!(c.transport(), Transport::Ready);

    // The in-flight completion lands after removal and is discarded.
    c.handle_event(PlayerEvent::Ready {
        track_id: "track-2".to_string(),
        generation: doomed_generation,
        duration: 10.0,
    });
    assert_eq!(c.track_status("track-2"), None);

    c.play().unwrap();
    assert_eq!(c.host().count("play track-2"), 0);
}

#[test]
fn one_bad_url_does_not_sink_the_session() {
    let session = studio_session();
    let mut c = PlaybackCoordinator::new(ScriptedHost::default());
    c.prepare(&session);

    let generation = c.host().generation_of("track-2");
    c.handle_event(PlayerEvent::Failed {
        track_id: "track-2".to_string(),
        generation,
        message: "HTTP 404".to_string(),
    });
    deliver_ready(&mut c, "track-1", 20.0);
    deliver_ready(&mut c, "track-3", 20.0);

    assert_eq!(c.transport(), Transport::Ready);
    assert_eq!(c.track_status("track-2"), Some(PlayerState::Error));
    assert_eq!(c.track_status("track-1"), Some(PlayerState::Ready));

    c.seek(7.0).unwrap();
    c.play().unwrap();
    assert_eq!(c.host().count("play track-1"), 1);
    assert_eq!(c.host().count("play track-3"), 1);
    assert_eq!(c.host().count("play track-2"), 0);
}

#[test]
fn url_swap_reloads_only_the_affected_track() {
    let mut session = studio_session();
    let mut c = PlaybackCoordinator::new(ScriptedHost::default());
    c.prepare(&session);
    deliver_ready(&mut c, "track-1", 20.0);
    deliver_ready(&mut c, "track-2", 10.0);
    deliver_ready(&mut c, "track-3", 20.0);

    let stale_generation = c.host().generation_of("track-1");
    session.edit_track(
        "track-1",
        TrackEdit::Url("https://cdn.example/voice-v2.mp3".to_string()),
    );
    c.sync(&session);

    assert_eq!(c.host().count("unload track-1"), 1);
    assert_eq!(c.host().count("load track-1 https://cdn.example/voice-v2.mp3"), 1);
    assert_eq!(c.host().count("unload track-2"), 0);
    assert_eq!(c.track_status("track-1"), Some(PlayerState::Loading));
    assert_eq!(c.track_status("track-2"), Some(PlayerState::Ready));

    // The superseded load completes late: no effect.
    c.handle_event(PlayerEvent::Ready {
        track_id: "track-1".to_string(),
        generation: stale_generation,
        duration: 20.0,
    });
    assert_eq!(c.track_status("track-1"), Some(PlayerState::Loading));

    deliver_ready(&mut c, "track-1", 21.0);
    assert_eq!(c.track_status("track-1"), Some(PlayerState::Ready));
}

#[test]
fn solo_retargets_the_audible_mix_without_reloads() {
    let mut session = studio_session();
    let mut c = PlaybackCoordinator::new(ScriptedHost::default());
    c.prepare(&session);
    deliver_ready(&mut c, "track-1", 20.0);
    deliver_ready(&mut c, "track-2", 10.0);
    deliver_ready(&mut c, "track-3", 20.0);
    let loads_before = c.host().count("load");

    session.edit_track("track-2", TrackEdit::Solo(true));
    c.sync(&session);

    assert_eq!(c.host().count("load"), loads_before);
    assert_eq!(c.host().count("muted track-1 true"), 1);
    assert_eq!(c.host().count("muted track-2 false"), 2);
    assert_eq!(c.host().count("muted track-3 true"), 1);
}

#[test]
fn seek_fans_out_clamped_local_times() {
    let session = studio_session();
    let mut c = PlaybackCoordinator::new(ScriptedHost::default());
    c.prepare(&session);
    deliver_ready(&mut c, "track-1", 20.0);
    deliver_ready(&mut c, "track-2", 10.0);
    deliver_ready(&mut c, "track-3", 20.0);

    c.seek(17.0).unwrap();
    // voice [0,20): local 17; ambience [5,15): clamped to its end; backdrop: 17.
    assert_eq!(c.host().count("seek track-1 17.000"), 1);
    assert_eq!(c.host().count("seek track-2 10.000"), 1);
    assert_eq!(c.host().count("seek track-3 17.000"), 1);
}

#[test]
fn drift_correction_over_a_long_run() {
    let session = studio_session();
    let mut c = PlaybackCoordinator::new(ScriptedHost::default());
    c.prepare(&session);
    deliver_ready(&mut c, "track-1", 20.0);
    deliver_ready(&mut c, "track-2", 10.0);
    deliver_ready(&mut c, "track-3", 20.0);
    c.play().unwrap();

    let base = Instant::now();
    c.tick(base);
    let before = c.host().count("seek");
    // Continuous playback past the periodic resync interval.
    c.tick(base + Duration::from_secs(6));
    assert!(c.host().count("seek") > before);

    // A follower reporting far from the playhead is pulled back immediately.
    let generation = c.host().generation_of("track-3");
    let before = c.host().count("seek track-3");
    c.handle_event(PlayerEvent::Progress {
        track_id: "track-3".to_string(),
        generation,
        time: 0.5,
    });
    assert_eq!(c.host().count("seek track-3"), before + 1);
}

#[test]
fn reset_then_prepare_starts_a_clean_run() {
    let session = studio_session();
    let mut c = PlaybackCoordinator::new(ScriptedHost::default());
    c.prepare(&session);
    deliver_ready(&mut c, "track-1", 20.0);

    c.reset();
    assert_eq!(c.transport(), Transport::Idle);
    assert_eq!(c.host().count("unload"), 3);

    c.prepare(&session);
    assert_eq!(c.transport(), Transport::Loading);
    // Fresh generations: the pre-reset completion can never leak in.
    assert_eq!(c.host().count("load"), 6);
}
