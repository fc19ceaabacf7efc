use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::{EngineError, EngineResult};
use crate::model::Track;
use crate::player::{MediaHost, PlayerEvent, PlayerState, TrackPlayer};
use crate::session::{Session, Transport};

/// Coordinator tuning.
#[derive(Clone, Copy, Debug)]
pub struct CoordinatorOpts {
    /// Period of the corrective re-seek issued to all active players during
    /// continuous playback.
    pub resync_interval: Duration,
    /// Maximum tolerated deviation (seconds) between a player's progress
    /// report and the authoritative playhead before an immediate correction
    /// seek is issued to that player.
    pub drift_tolerance: f64,
}

impl Default for CoordinatorOpts {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(5),
            drift_tolerance: 0.25,
        }
    }
}

/// One player bound to its track's timeline window and mix directives.
#[derive(Debug)]
struct Slot {
    player: TrackPlayer,
    start: f64,
    duration: f64,
    /// Solo-resolved audibility from the last sync.
    audible: bool,
    audio_capable: bool,
    /// Participates in the readiness gate. Visual tracks are required while
    /// visible; audio-only tracks only while audible.
    required: bool,
    /// Whether the playhead was inside the window at the last transition
    /// check.
    active: bool,
}

impl Slot {
    fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.start + self.duration
    }

    fn local_time(&self, playhead: f64) -> f64 {
        (playhead - self.start).clamp(0.0, self.duration)
    }
}

/// Keeps independently-loaded players phase-locked to one authoritative
/// playhead.
///
/// Transport walk: `Idle → Loading → Ready → Playing ⇄ Paused`, back to
/// `Idle` on [`reset`](Self::reset). The coordinator owns the live transport
/// and playhead; the copies on [`Session`] are persisted snapshots.
///
/// Drift policy: every player advances at its own rate between corrections.
/// All active players are re-seeked on every pause and explicit seek, and
/// periodically every [`CoordinatorOpts::resync_interval`] of continuous
/// playback. A progress report deviating from the playhead by more than
/// [`CoordinatorOpts::drift_tolerance`] triggers an immediate correction
/// seek for that player alone.
#[derive(Debug)]
pub struct PlaybackCoordinator<H: MediaHost> {
    host: H,
    opts: CoordinatorOpts,
    transport: Transport,
    playhead: f64,
    timeline_end: f64,
    slots: Vec<Slot>,
    next_generation: u64,
    last_tick: Option<Instant>,
    last_resync: Option<Instant>,
}

impl<H: MediaHost> PlaybackCoordinator<H> {
    pub fn new(host: H) -> Self {
        Self::with_opts(host, CoordinatorOpts::default())
    }

    pub fn with_opts(host: H, opts: CoordinatorOpts) -> Self {
        Self {
            host,
            opts,
            transport: Transport::Idle,
            playhead: 0.0,
            timeline_end: 0.0,
            slots: Vec::new(),
            next_generation: 1,
            last_tick: None,
            last_resync: None,
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Per-track player state for fault indicators. `None` for tracks with
    /// no live player (hidden or unknown).
    pub fn track_status(&self, id: &str) -> Option<PlayerState> {
        self.slots
            .iter()
            .find(|s| s.player.track_id() == id)
            .map(|s| s.player.state())
    }

    /// The per-track fault, if the track's player has failed. Faults are
    /// never session-fatal; this is the surface UI indicators read from.
    pub fn track_fault(&self, id: &str) -> Option<EngineError> {
        self.slots
            .iter()
            .find(|s| s.player.track_id() == id)
            .and_then(|s| s.player.error_message())
            .map(EngineError::media)
    }

    /// Begin a session: seed the playhead from the persisted snapshot, enter
    /// `Loading` and reconcile players. An empty track set settles straight
    /// back to `Idle`.
    #[tracing::instrument(skip_all)]
    pub fn prepare(&mut self, session: &Session) {
        self.playhead = session.playhead.max(0.0);
        self.transport = Transport::Loading;
        self.sync(session);
    }

    /// Reconcile players against the current session snapshot. Call after
    /// every committed edit.
    ///
    /// Removed, hidden and url-changed tracks are torn down synchronously
    /// before any replacement player is created, so a late completion from a
    /// stale load can never land on a fresh player. Volume, speed and the
    /// recomputed mute/solo directive are pushed to surviving players live,
    /// never via reload.
    pub fn sync(&mut self, session: &Session) {
        let mut kept: HashMap<String, TrackPlayer> = HashMap::new();
        let mut prior: HashMap<String, (bool, f64)> = HashMap::new();
        for slot in self.slots.drain(..) {
            prior.insert(
                slot.player.track_id().to_string(),
                (slot.active, slot.start),
            );
            let mut player = slot.player;
            let survives = session
                .track(player.track_id())
                .is_some_and(|t| !t.hidden() && t.url() == player.url());
            if survives {
                kept.insert(player.track_id().to_string(), player);
            } else {
                player.release(&mut self.host);
            }
        }

        let playhead = self.playhead;
        let mut slots = Vec::new();
        for track in session.tracks().iter().filter(|t| !t.hidden()) {
            let player = match kept.remove(track.id()) {
                Some(p) => p,
                None => {
                    let generation = self.next_generation;
                    self.next_generation += 1;
                    TrackPlayer::load(
                        &mut self.host,
                        track.id().to_string(),
                        track.url().to_string(),
                        generation,
                    )
                }
            };

            let audible = session.is_audible(track.id());
            let mut slot = Slot {
                start: track.start(),
                duration: track.duration(),
                audible,
                audio_capable: track.is_audio_capable(),
                required: track.visual().is_some() || audible,
                active: false,
                player,
            };
            slot.active = slot.contains(playhead);

            if slot.audio_capable {
                slot.player.set_volume(&mut self.host, track.volume());
                slot.player.set_speed(&mut self.host, track.speed());
                if let Track::Audio(a) = track {
                    slot.player.set_pan(&mut self.host, a.pan);
                }
                slot.player.set_muted(&mut self.host, !audible);
            }

            // An edit can move a kept track's window across the playhead
            // without the playhead itself moving, so membership must be
            // reconciled here, not just in tick.
            if let Some((was_active, old_start)) = prior.get(track.id()).copied() {
                if slot.player.is_ready() {
                    let local = slot.local_time(playhead);
                    let rolling = self.transport == Transport::Playing;
                    if rolling && slot.active != was_active {
                        if slot.active {
                            slot.player.seek(&mut self.host, local);
                            slot.player.play(&mut self.host);
                        } else {
                            slot.player.pause(&mut self.host);
                            slot.player.seek(&mut self.host, local);
                        }
                    } else if old_start != slot.start {
                        // Window shifted under the playhead: re-phase so the
                        // local position matches the new mapping.
                        slot.player.seek(&mut self.host, local);
                    }
                }
            }
            slots.push(slot);
        }
        self.slots = slots;
        self.timeline_end = session.timeline_end();
        self.refresh_gate();
    }

    /// Fan out `play` to every ready in-window player. Legal from `Ready` or
    /// `Paused` only. No individual player is awaited.
    pub fn play(&mut self) -> EngineResult<()> {
        match self.transport {
            Transport::Ready | Transport::Paused => {
                let playhead = self.playhead;
                for slot in &mut self.slots {
                    slot.active = slot.contains(playhead);
                    if slot.active && slot.player.is_ready() {
                        slot.player.play(&mut self.host);
                    }
                }
                self.transport = Transport::Playing;
                self.last_tick = None;
                self.last_resync = None;
                tracing::debug!(playhead, "transport playing");
                Ok(())
            }
            state => Err(EngineError::transport(format!(
                "cannot play while {state:?}"
            ))),
        }
    }

    /// Fan out `pause` and perform a boundary resync. Legal from `Playing`.
    pub fn pause(&mut self) -> EngineResult<()> {
        if self.transport != Transport::Playing {
            return Err(EngineError::transport(format!(
                "cannot pause while {:?}",
                self.transport
            )));
        }
        for slot in &mut self.slots {
            if slot.player.is_ready() {
                slot.player.pause(&mut self.host);
            }
        }
        self.transport = Transport::Paused;
        self.resync_players();
        tracing::debug!(playhead = self.playhead, "transport paused");
        Ok(())
    }

    pub fn toggle_play_pause(&mut self) -> EngineResult<()> {
        match self.transport {
            Transport::Playing => self.pause(),
            Transport::Ready | Transport::Paused => self.play(),
            state => Err(EngineError::transport(format!(
                "cannot toggle playback while {state:?}"
            ))),
        }
    }

    /// Pause (if playing) and return the playhead to zero.
    pub fn stop(&mut self) -> EngineResult<()> {
        match self.transport {
            Transport::Playing => self.pause()?,
            Transport::Ready | Transport::Paused => {}
            state => {
                return Err(EngineError::transport(format!(
                    "cannot stop while {state:?}"
                )));
            }
        }
        self.playhead = 0.0;
        self.resync_players();
        self.refresh_active_windows();
        Ok(())
    }

    /// Move the playhead. Each player is seeked to
    /// `clamp(time - start, 0, duration)`; out-of-window players are held
    /// paused at the clamped boundary and never restarted. Legal in any
    /// non-`Idle` state.
    pub fn seek(&mut self, time: f64) -> EngineResult<()> {
        if self.transport == Transport::Idle {
            return Err(EngineError::transport("cannot seek while idle"));
        }
        self.playhead = time.max(0.0);
        self.resync_players();
        self.refresh_active_windows();
        Ok(())
    }

    /// Advance the playhead from wall-clock time and maintain window
    /// membership. Drives periodic drift resync. Call at frame cadence; a
    /// no-op outside `Playing`.
    pub fn tick(&mut self, now: Instant) {
        if self.transport != Transport::Playing {
            self.last_tick = Some(now);
            return;
        }

        let delta = self
            .last_tick
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(0.0);
        self.last_tick = Some(now);
        self.playhead += delta;

        if self.timeline_end > 0.0 && self.playhead >= self.timeline_end {
            self.playhead = self.timeline_end;
            for slot in &mut self.slots {
                if slot.player.is_ready() {
                    slot.player.pause(&mut self.host);
                }
                slot.active = false;
            }
            self.transport = Transport::Paused;
            tracing::debug!("reached timeline end");
            return;
        }

        let playhead = self.playhead;
        for slot in &mut self.slots {
            let now_active = slot.contains(playhead);
            if now_active != slot.active && slot.player.is_ready() {
                let local = slot.local_time(playhead);
                if now_active {
                    slot.player.seek(&mut self.host, local);
                    slot.player.play(&mut self.host);
                } else {
                    slot.player.pause(&mut self.host);
                    slot.player.seek(&mut self.host, local);
                }
            }
            slot.active = now_active;
        }

        match self.last_resync {
            Some(t) if now.duration_since(t) < self.opts.resync_interval => {}
            Some(_) => {
                self.resync_players();
                self.last_resync = Some(now);
            }
            None => self.last_resync = Some(now),
        }
    }

    /// Apply one host completion. Events whose generation no longer matches
    /// a live player are discarded without effect.
    pub fn handle_event(&mut self, event: PlayerEvent) {
        let Some(idx) = self
            .slots
            .iter()
            .position(|s| s.player.track_id() == event.track_id())
        else {
            tracing::debug!(track = event.track_id(), "event for unknown player discarded");
            return;
        };
        if !self.slots[idx].player.accepts(event.generation()) {
            tracing::debug!(
                track = event.track_id(),
                generation = event.generation(),
                "stale player event discarded"
            );
            return;
        }

        match event {
            PlayerEvent::Ready { duration, .. } => {
                let playhead = self.playhead;
                let transport = self.transport;
                let slot = &mut self.slots[idx];
                slot.player.on_ready(duration);
                // Join in phase with the session, not at media time zero.
                let local = slot.local_time(playhead);
                slot.player.seek(&mut self.host, local);
                slot.active = slot.contains(playhead);
                if transport == Transport::Playing && slot.active {
                    slot.player.play(&mut self.host);
                }
                self.refresh_gate();
            }
            PlayerEvent::Progress { time, .. } => {
                if self.transport != Transport::Playing {
                    self.slots[idx].player.on_progress(time);
                    return;
                }
                if self.reference_index() == Some(idx) {
                    // The reference player's report is the authoritative
                    // clock.
                    self.slots[idx].player.on_progress(time);
                    self.playhead = self.slots[idx].start + time;
                } else {
                    let playhead = self.playhead;
                    let tolerance = self.opts.drift_tolerance;
                    let slot = &mut self.slots[idx];
                    slot.player.on_progress(time);
                    let expected = slot.local_time(playhead);
                    if slot.active && (time - expected).abs() > tolerance {
                        tracing::debug!(
                            track = slot.player.track_id(),
                            time,
                            expected,
                            "drift correction seek"
                        );
                        slot.player.seek(&mut self.host, expected);
                    }
                }
            }
            PlayerEvent::Failed { message, .. } => {
                self.slots[idx].player.on_failed(&message);
                // Errored players drop out of the gate; the rest of the
                // session stays playable.
                self.refresh_gate();
            }
        }
    }

    /// Tear down every player and return to `Idle`.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.player.release(&mut self.host);
        }
        self.slots.clear();
        self.transport = Transport::Idle;
        self.playhead = 0.0;
        self.timeline_end = 0.0;
        self.last_tick = None;
        self.last_resync = None;
        tracing::debug!("coordinator reset");
    }

    /// `Loading → Ready` once no required player is still loading. Errored
    /// players are excluded: a per-track fault never blocks the session.
    fn refresh_gate(&mut self) {
        if self.transport != Transport::Loading {
            return;
        }
        if self.slots.is_empty() {
            self.transport = Transport::Idle;
            return;
        }
        let pending = self
            .slots
            .iter()
            .any(|s| s.required && s.player.state() == PlayerState::Loading);
        if !pending {
            self.transport = Transport::Ready;
            tracing::debug!("all required players ready");
        }
    }

    fn resync_players(&mut self) {
        let playhead = self.playhead;
        for slot in &mut self.slots {
            if slot.player.is_ready() {
                let local = slot.local_time(playhead);
                slot.player.seek(&mut self.host, local);
            }
        }
    }

    /// Recompute window membership after a playhead jump, issuing
    /// play/pause to ready players when the transport is rolling.
    fn refresh_active_windows(&mut self) {
        let playhead = self.playhead;
        let rolling = self.transport == Transport::Playing;
        for slot in &mut self.slots {
            let now_active = slot.contains(playhead);
            if rolling && slot.player.is_ready() && now_active != slot.active {
                if now_active {
                    slot.player.play(&mut self.host);
                } else {
                    slot.player.pause(&mut self.host);
                }
            }
            slot.active = now_active;
        }
    }

    fn reference_index(&self) -> Option<usize> {
        let playhead = self.playhead;
        self.slots
            .iter()
            .position(|s| s.audible && s.player.is_ready() && s.contains(playhead))
    }
}
