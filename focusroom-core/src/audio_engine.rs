//! Shared audio graph: one alert tone through the master gain stage and at
//! most one looping ambient voice with its own gain stage.
//!
//! ```text
//! alert source ─────────────────► master gain ──► destination
//! ambient loop ──► ambient gain ──┘
//! ```
//!
//! The master stage carries the user volume and applies to everything. The
//! ambient stage sits at unity and only carries fades, so an alert that fires
//! mid-fade plays at full volume and a volume change reaches a fading voice.
//!
//! The engine is a cheap clonable handle. Every mutation goes through its
//! methods, which are idempotent against redundant calls; pending fade
//! cleanups are cleared whenever a newer stop/play supersedes them.

use crate::scheduler::{PendingTimeout, Scheduler};
use crate::sound::{asset_manifest, AmbientSoundId, InvalidVolume, VolumeLevel, ALERT_BUFFER};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("audio context unavailable: {0}")]
    ContextUnavailable(String),
    #[error("audio context resume rejected: {0}")]
    ResumeRejected(String),
    #[error("failed to fetch {url}: {detail}")]
    Fetch { url: String, detail: String },
    #[error("failed to decode {url}: {detail}")]
    Decode { url: String, detail: String },
    #[error("playback failed: {0}")]
    Playback(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Output graph primitives. Implemented over Web Audio in the browser crate.
#[allow(async_fn_in_trait)]
pub trait AudioBackend {
    type Buffer: Clone;
    /// A looping source together with its own gain stage.
    type Voice;

    fn context_state(&self) -> ContextState;
    async fn resume(&self) -> Result<(), AudioError>;
    /// Fetch and decode an asset.
    async fn load(&self, url: &str) -> Result<Self::Buffer, AudioError>;
    fn set_master_gain(&self, gain: f32);
    /// Start a fresh one-shot source routed through the master gain.
    fn play_once(&self, buffer: &Self::Buffer) -> Result<(), AudioError>;
    /// Start a looping source behind its own unity gain stage, which feeds the
    /// master gain.
    fn start_loop(&self, buffer: &Self::Buffer) -> Result<Self::Voice, AudioError>;
    /// Linear ramp of the voice's own stage from its current gain to `target`
    /// over `duration_ms`.
    fn ramp_voice_gain(&self, voice: &Self::Voice, target: f32, duration_ms: u32);
    fn stop_voice(&self, voice: Self::Voice);
}

/// Fire-and-forget facade over the engine for UI and session handlers.
/// Implementations spawn playback as a detached task that logs its own
/// failures.
pub trait AmbientControl {
    fn play_ambient(&self, id: AmbientSoundId);
    fn stop_ambient(&self, fade_ms: u32);
    fn set_volume(&self, level: i64) -> Result<VolumeLevel, InvalidVolume>;
}

struct Fade {
    seq: u64,
    timeout: PendingTimeout,
}

struct ActiveAmbient<V> {
    id: AmbientSoundId,
    voice: V,
    fade: Option<Fade>,
}

struct GraphState<B: AudioBackend> {
    /// Set once the first initialization finished; never cleared.
    ready: bool,
    /// An initialization is in flight.
    loading: bool,
    /// Requested while its buffer was still loading; started when the load
    /// finishes.
    pending_ambient: Option<AmbientSoundId>,
    buffers: HashMap<&'static str, B::Buffer>,
    volume: VolumeLevel,
    ambient: Option<ActiveAmbient<B::Voice>>,
    fade_seq: u64,
}

struct Inner<B: AudioBackend> {
    backend: B,
    scheduler: Rc<dyn Scheduler>,
    state: RefCell<GraphState<B>>,
}

pub struct AudioEngine<B: AudioBackend> {
    inner: Rc<Inner<B>>,
}

impl<B: AudioBackend> Clone for AudioEngine<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<B: AudioBackend + 'static> AudioEngine<B> {
    pub fn new(backend: B, scheduler: Rc<dyn Scheduler>, volume: VolumeLevel) -> Self {
        backend.set_master_gain(volume.gain());
        Self {
            inner: Rc::new(Inner {
                backend,
                scheduler,
                state: RefCell::new(GraphState {
                    ready: false,
                    loading: false,
                    pending_ambient: None,
                    buffers: HashMap::new(),
                    volume,
                    ambient: None,
                    fade_seq: 0,
                }),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Resume the context and load every asset not already cached. Must run
    /// inside a user gesture the first time. Overlapping calls return at once.
    /// A ready engine stays ready while a later call retries missing assets.
    pub async fn initialize(&self) {
        {
            let mut st = self.inner.state.borrow_mut();
            if st.loading {
                log::debug!("Audio initialization already in flight");
                return;
            }
            st.loading = true;
            if !st.ready {
                log::info!("Initializing audio");
            }
        }

        self.ensure_running().await;

        for (name, url) in asset_manifest() {
            if self.inner.state.borrow().buffers.contains_key(name) {
                continue;
            }
            match self.inner.backend.load(url).await {
                Ok(buffer) => {
                    self.inner.state.borrow_mut().buffers.insert(name, buffer);
                    log::info!("Loaded sound {name}");
                }
                Err(e) => log::warn!("Sound {name} unavailable: {e}"),
            }
        }

        let pending = {
            let mut st = self.inner.state.borrow_mut();
            self.inner.backend.set_master_gain(st.volume.gain());
            st.ready = true;
            st.loading = false;
            st.pending_ambient.take()
        };
        if let Some(id) = pending {
            log::info!("Starting ambient {id} requested during load");
            self.play_ambient(id).await;
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state.borrow().ready
    }

    pub fn has_buffer(&self, name: &str) -> bool {
        self.inner.state.borrow().buffers.contains_key(name)
    }

    pub fn volume(&self) -> VolumeLevel {
        self.inner.state.borrow().volume
    }

    /// The ambient sound currently audible, including one that is fading out.
    pub fn current_ambient(&self) -> Option<AmbientSoundId> {
        self.inner.state.borrow().ambient.as_ref().map(|a| a.id)
    }

    pub fn is_fading(&self) -> bool {
        self.inner
            .state
            .borrow()
            .ambient
            .as_ref()
            .is_some_and(|a| a.fade.is_some())
    }

    /// Play one fresh instance of the alert tone. Safe to call every tick.
    pub async fn play_alert(&self) {
        if !self.is_initialized() {
            log::warn!("Alert skipped: audio not initialized");
            return;
        }
        let Some(buffer) = self.buffer(ALERT_BUFFER) else {
            log::warn!("Alert skipped: alert sound not loaded");
            return;
        };
        if !self.ensure_running().await {
            return;
        }
        if let Err(e) = self.inner.backend.play_once(&buffer) {
            log::warn!("Alert playback failed: {e}");
        }
    }

    /// Switch the looping ambient sound. Re-requesting the sound that is
    /// already playing is a no-op; `None` stops immediately. A sound whose
    /// buffer is still loading starts once the load finishes; the current
    /// sound keeps playing until then.
    pub async fn play_ambient(&self, id: AmbientSoundId) {
        if id.is_none() {
            self.stop_ambient(0);
            return;
        }
        if self.is_steady(id) {
            return;
        }
        if !self.ensure_running().await {
            return;
        }
        // Re-check: another request may have won while the context resumed.
        if self.is_steady(id) {
            return;
        }

        let Some(buffer) = self.buffer(id.as_str()) else {
            let mut st = self.inner.state.borrow_mut();
            if st.loading {
                log::debug!("Ambient {id} waiting for its sound to load");
                st.pending_ambient = Some(id);
            } else {
                log::warn!("Ambient {id} skipped: sound not loaded");
            }
            return;
        };

        self.stop_ambient(0);

        let mut st = self.inner.state.borrow_mut();
        match self.inner.backend.start_loop(&buffer) {
            Ok(voice) => {
                st.ambient = Some(ActiveAmbient {
                    id,
                    voice,
                    fade: None,
                });
                log::info!("Ambient {id} started");
            }
            Err(e) => log::warn!("Ambient {id} failed to start: {e}"),
        }
    }

    /// Stop the ambient sound, immediately or with a linear fade. A pending
    /// fade from an earlier call is cancelled first, and so is a sound still
    /// waiting for its buffer.
    pub fn stop_ambient(&self, fade_ms: u32) {
        let mut st = self.inner.state.borrow_mut();
        st.pending_ambient = None;
        let Some(active) = st.ambient.as_mut() else {
            return;
        };
        if let Some(fade) = active.fade.take() {
            fade.timeout.cancel(&*self.inner.scheduler);
        }

        if fade_ms > 0 {
            st.fade_seq += 1;
            let seq = st.fade_seq;
            let Some(active) = st.ambient.as_mut() else {
                return;
            };
            self.inner
                .backend
                .ramp_voice_gain(&active.voice, 0.0, fade_ms);
            let weak: Weak<Inner<B>> = Rc::downgrade(&self.inner);
            let cleanup = Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    AudioEngine { inner }.finish_fade(seq);
                }
            });
            if let Some(timeout) =
                PendingTimeout::schedule(&*self.inner.scheduler, fade_ms, cleanup)
            {
                active.fade = Some(Fade { seq, timeout });
                return;
            }
            log::warn!("Fade timer refused, stopping ambient now");
        }

        if let Some(active) = st.ambient.take() {
            self.inner.backend.stop_voice(active.voice);
            log::info!("Ambient {} stopped", active.id);
        }
    }

    /// Validate and apply a new volume. Rejected values leave state untouched.
    pub fn set_volume(&self, level: i64) -> Result<VolumeLevel, InvalidVolume> {
        let level = VolumeLevel::new(level).inspect_err(|e| {
            log::warn!("Volume rejected: {e}");
        })?;
        self.apply_volume(level);
        Ok(level)
    }

    /// Set the master stage. Playing and fading voices follow at once; a
    /// running fade keeps its own ramp.
    pub fn apply_volume(&self, level: VolumeLevel) {
        self.inner.state.borrow_mut().volume = level;
        self.inner.backend.set_master_gain(level.gain());
    }

    /// Stop all sound and cancel pending fades. Buffers stay cached.
    pub fn dispose(&self) {
        self.stop_ambient(0);
        log::info!("Audio engine disposed");
    }

    fn finish_fade(&self, seq: u64) {
        let mut st = self.inner.state.borrow_mut();
        let current = st
            .ambient
            .as_ref()
            .and_then(|a| a.fade.as_ref())
            .map(|f| f.seq);
        if current != Some(seq) {
            log::debug!("Stale fade cleanup {seq} ignored");
            return;
        }
        if let Some(active) = st.ambient.take() {
            self.inner.backend.stop_voice(active.voice);
            log::info!("Ambient {} faded out", active.id);
        }
    }

    /// `id` is playing and not fading. A steady request also supersedes any
    /// sound still waiting for its buffer.
    fn is_steady(&self, id: AmbientSoundId) -> bool {
        let mut st = self.inner.state.borrow_mut();
        let steady = matches!(
            st.ambient.as_ref(),
            Some(a) if a.id == id && a.fade.is_none()
        );
        if steady {
            st.pending_ambient = None;
        }
        steady
    }

    fn buffer(&self, name: &str) -> Option<B::Buffer> {
        self.inner.state.borrow().buffers.get(name).cloned()
    }

    async fn ensure_running(&self) -> bool {
        match self.inner.backend.context_state() {
            ContextState::Running => true,
            ContextState::Closed => {
                log::warn!("Audio context closed");
                false
            }
            ContextState::Suspended => match self.inner.backend.resume().await {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("{e}");
                    false
                }
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Resume,
        Load(String),
        MasterGain(f32),
        PlayOnce(String),
        StartLoop(u32, String),
        Ramp(u32, f32, u32),
        Stop(u32),
    }

    /// Future that stays pending while the gate is closed.
    struct GateWait(Rc<Cell<bool>>);

    impl Future for GateWait {
        type Output = ();

        fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
            if self.0.get() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        }
    }

    pub(crate) struct FakeBackend {
        pub(crate) calls: RefCell<Vec<Call>>,
        pub(crate) state: Cell<ContextState>,
        pub(crate) reject_resume: Cell<bool>,
        pub(crate) failing: RefCell<HashSet<String>>,
        pub(crate) gate: Rc<Cell<bool>>,
        pub(crate) master: Cell<f32>,
        live: RefCell<HashSet<u32>>,
        next_voice: Cell<u32>,
    }

    impl FakeBackend {
        pub(crate) fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                state: Cell::new(ContextState::Suspended),
                reject_resume: Cell::new(false),
                failing: RefCell::new(HashSet::new()),
                gate: Rc::new(Cell::new(true)),
                master: Cell::new(1.0),
                live: RefCell::new(HashSet::new()),
                next_voice: Cell::new(0),
            }
        }

        pub(crate) fn fail(&self, url: &str) {
            self.failing.borrow_mut().insert(url.to_string());
        }

        pub(crate) fn live_voices(&self) -> usize {
            self.live.borrow().len()
        }

        pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls.borrow().iter().filter(|c| pred(*c)).count()
        }
    }

    impl AudioBackend for FakeBackend {
        type Buffer = String;
        type Voice = u32;

        fn context_state(&self) -> ContextState {
            self.state.get()
        }

        async fn resume(&self) -> Result<(), AudioError> {
            self.calls.borrow_mut().push(Call::Resume);
            if self.reject_resume.get() {
                return Err(AudioError::ResumeRejected("NotAllowedError".to_string()));
            }
            self.state.set(ContextState::Running);
            Ok(())
        }

        async fn load(&self, url: &str) -> Result<String, AudioError> {
            self.calls.borrow_mut().push(Call::Load(url.to_string()));
            GateWait(self.gate.clone()).await;
            if self.failing.borrow().contains(url) {
                return Err(AudioError::Fetch {
                    url: url.to_string(),
                    detail: "404".to_string(),
                });
            }
            Ok(url.to_string())
        }

        fn set_master_gain(&self, gain: f32) {
            self.master.set(gain);
            self.calls.borrow_mut().push(Call::MasterGain(gain));
        }

        fn play_once(&self, buffer: &String) -> Result<(), AudioError> {
            self.calls.borrow_mut().push(Call::PlayOnce(buffer.clone()));
            Ok(())
        }

        fn start_loop(&self, buffer: &String) -> Result<u32, AudioError> {
            let id = self.next_voice.get() + 1;
            self.next_voice.set(id);
            self.live.borrow_mut().insert(id);
            self.calls
                .borrow_mut()
                .push(Call::StartLoop(id, buffer.clone()));
            Ok(id)
        }

        fn ramp_voice_gain(&self, voice: &u32, target: f32, duration_ms: u32) {
            assert!(self.live.borrow().contains(voice), "ramp on released voice");
            self.calls
                .borrow_mut()
                .push(Call::Ramp(*voice, target, duration_ms));
        }

        fn stop_voice(&self, voice: u32) {
            assert!(self.live.borrow_mut().remove(&voice), "voice {voice} released twice");
            self.calls.borrow_mut().push(Call::Stop(voice));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{Call, FakeBackend};
    use super::*;
    use crate::scheduler::manual::ManualScheduler;
    use pollster::block_on;
    use std::future::Future;
    use std::pin::pin;
    use std::sync::Arc;
    use std::task::{Context, Poll, Wake, Waker};

    struct NoopWake;

    impl Wake for NoopWake {
        fn wake(self: Arc<Self>) {}
    }

    fn setup() -> (AudioEngine<FakeBackend>, Rc<ManualScheduler>) {
        let sched = Rc::new(ManualScheduler::new());
        let engine = AudioEngine::new(FakeBackend::new(), sched.clone(), VolumeLevel::DEFAULT);
        (engine, sched)
    }

    fn ready() -> (AudioEngine<FakeBackend>, Rc<ManualScheduler>) {
        let (engine, sched) = setup();
        block_on(engine.initialize());
        (engine, sched)
    }

    #[test]
    fn test_initialize_resumes_then_loads_everything() {
        let (engine, _) = ready();
        let calls = engine.backend().calls.borrow().clone();
        assert_eq!(calls[1], Call::Resume);
        assert_eq!(calls[2], Call::Load("/sounds/alert.mp3".to_string()));
        assert!(engine.is_initialized());
        for name in ["alert", "rain", "cafe", "white_noise"] {
            assert!(engine.has_buffer(name), "{name} not loaded");
        }
    }

    #[test]
    fn test_initialize_twice_loads_once() {
        let (engine, _) = ready();
        block_on(engine.initialize());
        let loads = engine.backend().count(|c| matches!(c, Call::Load(_)));
        assert_eq!(loads, 4);
    }

    #[test]
    fn test_overlapping_initialize_is_noop() {
        let (engine, _) = setup();
        engine.backend().gate.set(false);
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);

        let mut first = pin!(engine.initialize());
        assert!(first.as_mut().poll(&mut cx).is_pending());
        let mut second = pin!(engine.initialize());
        assert_eq!(second.as_mut().poll(&mut cx), Poll::Ready(()));
        assert!(!engine.is_initialized());

        engine.backend().gate.set(true);
        assert_eq!(first.as_mut().poll(&mut cx), Poll::Ready(()));
        assert!(engine.is_initialized());
        let alert_loads = engine
            .backend()
            .count(|c| *c == Call::Load("/sounds/alert.mp3".to_string()));
        assert_eq!(alert_loads, 1);
    }

    #[test]
    fn test_one_failed_asset_does_not_block_others() {
        let (engine, _) = setup();
        engine.backend().fail("/sounds/cafe.mp3");
        block_on(engine.initialize());
        assert!(engine.is_initialized());
        assert!(!engine.has_buffer("cafe"));
        assert!(engine.has_buffer("white_noise"));

        block_on(engine.play_ambient(AmbientSoundId::Cafe));
        assert_eq!(engine.current_ambient(), None);
        assert_eq!(engine.backend().live_voices(), 0);
    }

    #[test]
    fn test_failed_asset_is_retried_on_next_initialize() {
        let (engine, _) = setup();
        engine.backend().fail("/sounds/rain.mp3");
        block_on(engine.initialize());
        engine.backend().failing.borrow_mut().clear();
        block_on(engine.initialize());
        assert!(engine.has_buffer("rain"));
        let rain_loads = engine
            .backend()
            .count(|c| *c == Call::Load("/sounds/rain.mp3".to_string()));
        assert_eq!(rain_loads, 2);
    }

    #[test]
    fn test_alert_before_initialize_is_silent() {
        let (engine, _) = setup();
        block_on(engine.play_alert());
        assert_eq!(engine.backend().count(|c| matches!(c, Call::PlayOnce(_))), 0);
    }

    #[test]
    fn test_alert_missing_buffer_is_silent() {
        let (engine, _) = setup();
        engine.backend().fail("/sounds/alert.mp3");
        block_on(engine.initialize());
        block_on(engine.play_alert());
        assert_eq!(engine.backend().count(|c| matches!(c, Call::PlayOnce(_))), 0);
    }

    #[test]
    fn test_each_alert_is_a_fresh_instance() {
        let (engine, _) = ready();
        for _ in 0..3 {
            block_on(engine.play_alert());
        }
        assert_eq!(engine.backend().count(|c| matches!(c, Call::PlayOnce(_))), 3);
    }

    #[test]
    fn test_alert_abandoned_when_resume_rejected() {
        let (engine, _) = ready();
        engine.backend().state.set(ContextState::Suspended);
        engine.backend().reject_resume.set(true);
        block_on(engine.play_alert());
        assert_eq!(engine.backend().count(|c| matches!(c, Call::PlayOnce(_))), 0);
    }

    #[test]
    fn test_play_ambient_twice_keeps_one_voice() {
        let (engine, _) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        assert_eq!(engine.current_ambient(), Some(AmbientSoundId::Rain));
        assert_eq!(engine.backend().live_voices(), 1);
        assert_eq!(engine.backend().count(|c| matches!(c, Call::StartLoop(..))), 1);
    }

    #[test]
    fn test_switching_ambient_stops_previous_first() {
        let (engine, _) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        block_on(engine.play_ambient(AmbientSoundId::Cafe));
        assert_eq!(engine.current_ambient(), Some(AmbientSoundId::Cafe));
        assert_eq!(engine.backend().live_voices(), 1);

        let calls = engine.backend().calls.borrow().clone();
        let stop = calls.iter().position(|c| *c == Call::Stop(1)).unwrap();
        let start = calls
            .iter()
            .position(|c| matches!(c, Call::StartLoop(2, ..)))
            .unwrap();
        assert!(stop < start);
    }

    #[test]
    fn test_ambient_plays_through_master_volume() {
        let (engine, _) = ready();
        engine.set_volume(30).unwrap();
        block_on(engine.play_ambient(AmbientSoundId::WhiteNoise));
        assert_eq!(engine.backend().master.get(), 0.3);
        assert!(engine
            .backend()
            .calls
            .borrow()
            .contains(&Call::StartLoop(1, "/sounds/white_noise.mp3".to_string())));
    }

    #[test]
    fn test_stop_zero_then_play_leaves_no_fade() {
        let (engine, sched) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        engine.stop_ambient(0);
        block_on(engine.play_ambient(AmbientSoundId::Cafe));

        assert_eq!(engine.current_ambient(), Some(AmbientSoundId::Cafe));
        assert!(!engine.is_fading());
        assert_eq!(sched.pending(), 0);
        sched.advance(5000);
        assert_eq!(engine.current_ambient(), Some(AmbientSoundId::Cafe));
    }

    #[test]
    fn test_fade_stops_after_duration() {
        let (engine, sched) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        engine.stop_ambient(2000);
        assert!(engine.is_fading());
        assert!(engine.backend().calls.borrow().contains(&Call::Ramp(1, 0.0, 2000)));

        sched.advance(1999);
        assert_eq!(engine.current_ambient(), Some(AmbientSoundId::Rain));
        sched.advance(1);
        assert_eq!(engine.current_ambient(), None);
        assert_eq!(engine.backend().live_voices(), 0);
    }

    #[test]
    fn test_double_fade_runs_one_cleanup() {
        let (engine, sched) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        engine.stop_ambient(2000);
        sched.advance(500);
        engine.stop_ambient(2000);
        assert_eq!(sched.pending(), 1);

        sched.advance(5000);
        assert_eq!(engine.current_ambient(), None);
        assert_eq!(engine.backend().count(|c| matches!(c, Call::Stop(_))), 1);
    }

    #[test]
    fn test_play_during_fade_cancels_cleanup() {
        let (engine, sched) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        engine.stop_ambient(2000);
        block_on(engine.play_ambient(AmbientSoundId::Cafe));
        assert_eq!(sched.pending(), 0);

        sched.advance(3000);
        assert_eq!(engine.current_ambient(), Some(AmbientSoundId::Cafe));
        assert_eq!(engine.backend().live_voices(), 1);
    }

    #[test]
    fn test_same_sound_during_fade_restarts() {
        let (engine, sched) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        engine.stop_ambient(2000);
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        sched.advance(3000);
        assert_eq!(engine.current_ambient(), Some(AmbientSoundId::Rain));
        assert!(!engine.is_fading());
    }

    #[test]
    fn test_stop_without_ambient_is_noop() {
        let (engine, sched) = ready();
        engine.stop_ambient(2000);
        engine.stop_ambient(0);
        assert_eq!(sched.pending(), 0);
        assert_eq!(engine.backend().count(|c| matches!(c, Call::Stop(_))), 0);
    }

    #[test]
    fn test_immediate_stop_cancels_fade() {
        let (engine, sched) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        engine.stop_ambient(2000);
        engine.stop_ambient(0);
        assert_eq!(sched.pending(), 0);
        assert_eq!(engine.current_ambient(), None);
        sched.advance(3000);
        assert_eq!(engine.backend().count(|c| matches!(c, Call::Stop(_))), 1);
    }

    #[test]
    fn test_set_volume_valid_range() {
        let (engine, _) = ready();
        for v in [0, 1, 50, 99, 100] {
            assert_eq!(engine.set_volume(v).map(VolumeLevel::get), Ok(v as u8));
            assert_eq!(engine.volume().get(), v as u8);
        }
    }

    #[test]
    fn test_set_volume_rejects_and_keeps_prior() {
        let (engine, _) = ready();
        engine.set_volume(40).unwrap();
        for v in [-1, 101, 1000, i64::MIN] {
            assert!(engine.set_volume(v).is_err());
            assert_eq!(engine.volume().get(), 40);
        }
    }

    #[test]
    fn test_set_volume_updates_live_ambient() {
        let (engine, _) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        engine.set_volume(80).unwrap();
        assert!(engine.backend().calls.borrow().contains(&Call::MasterGain(0.8)));
        assert_eq!(engine.backend().master.get(), 0.8);
        assert_eq!(engine.backend().live_voices(), 1);
    }

    #[test]
    fn test_mute_during_fade_silences_fading_voice() {
        let (engine, sched) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        engine.stop_ambient(2000);
        engine.set_volume(0).unwrap();

        // The fading voice still feeds the master stage, which is now silent.
        assert!(engine.is_fading());
        assert_eq!(engine.backend().live_voices(), 1);
        assert_eq!(engine.backend().master.get(), 0.0);
        assert_eq!(engine.backend().count(|c| matches!(c, Call::Ramp(..))), 1);

        sched.advance(2000);
        assert_eq!(engine.current_ambient(), None);
    }

    #[test]
    fn test_alert_during_reinitialize_plays() {
        let (engine, _) = setup();
        engine.backend().fail("/sounds/cafe.mp3");
        block_on(engine.initialize());
        assert!(engine.is_initialized());

        engine.backend().failing.borrow_mut().clear();
        engine.backend().gate.set(false);
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut retry = pin!(engine.initialize());
        assert!(retry.as_mut().poll(&mut cx).is_pending());

        assert!(engine.is_initialized());
        block_on(engine.play_alert());
        assert_eq!(engine.backend().count(|c| matches!(c, Call::PlayOnce(_))), 1);

        engine.backend().gate.set(true);
        assert_eq!(retry.as_mut().poll(&mut cx), Poll::Ready(()));
        assert!(engine.has_buffer("cafe"));
    }

    #[test]
    fn test_ambient_requested_during_first_load_starts_after() {
        let (engine, _) = setup();
        engine.backend().gate.set(false);
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut init = pin!(engine.initialize());
        assert!(init.as_mut().poll(&mut cx).is_pending());

        block_on(engine.play_ambient(AmbientSoundId::Rain));
        assert_eq!(engine.current_ambient(), None);

        engine.backend().gate.set(true);
        assert_eq!(init.as_mut().poll(&mut cx), Poll::Ready(()));
        assert_eq!(engine.current_ambient(), Some(AmbientSoundId::Rain));
        assert_eq!(engine.backend().live_voices(), 1);
    }

    #[test]
    fn test_stop_during_first_load_drops_waiting_sound() {
        let (engine, _) = setup();
        engine.backend().gate.set(false);
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut init = pin!(engine.initialize());
        assert!(init.as_mut().poll(&mut cx).is_pending());

        block_on(engine.play_ambient(AmbientSoundId::Cafe));
        engine.stop_ambient(2000);

        engine.backend().gate.set(true);
        assert_eq!(init.as_mut().poll(&mut cx), Poll::Ready(()));
        assert_eq!(engine.current_ambient(), None);
        assert_eq!(engine.backend().count(|c| matches!(c, Call::StartLoop(..))), 0);
    }

    #[test]
    fn test_missing_buffer_keeps_current_sound() {
        let (engine, _) = setup();
        engine.backend().fail("/sounds/cafe.mp3");
        block_on(engine.initialize());
        block_on(engine.play_ambient(AmbientSoundId::Rain));

        block_on(engine.play_ambient(AmbientSoundId::Cafe));
        assert_eq!(engine.current_ambient(), Some(AmbientSoundId::Rain));
        assert_eq!(engine.backend().live_voices(), 1);
        assert_eq!(engine.backend().count(|c| matches!(c, Call::Stop(_))), 0);
    }

    #[test]
    fn test_dropped_engine_ignores_late_cleanup() {
        let (engine, sched) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Rain));
        engine.stop_ambient(1000);
        drop(engine);
        sched.advance(2000);
    }

    #[test]
    fn test_dispose_stops_everything() {
        let (engine, sched) = ready();
        block_on(engine.play_ambient(AmbientSoundId::Cafe));
        engine.stop_ambient(2000);
        engine.dispose();
        assert_eq!(sched.pending(), 0);
        assert_eq!(engine.backend().live_voices(), 0);
    }
}
