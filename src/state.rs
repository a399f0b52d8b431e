//! Process-wide runtime, built once at boot and reached from DOM listeners.

use crate::audio::web_audio::WebAudioBackend;
use crate::audio::{DetachedPlayback, Engine};
use crate::components::settings_panel::PanelSignals;
use crate::platform::{BrowserScheduler, NavigatorWakeLock};
use focusroom_core::{
    AudioEngine, KeyValueStore, PhaseReaction, PreferenceStore, Scheduler, SessionAudio,
    SettingsPanel, WakeLockCoordinator,
};
use std::cell::RefCell;
use std::rc::Rc;

pub type PanelController = SettingsPanel<PanelSignals>;

pub struct Runtime {
    scheduler: Rc<BrowserScheduler>,
    pub prefs: PreferenceStore,
    pub engine: Engine,
    pub playback: DetachedPlayback,
    pub wake_lock: WakeLockCoordinator<NavigatorWakeLock>,
    session: SessionAudio,
    panel: RefCell<Option<Rc<PanelController>>>,
}

thread_local! {
    static RUNTIME: RefCell<Option<Rc<Runtime>>> = const { RefCell::new(None) };
}

impl Runtime {
    pub fn new(store: Rc<dyn KeyValueStore>) -> Self {
        let scheduler = Rc::new(BrowserScheduler::new());
        let prefs = PreferenceStore::new(store);
        let engine = AudioEngine::new(
            WebAudioBackend::new(),
            scheduler.clone() as Rc<dyn Scheduler>,
            prefs.volume(),
        );
        let playback = DetachedPlayback::new(engine.clone());
        let session = SessionAudio::new(Rc::new(playback.clone()), prefs.clone());

        Self {
            scheduler,
            prefs,
            engine,
            playback,
            wake_lock: WakeLockCoordinator::new(NavigatorWakeLock::detect()),
            session,
            panel: RefCell::new(None),
        }
    }

    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        self.scheduler.clone()
    }

    pub fn panel(&self) -> Option<Rc<PanelController>> {
        self.panel.borrow().clone()
    }

    pub fn attach_panel(&self, panel: PanelController) {
        let previous = self.panel.borrow_mut().replace(Rc::new(panel));
        if let Some(old) = previous {
            old.dispose();
        }
    }

    pub fn detach_panel(&self) {
        let panel = self.panel.borrow_mut().take();
        if let Some(panel) = panel {
            panel.dispose();
        }
    }

    /// User gesture: unlock audio and keep the screen awake.
    pub fn unlock(&self) {
        self.playback.unlock();
        self.ensure_wake_lock();
    }

    pub fn ensure_wake_lock(&self) {
        let wake_lock = self.wake_lock.clone();
        wasm_bindgen_futures::spawn_local(async move {
            wake_lock.ensure().await;
        });
    }

    pub fn visibility_changed(&self, visible: bool) {
        let wake_lock = self.wake_lock.clone();
        wasm_bindgen_futures::spawn_local(async move {
            wake_lock.on_visibility_change(visible).await;
        });
    }

    pub fn phase_changed(&self, status: &str) {
        if self.session.on_phase_changed(status) == PhaseReaction::Active {
            self.ensure_wake_lock();
        }
    }

    /// Page is going away: stop sound, cancel timers, drop the lock.
    pub fn teardown(&self) {
        self.detach_panel();
        self.engine.dispose();
        let wake_lock = self.wake_lock.clone();
        wasm_bindgen_futures::spawn_local(async move {
            wake_lock.dispose().await;
        });
    }
}

pub fn install(runtime: Runtime) -> Rc<Runtime> {
    let runtime = Rc::new(runtime);
    RUNTIME.with(|r| *r.borrow_mut() = Some(runtime.clone()));
    runtime
}

/// Run `f` against the installed runtime. The `Rc` is cloned out first so
/// `f` may itself call back into `with`.
pub fn with<R>(f: impl FnOnce(&Runtime) -> R) -> Option<R> {
    let runtime = RUNTIME.with(|r| r.borrow().clone())?;
    Some(f(&runtime))
}
