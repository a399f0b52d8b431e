//! Settings panel state machine: open/close transitions, preference
//! reflection, sound preview and volume forwarding.

use crate::audio_engine::AmbientControl;
use crate::prefs::PreferenceStore;
use crate::scheduler::{PendingTimeout, Scheduler};
use crate::sound::{AmbientSoundId, VolumeLevel};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub const PANEL_ANIMATION_MS: u32 = 300;
pub const PREVIEW_STOP_DELAY_MS: u32 = 3000;
pub const PREVIEW_FADE_MS: u32 = 2000;
pub const TIMER_ANIMATION_CLASS: &str = "timer-animated";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelMode {
    /// Lobby: selections play a short preview that fades out.
    Preview,
    /// Running session: selections play until changed.
    Live,
}

impl PanelMode {
    pub fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some("live") => PanelMode::Live,
            _ => PanelMode::Preview,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelState {
    Closed,
    Opening,
    Open,
    Closing,
}

pub trait PanelView {
    /// Show or remove the panel from layout.
    fn set_visible(&self, visible: bool);
    /// Toggle the open state class that drives the slide/fade transition.
    fn set_open(&self, open: bool);
    fn highlight_sound(&self, id: AmbientSoundId);
    fn set_volume(&self, level: VolumeLevel);
    fn set_animation_checked(&self, enabled: bool);
    /// Toggle [`TIMER_ANIMATION_CLASS`] on every timer element on the page.
    fn set_timer_animation(&self, enabled: bool);
}

struct PanelCore<V> {
    view: V,
    prefs: PreferenceStore,
    audio: Rc<dyn AmbientControl>,
    mode: PanelMode,
    state: PanelState,
    transition: Option<PendingTimeout>,
    preview_stop: Option<PendingTimeout>,
}

pub struct SettingsPanel<V: PanelView> {
    core: Rc<RefCell<PanelCore<V>>>,
    scheduler: Rc<dyn Scheduler>,
}

impl<V: PanelView + 'static> SettingsPanel<V> {
    /// Build the controller and reflect stored preferences into the widgets.
    pub fn mount(
        view: V,
        prefs: PreferenceStore,
        audio: Rc<dyn AmbientControl>,
        scheduler: Rc<dyn Scheduler>,
        mode: PanelMode,
    ) -> Self {
        view.highlight_sound(prefs.ambient_sound());
        view.set_volume(prefs.volume());
        let animated = prefs.timer_animation();
        view.set_animation_checked(animated);
        view.set_timer_animation(animated);
        view.set_open(false);
        view.set_visible(false);

        Self {
            core: Rc::new(RefCell::new(PanelCore {
                view,
                prefs,
                audio,
                mode,
                state: PanelState::Closed,
                transition: None,
                preview_stop: None,
            })),
            scheduler,
        }
    }

    pub fn state(&self) -> PanelState {
        self.core.borrow().state
    }

    pub fn mode(&self) -> PanelMode {
        self.core.borrow().mode
    }

    pub fn open(&self) {
        let mut c = self.core.borrow_mut();
        if matches!(c.state, PanelState::Open | PanelState::Opening) {
            return;
        }
        if let Some(t) = c.transition.take() {
            t.cancel(&*self.scheduler);
        }
        c.view.set_visible(true);
        c.view.set_open(true);
        c.state = PanelState::Opening;
        c.transition = self.after_animation(|core| {
            core.state = PanelState::Open;
        });
    }

    /// Close control or backdrop click.
    pub fn close(&self) {
        let mut c = self.core.borrow_mut();
        if matches!(c.state, PanelState::Closed | PanelState::Closing) {
            return;
        }
        if let Some(t) = c.transition.take() {
            t.cancel(&*self.scheduler);
        }
        c.view.set_open(false);
        c.state = PanelState::Closing;
        c.transition = self.after_animation(|core| {
            core.view.set_visible(false);
            core.state = PanelState::Closed;
        });
    }

    pub fn select_sound(&self, id: AmbientSoundId) {
        let mut c = self.core.borrow_mut();
        c.prefs.set_ambient_sound(id);
        c.view.highlight_sound(id);
        if let Some(t) = c.preview_stop.take() {
            t.cancel(&*self.scheduler);
        }

        if id.is_none() {
            c.audio.stop_ambient(0);
            return;
        }
        c.audio.play_ambient(id);

        if c.mode == PanelMode::Preview {
            let weak = Rc::downgrade(&self.core);
            c.preview_stop = PendingTimeout::schedule(
                &*self.scheduler,
                PREVIEW_STOP_DELAY_MS,
                Box::new(move || {
                    if let Some(core) = weak.upgrade() {
                        let mut c = core.borrow_mut();
                        c.preview_stop = None;
                        c.audio.stop_ambient(PREVIEW_FADE_MS);
                    }
                }),
            );
        }
    }

    /// Slider input. Valid levels are forwarded and persisted; anything else
    /// snaps the slider back to the current level.
    pub fn change_volume(&self, raw: &str) {
        let c = self.core.borrow();
        let applied = match raw.trim().parse::<i64>() {
            Ok(level) => c.audio.set_volume(level).ok(),
            Err(_) => {
                log::warn!("Ignoring volume input {raw:?}");
                None
            }
        };
        match applied {
            Some(level) => c.prefs.set_volume(level),
            None => c.view.set_volume(c.prefs.volume()),
        }
    }

    pub fn toggle_animation(&self, enabled: bool) {
        let c = self.core.borrow();
        c.prefs.set_timer_animation(enabled);
        c.view.set_animation_checked(enabled);
        c.view.set_timer_animation(enabled);
    }

    /// Cancel pending transition and preview timers.
    pub fn dispose(&self) {
        let mut c = self.core.borrow_mut();
        for pending in [c.transition.take(), c.preview_stop.take()].into_iter().flatten() {
            pending.cancel(&*self.scheduler);
        }
    }

    fn after_animation(
        &self,
        finish: impl FnOnce(&mut PanelCore<V>) + 'static,
    ) -> Option<PendingTimeout> {
        let weak: Weak<RefCell<PanelCore<V>>> = Rc::downgrade(&self.core);
        PendingTimeout::schedule(
            &*self.scheduler,
            PANEL_ANIMATION_MS,
            Box::new(move || {
                if let Some(core) = weak.upgrade() {
                    let mut c = core.borrow_mut();
                    c.transition = None;
                    finish(&mut *c);
                }
            }),
        )
    }
}
