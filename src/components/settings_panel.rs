use crate::components::timer;
use crate::state::{self, PanelController};
use focusroom_core::{AmbientSoundId, PanelMode, PanelView, VolumeLevel};
use leptos::prelude::*;
use std::rc::Rc;
use wasm_bindgen::JsCast;

pub const PANEL_ROOT_ID: &str = "settings-panel-root";

/// Reactive widget state the panel controller drives.
#[derive(Clone, Copy)]
pub struct PanelSignals {
    visible: RwSignal<bool>,
    open: RwSignal<bool>,
    sound: RwSignal<AmbientSoundId>,
    volume: RwSignal<u8>,
    animated: RwSignal<bool>,
}

impl PanelSignals {
    fn new() -> Self {
        Self {
            visible: RwSignal::new(false),
            open: RwSignal::new(false),
            sound: RwSignal::new(AmbientSoundId::None),
            volume: RwSignal::new(VolumeLevel::DEFAULT.get()),
            animated: RwSignal::new(true),
        }
    }
}

impl PanelView for PanelSignals {
    fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }

    fn set_open(&self, open: bool) {
        self.open.set(open);
    }

    fn highlight_sound(&self, id: AmbientSoundId) {
        self.sound.set(id);
    }

    fn set_volume(&self, level: VolumeLevel) {
        self.volume.set(level.get());
    }

    fn set_animation_checked(&self, enabled: bool) {
        self.animated.set(enabled);
    }

    fn set_timer_animation(&self, enabled: bool) {
        timer::set_animation_class(enabled);
    }
}

fn with_panel(f: impl FnOnce(&PanelController)) {
    let panel: Option<Rc<PanelController>> = state::with(|rt| rt.panel()).flatten();
    match panel {
        Some(panel) => f(&panel),
        None => log::warn!("Settings panel used before it was attached"),
    }
}

fn sound_opt_class(active: bool) -> &'static str {
    if active { "sound-opt sel" } else { "sound-opt" }
}

/// Open the panel from any `[data-open-settings]` control.
pub fn open() {
    with_panel(|p| p.open());
}

#[component]
pub fn SettingsPanel(mode: PanelMode) -> impl IntoView {
    let signals = PanelSignals::new();
    let attached = state::with(|rt| {
        rt.attach_panel(PanelController::mount(
            signals,
            rt.prefs.clone(),
            Rc::new(rt.playback.clone()),
            rt.scheduler(),
            mode,
        ));
    });
    if attached.is_none() {
        log::error!("Settings panel mounted without a runtime");
    }
    on_cleanup(|| {
        state::with(|rt| rt.detach_panel());
    });

    let on_volume = move |ev: web_sys::Event| {
        let Some(target) = ev.target() else { return };
        let input: web_sys::HtmlInputElement = target.unchecked_into();
        with_panel(|p| p.change_volume(&input.value()));
    };

    let on_animation = move |ev: web_sys::Event| {
        let Some(target) = ev.target() else { return };
        let input: web_sys::HtmlInputElement = target.unchecked_into();
        let checked = input.checked();
        with_panel(|p| p.toggle_animation(checked));
    };

    view! {
        <div
            class=move || if signals.open.get() { "settings-backdrop open" } else { "settings-backdrop" }
            style:display=move || if signals.visible.get() { "block" } else { "none" }
            on:click=move |_| with_panel(|p| p.close())
        >
            <div
                class=move || if signals.open.get() { "settings-panel open" } else { "settings-panel" }
                role="dialog"
                on:click=|ev: web_sys::MouseEvent| ev.stop_propagation()
            >
                <div class="settings-header">
                    <span class="settings-title">"Settings"</span>
                    <button class="settings-close" title="Close" on:click=move |_| with_panel(|p| p.close())>
                        "\u{00d7}"
                    </button>
                </div>

                <div class="setting-group">
                    <div class="setting-group-title">
                        {match mode {
                            PanelMode::Preview => "Ambient sound (preview)",
                            PanelMode::Live => "Ambient sound",
                        }}
                    </div>
                    <div class="sound-options">
                        {AmbientSoundId::ALL.iter().map(|&id| view! {
                            <button
                                class=move || sound_opt_class(signals.sound.get() == id)
                                data-sound=id.as_str()
                                on:click=move |_| with_panel(|p| p.select_sound(id))
                            >{id.label()}</button>
                        }).collect_view()}
                    </div>
                </div>

                <div class="setting-group">
                    <div class="setting-row">
                        <span class="setting-label">"Volume"</span>
                        <input
                            type="range"
                            min="0"
                            max=VolumeLevel::MAX.get().to_string()
                            step="1"
                            class="setting-range"
                            prop:value=move || signals.volume.get().to_string()
                            on:input=on_volume
                        />
                        <span class="setting-value">{move || format!("{}%", signals.volume.get())}</span>
                    </div>
                </div>

                <div class="setting-group">
                    <div class="setting-row">
                        <span class="setting-label">"Animate timer"</span>
                        <input
                            type="checkbox"
                            class="setting-checkbox"
                            prop:checked=move || signals.animated.get()
                            on:change=on_animation
                        />
                    </div>
                </div>
            </div>
        </div>
    }
}

/// Mount the panel into `#settings-panel-root`, if the page has one.
pub fn mount() {
    let Some(doc) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let Some(root) = doc.get_element_by_id(PANEL_ROOT_ID) else {
        log::info!("No #{PANEL_ROOT_ID}; settings panel disabled");
        return;
    };
    let mode = PanelMode::from_attr(root.get_attribute("data-mode").as_deref());
    let root: web_sys::HtmlElement = match root.dyn_into() {
        Ok(el) => el,
        Err(_) => {
            log::error!("#{PANEL_ROOT_ID} is not an HTML element");
            return;
        }
    };
    leptos::mount::mount_to(root, move || view! { <SettingsPanel mode=mode /> }).forget();
    log::info!("Settings panel mounted ({mode:?})");
}
