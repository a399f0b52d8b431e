//! Browser runtime for Focus Room sessions. Wires the platform-neutral core
//! to the page: DOM listeners, Web Audio, sessionStorage and the wake lock.

pub mod audio;
pub mod components;
pub mod platform;
pub mod state;

use focusroom_core::{KeyValueStore, MemoryStore};
use platform::SessionStore;
use state::Runtime;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Element;

const UNLOCK_EVENTS: [&str; 3] = ["pointerdown", "keydown", "touchend"];
const OPEN_SETTINGS_SELECTOR: &str = "[data-open-settings]";
const COPY_TEXT_SELECTOR: &str = "[data-copy-text]";

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    if let Err(e) = boot() {
        log::error!("Focus Room runtime failed to start: {:?}", e);
    }
}

fn boot() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let store: Rc<dyn KeyValueStore> = match SessionStore::open() {
        Ok(store) => Rc::new(store),
        Err(e) => {
            log::warn!("{e}; preferences last for this page only");
            Rc::new(MemoryStore::new())
        }
    };
    let rt = state::install(Runtime::new(store));

    listen(&document, &UNLOCK_EVENTS, |_| {
        state::with(|rt| rt.unlock());
    })?;
    listen(&document, &["visibilitychange"], |_| {
        let visible = web_sys::window()
            .and_then(|w| w.document())
            .is_some_and(|d| d.visibility_state() == web_sys::VisibilityState::Visible);
        state::with(|rt| rt.visibility_changed(visible));
    })?;
    listen(&document, &["click"], on_document_click)?;
    listen(&window, &["pagehide"], |_| {
        components::timer::stop();
        state::with(|rt| rt.teardown());
    })?;
    platform::events::on_phase_changed(|detail| {
        state::with(|rt| rt.phase_changed(&detail.status));
    })?;

    components::settings_panel::mount();
    components::timer::start(&rt)?;
    log::info!("Focus Room runtime ready");
    Ok(())
}

/// Attach `handler` for each event type. Listeners live as long as the page.
fn listen(
    target: &web_sys::EventTarget,
    events: &[&str],
    handler: impl Fn(web_sys::Event) + 'static,
) -> Result<(), JsValue> {
    let cb = Closure::<dyn Fn(web_sys::Event)>::new(handler);
    for event in events {
        target.add_event_listener_with_callback(event, cb.as_ref().unchecked_ref())?;
    }
    cb.forget();
    Ok(())
}

/// Delegated clicks for open-settings controls and copy buttons.
fn on_document_click(ev: web_sys::Event) {
    let Some(target) = ev.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
        return;
    };

    if let Ok(Some(_)) = target.closest(OPEN_SETTINGS_SELECTOR) {
        ev.prevent_default();
        components::settings_panel::open();
        return;
    }

    if let Ok(Some(button)) = target.closest(COPY_TEXT_SELECTOR) {
        let text = button.get_attribute("data-copy-text").unwrap_or_default();
        if text.is_empty() {
            log::warn!("Copy button without text");
            return;
        }
        wasm_bindgen_futures::spawn_local(platform::clipboard::copy_text(text));
    }
}
