//! Custom DOM events exchanged with the server-driven page.

use focusroom_core::{ClientEvent, PhaseChanged};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CustomEvent, CustomEventInit};

pub const CLIENT_EVENT: &str = "focusroom:client-event";
pub const PHASE_CHANGED_EVENT: &str = "focusroom:phase_changed";

/// Dispatch `event` on the window as a `CustomEvent` whose detail is the
/// event's JSON form.
pub fn push(event: &ClientEvent) {
    let json = match event.to_json() {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to encode {}: {e}", event.name());
            return;
        }
    };
    let Some(window) = web_sys::window() else {
        return;
    };

    let init = CustomEventInit::new();
    match js_sys::JSON::parse(&json) {
        Ok(detail) => init.set_detail(&detail),
        Err(e) => {
            log::error!("Failed to build detail for {}: {:?}", event.name(), e);
            return;
        }
    }
    let custom = match CustomEvent::new_with_event_init_dict(CLIENT_EVENT, &init) {
        Ok(ev) => ev,
        Err(e) => {
            log::error!("CustomEvent construction failed: {:?}", e);
            return;
        }
    };
    if let Err(e) = window.dispatch_event(&custom) {
        log::error!("Failed to dispatch {}: {:?}", event.name(), e);
    } else {
        log::debug!("Pushed {json}");
    }
}

/// Parse the detail of an inbound phase event. `None` when it carries no
/// usable status.
pub fn phase_detail(ev: &web_sys::Event) -> Option<PhaseChanged> {
    let custom: &CustomEvent = ev.dyn_ref()?;
    let text = js_sys::JSON::stringify(&custom.detail()).ok()?;
    let text: String = text.into();
    match serde_json::from_str::<PhaseChanged>(&text) {
        Ok(detail) => Some(detail),
        Err(e) => {
            log::warn!("Ignoring phase event with detail {text}: {e}");
            None
        }
    }
}

/// Listen on the window for server phase changes. The listener lives for
/// the page's lifetime.
pub fn on_phase_changed(handler: impl Fn(PhaseChanged) + 'static) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let cb = Closure::<dyn Fn(web_sys::Event)>::new(move |ev: web_sys::Event| {
        if let Some(detail) = phase_detail(&ev) {
            handler(detail);
        }
    });
    window.add_event_listener_with_callback(PHASE_CHANGED_EVENT, cb.as_ref().unchecked_ref())?;
    cb.forget();
    Ok(())
}
