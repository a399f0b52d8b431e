//! Binds `[data-countdown]` elements to countdown timers and keeps the set in
//! step with the server-rendered DOM.

use crate::state::{self, Runtime};
use focusroom_core::settings::TIMER_ANIMATION_CLASS;
use focusroom_core::{ClockFace, CountdownTimer, TimerDisplay, TimerMount};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, MutationObserver, MutationObserverInit, MutationRecord};

pub const TIMER_SELECTOR: &str = "[data-countdown]";
const WATCHED_ATTRIBUTES: [&str; 3] = ["data-seconds-remaining", "data-phase", "data-autostart"];

struct MountedTimer {
    element: Element,
    timer: CountdownTimer,
}

thread_local! {
    static TIMERS: RefCell<Vec<MountedTimer>> = const { RefCell::new(Vec::new()) };
    static OBSERVER: RefCell<Option<(MutationObserver, Closure<dyn FnMut(js_sys::Array)>)>> =
        const { RefCell::new(None) };
}

/// Writes the clock into the element's minute/second segments, or into the
/// element itself when it has none.
struct ElementDisplay {
    element: Element,
}

impl ElementDisplay {
    fn segment(&self, unit: &str) -> Option<Element> {
        self.element
            .query_selector(&format!("[data-unit=\"{unit}\"]"))
            .ok()
            .flatten()
    }
}

impl TimerDisplay for ElementDisplay {
    fn render(&self, face: ClockFace) {
        let minutes = self.segment("minutes");
        let seconds = self.segment("seconds");
        if minutes.is_none() && seconds.is_none() {
            self.element.set_text_content(Some(&face.to_string()));
            return;
        }
        if let Some(m) = minutes {
            m.set_text_content(Some(&face.minutes.to_string()));
        }
        if let Some(s) = seconds {
            s.set_text_content(Some(&face.seconds_text()));
        }
    }

    fn set_page_title(&self, title: &str) {
        if let Some(doc) = web_sys::window().and_then(|w| w.document()) {
            doc.set_title(title);
        }
    }
}

fn read_mount(element: &Element) -> Result<TimerMount, focusroom_core::MountError> {
    let id = element.id();
    let id = (!id.is_empty()).then_some(id);
    TimerMount::from_attributes(id.as_deref(), |name| element.get_attribute(name))
}

fn mount_timer(rt: &Runtime, element: Element) -> Option<MountedTimer> {
    let mount = match read_mount(&element) {
        Ok(mount) => mount,
        Err(e) => {
            log::warn!("Skipping countdown element: {e}");
            return None;
        }
    };
    if rt.prefs.timer_animation() {
        let _ = element.class_list().add_1(TIMER_ANIMATION_CLASS);
    }

    let playback = rt.playback.clone();
    let timer = CountdownTimer::mount(
        mount,
        Box::new(ElementDisplay {
            element: element.clone(),
        }),
        rt.scheduler(),
        Rc::new(move || playback.alert()),
    );
    log::info!(
        "Countdown mounted at {}s{}",
        mount.seconds,
        if mount.is_break { " (break)" } else { "" }
    );
    Some(MountedTimer { element, timer })
}

/// Drop timers whose element left the page and mount newly added elements.
/// Existing timers are left alone; only attribute changes resync them.
fn sync_mounts(rt: &Runtime) {
    let Some(doc) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let found = match doc.query_selector_all(TIMER_SELECTOR) {
        Ok(list) => list,
        Err(e) => {
            log::error!("Countdown query failed: {:?}", e);
            return;
        }
    };

    // Unmount before mounting so a replaced element hands the title over cleanly.
    let removed: Vec<MountedTimer> = TIMERS.with(|t| {
        let mut timers = t.borrow_mut();
        let (gone, kept): (Vec<_>, Vec<_>) =
            timers.drain(..).partition(|m| !m.element.is_connected());
        *timers = kept;
        gone
    });
    drop(removed);

    let mut added = Vec::new();
    for i in 0..found.length() {
        let Some(element) = found.item(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
            continue;
        };
        let known = TIMERS.with(|t| t.borrow().iter().any(|m| m.element == element));
        if !known {
            added.extend(mount_timer(rt, element));
        }
    }
    TIMERS.with(|t| t.borrow_mut().extend(added));
}

fn resync(element: &Element) {
    let mount = match read_mount(element) {
        Ok(mount) => mount,
        Err(e) => {
            log::warn!("Ignoring countdown update: {e}");
            return;
        }
    };
    TIMERS.with(|t| {
        if let Some(m) = t.borrow().iter().find(|m| &m.element == element) {
            m.timer.update(mount);
        }
    });
}

/// Child-list changes under a mounted timer are its own segment redraws.
fn inside_mounted_timer(node: &web_sys::Node) -> bool {
    TIMERS.with(|t| t.borrow().iter().any(|m| m.element.contains(Some(node))))
}

fn on_mutations(records: js_sys::Array) {
    let mut structural = false;
    for record in records.iter() {
        let Ok(record) = record.dyn_into::<MutationRecord>() else {
            continue;
        };
        if record.type_() == "attributes" {
            if let Some(element) = record.target().and_then(|n| n.dyn_into::<Element>().ok()) {
                resync(&element);
            }
        } else if !structural {
            structural = record
                .target()
                .is_some_and(|target| !inside_mounted_timer(&target));
        }
    }
    if structural {
        state::with(sync_mounts);
    }
}

/// Mount every timer on the page and watch for server updates.
pub fn start(rt: &Runtime) -> Result<(), JsValue> {
    sync_mounts(rt);

    let body = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.body())
        .ok_or_else(|| JsValue::from_str("no document body"))?;

    let cb = Closure::<dyn FnMut(js_sys::Array)>::new(on_mutations);
    let observer = MutationObserver::new(cb.as_ref().unchecked_ref())?;
    let filter: js_sys::Array = WATCHED_ATTRIBUTES.iter().map(|a| JsValue::from_str(a)).collect();
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    init.set_attributes(true);
    init.set_attribute_filter(&filter);
    observer.observe_with_options(&body, &init)?;

    OBSERVER.with(|o| *o.borrow_mut() = Some((observer, cb)));
    TIMERS.with(|t| log::info!("Watching {} countdown(s)", t.borrow().len()));
    Ok(())
}

/// Disconnect the observer and unmount every timer.
pub fn stop() {
    if let Some((observer, _cb)) = OBSERVER.with(|o| o.borrow_mut().take()) {
        observer.disconnect();
    }
    let timers = TIMERS.with(|t| std::mem::take(&mut *t.borrow_mut()));
    drop(timers);
}

/// Toggle the animation class on every timer element.
pub fn set_animation_class(enabled: bool) {
    let Some(doc) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let Ok(list) = doc.query_selector_all(TIMER_SELECTOR) else {
        return;
    };
    for i in 0..list.length() {
        let Some(element) = list.item(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
            continue;
        };
        let classes = element.class_list();
        let result = if enabled {
            classes.add_1(TIMER_ANIMATION_CLASS)
        } else {
            classes.remove_1(TIMER_ANIMATION_CLASS)
        };
        if let Err(e) = result {
            log::warn!("Failed to toggle {TIMER_ANIMATION_CLASS}: {:?}", e);
        }
    }
}
