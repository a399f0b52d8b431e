use focusroom_core::scheduler::{RepeatingTask, Task};
use focusroom_core::{Scheduler, TimerId};
use std::cell::RefCell;
use std::collections::HashMap;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// `setTimeout` / `setInterval` on the window.
#[derive(Default)]
pub struct BrowserScheduler {
    // Interval closures must outlive every tick; dropped on clear.
    intervals: RefCell<HashMap<i32, Closure<dyn FnMut()>>>,
}

impl BrowserScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for BrowserScheduler {
    fn set_timeout(&self, delay_ms: u32, task: Task) -> Option<TimerId> {
        let win = web_sys::window()?;
        let cb = Closure::once_into_js(move || task());
        match win.set_timeout_with_callback_and_timeout_and_arguments_0(
            cb.unchecked_ref(),
            delay_ms as i32,
        ) {
            Ok(id) => Some(TimerId(id)),
            Err(e) => {
                log::warn!("setTimeout failed: {:?}", e);
                None
            }
        }
    }

    fn clear_timeout(&self, id: TimerId) {
        if let Some(win) = web_sys::window() {
            win.clear_timeout_with_handle(id.0);
        }
    }

    fn set_interval(&self, period_ms: u32, task: RepeatingTask) -> Option<TimerId> {
        let win = web_sys::window()?;
        let mut task = task;
        let cb = Closure::<dyn FnMut()>::new(move || task());
        match win.set_interval_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            period_ms as i32,
        ) {
            Ok(id) => {
                self.intervals.borrow_mut().insert(id, cb);
                Some(TimerId(id))
            }
            Err(e) => {
                log::warn!("setInterval failed: {:?}", e);
                None
            }
        }
    }

    fn clear_interval(&self, id: TimerId) {
        if let Some(win) = web_sys::window() {
            win.clear_interval_with_handle(id.0);
        }
        self.intervals.borrow_mut().remove(&id.0);
    }
}
