//! `navigator.wakeLock`, reached through `Reflect` so feature detection is a
//! plain property probe.

use focusroom_core::{WakeLockApi, WakeLockError, WakeLockSentinel};
use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

fn call_method(target: &JsValue, name: &str, arg: Option<&JsValue>) -> Result<Promise, JsValue> {
    let method: Function = Reflect::get(target, &JsValue::from_str(name))?.dyn_into()?;
    let result = match arg {
        Some(arg) => method.call1(target, arg)?,
        None => method.call0(target)?,
    };
    result.dyn_into::<Promise>().map_err(JsValue::from)
}

pub struct ScreenSentinel {
    inner: JsValue,
}

impl WakeLockSentinel for ScreenSentinel {
    fn released(&self) -> bool {
        Reflect::get(&self.inner, &JsValue::from_str("released"))
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }

    async fn release(&self) -> Result<(), WakeLockError> {
        let promise = call_method(&self.inner, "release", None)
            .map_err(|e| WakeLockError::Release(format!("{:?}", e)))?;
        JsFuture::from(promise)
            .await
            .map_err(|e| WakeLockError::Release(format!("{:?}", e)))?;
        Ok(())
    }
}

pub struct NavigatorWakeLock {
    wake_lock: Option<JsValue>,
}

impl NavigatorWakeLock {
    pub fn detect() -> Self {
        let wake_lock = web_sys::window()
            .map(|w| w.navigator())
            .and_then(|nav| Reflect::get(&nav, &JsValue::from_str("wakeLock")).ok())
            .filter(|v| !v.is_undefined() && !v.is_null());
        if wake_lock.is_none() {
            log::info!("Screen Wake Lock API not available");
        }
        Self { wake_lock }
    }
}

impl WakeLockApi for NavigatorWakeLock {
    type Sentinel = ScreenSentinel;

    fn is_supported(&self) -> bool {
        self.wake_lock.is_some()
    }

    async fn request(&self) -> Result<ScreenSentinel, WakeLockError> {
        let wake_lock = self
            .wake_lock
            .as_ref()
            .ok_or_else(|| WakeLockError::Rejected("unsupported".to_string()))?;
        let promise = call_method(wake_lock, "request", Some(&JsValue::from_str("screen")))
            .map_err(|e| WakeLockError::Rejected(format!("{:?}", e)))?;
        let inner = JsFuture::from(promise)
            .await
            .map_err(|e| WakeLockError::Rejected(format!("{:?}", e)))?;
        Ok(ScreenSentinel { inner })
    }
}
