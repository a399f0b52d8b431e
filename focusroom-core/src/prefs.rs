//! Per-tab preferences: volume, ambient sound selection, timer animation.

use crate::sound::{AmbientSoundId, VolumeLevel};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const VOLUME_KEY: &str = "focusroom.volume";
pub const AMBIENT_SOUND_KEY: &str = "focusroom.ambient_sound";
pub const TIMER_ANIMATION_KEY: &str = "focusroom.timer_animation";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreferenceError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("failed to write {key}: {detail}")]
    Write { key: String, detail: String },
}

/// Session-scoped string storage (`window.sessionStorage` in the browser).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

/// Storage that lives only as long as the process. Used when the browser
/// refuses session storage (private mode quotas) and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed view over a [`KeyValueStore`]. Malformed stored values fall back to
/// defaults; write failures are logged and otherwise ignored.
#[derive(Clone)]
pub struct PreferenceStore {
    store: Rc<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(store: Rc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Rc::new(MemoryStore::new()))
    }

    pub fn volume(&self) -> VolumeLevel {
        self.store
            .get(VOLUME_KEY)
            .and_then(|raw| VolumeLevel::parse(&raw))
            .unwrap_or_default()
    }

    pub fn set_volume(&self, level: VolumeLevel) {
        self.write(VOLUME_KEY, &level.to_string());
    }

    pub fn ambient_sound(&self) -> AmbientSoundId {
        match self.store.get(AMBIENT_SOUND_KEY) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                log::warn!("Ignoring stored sound: {e}");
                AmbientSoundId::None
            }),
            None => AmbientSoundId::None,
        }
    }

    pub fn set_ambient_sound(&self, id: AmbientSoundId) {
        self.write(AMBIENT_SOUND_KEY, id.as_str());
    }

    pub fn timer_animation(&self) -> bool {
        match self.store.get(TIMER_ANIMATION_KEY).as_deref() {
            Some("false") => false,
            Some(_) | None => true,
        }
    }

    pub fn set_timer_animation(&self, enabled: bool) {
        self.write(TIMER_ANIMATION_KEY, if enabled { "true" } else { "false" });
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            log::warn!("Preference not saved: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, key: &str, _value: &str) -> Result<(), PreferenceError> {
            Err(PreferenceError::Write {
                key: key.to_string(),
                detail: "QuotaExceededError".to_string(),
            })
        }
    }

    #[test]
    fn test_defaults_when_empty() {
        let prefs = PreferenceStore::in_memory();
        assert_eq!(prefs.volume(), VolumeLevel::DEFAULT);
        assert_eq!(prefs.ambient_sound(), AmbientSoundId::None);
        assert!(prefs.timer_animation());
    }

    #[test]
    fn test_values_round_trip_through_store() {
        let prefs = PreferenceStore::in_memory();
        prefs.set_volume(VolumeLevel::new(80).unwrap());
        prefs.set_ambient_sound(AmbientSoundId::Cafe);
        prefs.set_timer_animation(false);

        assert_eq!(prefs.volume().get(), 80);
        assert_eq!(prefs.ambient_sound(), AmbientSoundId::Cafe);
        assert!(!prefs.timer_animation());
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let store = Rc::new(MemoryStore::new());
        store.set(VOLUME_KEY, "300").unwrap();
        store.set(AMBIENT_SOUND_KEY, "thunder").unwrap();
        let prefs = PreferenceStore::new(store);
        assert_eq!(prefs.volume(), VolumeLevel::DEFAULT);
        assert_eq!(prefs.ambient_sound(), AmbientSoundId::None);
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let prefs = PreferenceStore::new(Rc::new(ReadOnlyStore));
        prefs.set_volume(VolumeLevel::MAX);
        assert_eq!(prefs.volume(), VolumeLevel::DEFAULT);
    }
}
