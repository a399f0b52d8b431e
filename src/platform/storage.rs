use focusroom_core::{KeyValueStore, PreferenceError};

/// `window.sessionStorage`: cleared when the tab closes.
pub struct SessionStore {
    storage: web_sys::Storage,
}

impl SessionStore {
    pub fn open() -> Result<Self, PreferenceError> {
        let window = web_sys::window()
            .ok_or_else(|| PreferenceError::Unavailable("no window".to_string()))?;
        match window.session_storage() {
            Ok(Some(storage)) => Ok(Self { storage }),
            Ok(None) => Err(PreferenceError::Unavailable("sessionStorage missing".to_string())),
            Err(e) => Err(PreferenceError::Unavailable(format!("{:?}", e))),
        }
    }
}

impl KeyValueStore for SessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.storage
            .set_item(key, value)
            .map_err(|e| PreferenceError::Write {
                key: key.to_string(),
                detail: format!("{:?}", e),
            })
    }
}
