//! Server phase events in, client acknowledgements out.

use crate::audio_engine::AmbientControl;
use crate::prefs::PreferenceStore;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Fade applied when the session leaves the work phase.
pub const PHASE_EXIT_FADE_MS: u32 = 2000;

/// `detail` of an inbound `phase_changed` event.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PhaseChanged {
    pub status: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseReaction {
    /// Work phase: ambient started (or already playing).
    Active,
    /// Anything else: ambient fading out.
    Inactive,
}

pub fn is_active_phase(status: &str) -> bool {
    matches!(status.trim(), "active" | "work")
}

/// Events the client pushes back to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    ContentCopied { text_length: usize },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::ContentCopied { .. } => "content_copied",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Starts or stops the ambient sound as the server moves between phases.
pub struct SessionAudio {
    audio: Rc<dyn AmbientControl>,
    prefs: PreferenceStore,
}

impl SessionAudio {
    pub fn new(audio: Rc<dyn AmbientControl>, prefs: PreferenceStore) -> Self {
        Self { audio, prefs }
    }

    pub fn on_phase_changed(&self, status: &str) -> PhaseReaction {
        if is_active_phase(status) {
            let sound = self.prefs.ambient_sound();
            if !sound.is_none() {
                self.audio.play_ambient(sound);
            }
            PhaseReaction::Active
        } else {
            log::info!("Phase {status:?}: fading ambient out");
            self.audio.stop_ambient(PHASE_EXIT_FADE_MS);
            PhaseReaction::Inactive
        }
    }
}
