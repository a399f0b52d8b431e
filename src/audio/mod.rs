pub mod web_audio;

use focusroom_core::{AmbientControl, AmbientSoundId, AudioEngine, InvalidVolume, VolumeLevel};
use web_audio::WebAudioBackend;

pub type Engine = AudioEngine<WebAudioBackend>;

/// Runs engine playback as detached tasks so event handlers never wait on
/// context resume or decoding. Each task logs its own failures.
#[derive(Clone)]
pub struct DetachedPlayback {
    engine: Engine,
}

impl DetachedPlayback {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn alert(&self) {
        let engine = self.engine.clone();
        wasm_bindgen_futures::spawn_local(async move {
            engine.play_alert().await;
        });
    }

    /// User gesture: resume the context (iOS re-suspends it after
    /// interruptions) and fetch any sound not cached yet.
    pub fn unlock(&self) {
        let engine = self.engine.clone();
        wasm_bindgen_futures::spawn_local(async move {
            engine.initialize().await;
        });
    }
}

impl AmbientControl for DetachedPlayback {
    fn play_ambient(&self, id: AmbientSoundId) {
        let engine = self.engine.clone();
        wasm_bindgen_futures::spawn_local(async move {
            engine.play_ambient(id).await;
        });
    }

    fn stop_ambient(&self, fade_ms: u32) {
        self.engine.stop_ambient(fade_ms);
    }

    fn set_volume(&self, level: i64) -> Result<VolumeLevel, InvalidVolume> {
        self.engine.set_volume(level)
    }
}
