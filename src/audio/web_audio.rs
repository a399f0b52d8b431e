use focusroom_core::{AudioBackend, AudioError, ContextState};
use std::cell::{Cell, RefCell};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AudioBuffer, AudioBufferSourceNode, AudioContext, AudioContextState, GainNode};

struct Graph {
    ctx: AudioContext,
    master: GainNode,
}

/// A looping source and the fade stage between it and the master gain.
pub struct AmbientVoice {
    source: AudioBufferSourceNode,
    gain: GainNode,
}

/// Web Audio output graph. The context is created on first use, which the
/// engine only triggers from inside a user gesture.
pub struct WebAudioBackend {
    graph: RefCell<Option<Graph>>,
    master_level: Cell<f32>,
}

impl WebAudioBackend {
    pub fn new() -> Self {
        Self {
            graph: RefCell::new(None),
            master_level: Cell::new(1.0),
        }
    }

    fn graph(&self) -> Result<(AudioContext, GainNode), AudioError> {
        if let Some(g) = self.graph.borrow().as_ref() {
            return Ok((g.ctx.clone(), g.master.clone()));
        }

        let ctx = AudioContext::new()
            .map_err(|e| AudioError::ContextUnavailable(format!("{:?}", e)))?;
        let master = ctx
            .create_gain()
            .map_err(|e| AudioError::ContextUnavailable(format!("{:?}", e)))?;
        master.gain().set_value(self.master_level.get());
        master
            .connect_with_audio_node(&ctx.destination())
            .map_err(|e| AudioError::ContextUnavailable(format!("{:?}", e)))?;
        log::info!("AudioContext created at {} Hz", ctx.sample_rate());

        *self.graph.borrow_mut() = Some(Graph {
            ctx: ctx.clone(),
            master: master.clone(),
        });
        Ok((ctx, master))
    }

    fn now(&self) -> f64 {
        self.graph
            .borrow()
            .as_ref()
            .map(|g| g.ctx.current_time())
            .unwrap_or(0.0)
    }
}

impl Default for WebAudioBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn playback_err(e: wasm_bindgen::JsValue) -> AudioError {
    AudioError::Playback(format!("{:?}", e))
}

impl AudioBackend for WebAudioBackend {
    type Buffer = AudioBuffer;
    type Voice = AmbientVoice;

    fn context_state(&self) -> ContextState {
        match self.graph() {
            Ok((ctx, _)) => match ctx.state() {
                AudioContextState::Running => ContextState::Running,
                AudioContextState::Closed => ContextState::Closed,
                _ => ContextState::Suspended,
            },
            Err(e) => {
                log::error!("{e}");
                ContextState::Closed
            }
        }
    }

    async fn resume(&self) -> Result<(), AudioError> {
        let (ctx, _) = self.graph()?;
        let promise = ctx
            .resume()
            .map_err(|e| AudioError::ResumeRejected(format!("{:?}", e)))?;
        JsFuture::from(promise)
            .await
            .map_err(|e| AudioError::ResumeRejected(format!("{:?}", e)))?;
        Ok(())
    }

    async fn load(&self, url: &str) -> Result<AudioBuffer, AudioError> {
        let fetch_err = |detail: String| AudioError::Fetch {
            url: url.to_string(),
            detail,
        };
        let decode_err = |detail: String| AudioError::Decode {
            url: url.to_string(),
            detail,
        };

        let window = web_sys::window().ok_or_else(|| fetch_err("no window".to_string()))?;
        let resp_js = JsFuture::from(window.fetch_with_str(url))
            .await
            .map_err(|e| fetch_err(format!("{:?}", e)))?;
        let resp: web_sys::Response = resp_js
            .dyn_into()
            .map_err(|_| fetch_err("not a Response".to_string()))?;
        if !resp.ok() {
            return Err(fetch_err(format!("HTTP {}", resp.status())));
        }

        let body = resp.array_buffer().map_err(|e| fetch_err(format!("{:?}", e)))?;
        let bytes: js_sys::ArrayBuffer = JsFuture::from(body)
            .await
            .map_err(|e| fetch_err(format!("{:?}", e)))?
            .dyn_into()
            .map_err(|_| fetch_err("body is not an ArrayBuffer".to_string()))?;

        let (ctx, _) = self.graph()?;
        let decoding = ctx
            .decode_audio_data(&bytes)
            .map_err(|e| decode_err(format!("{:?}", e)))?;
        let buffer: AudioBuffer = JsFuture::from(decoding)
            .await
            .map_err(|e| decode_err(format!("{:?}", e)))?
            .dyn_into()
            .map_err(|_| decode_err("not an AudioBuffer".to_string()))?;

        log::info!(
            "Decoded {}: {:.1}s, {} ch",
            url,
            buffer.duration(),
            buffer.number_of_channels()
        );
        Ok(buffer)
    }

    fn set_master_gain(&self, gain: f32) {
        self.master_level.set(gain);
        if let Some(g) = self.graph.borrow().as_ref() {
            g.master.gain().set_value(gain);
        }
    }

    fn play_once(&self, buffer: &AudioBuffer) -> Result<(), AudioError> {
        let (ctx, master) = self.graph()?;
        // Source nodes are single-use; a fresh one per alert.
        let source = ctx.create_buffer_source().map_err(playback_err)?;
        source.set_buffer(Some(buffer));
        source
            .connect_with_audio_node(&master)
            .map_err(playback_err)?;
        source.start().map_err(playback_err)?;
        Ok(())
    }

    fn start_loop(&self, buffer: &AudioBuffer) -> Result<AmbientVoice, AudioError> {
        let (ctx, master) = self.graph()?;
        let source = ctx.create_buffer_source().map_err(playback_err)?;
        source.set_buffer(Some(buffer));
        source.set_loop(true);

        let stage = ctx.create_gain().map_err(playback_err)?;
        stage.gain().set_value(1.0);

        source.connect_with_audio_node(&stage).map_err(playback_err)?;
        stage
            .connect_with_audio_node(&master)
            .map_err(playback_err)?;
        source.start().map_err(playback_err)?;

        Ok(AmbientVoice {
            source,
            gain: stage,
        })
    }

    fn ramp_voice_gain(&self, voice: &AmbientVoice, target: f32, duration_ms: u32) {
        let now = self.now();
        let param = voice.gain.gain();
        let _ = param.cancel_scheduled_values(now);
        // Anchor the ramp at the current value so it starts from here.
        let _ = param.set_value_at_time(param.value(), now);
        if let Err(e) = param.linear_ramp_to_value_at_time(target, now + duration_ms as f64 / 1000.0) {
            log::warn!("Gain ramp rejected: {:?}", e);
            param.set_value(target);
        }
    }

    fn stop_voice(&self, voice: AmbientVoice) {
        if let Err(e) = voice.source.stop() {
            log::warn!("Ambient source stop failed: {:?}", e);
        }
        let _ = voice.source.disconnect();
        let _ = voice.gain.disconnect();
    }
}
