//! Platform-neutral core of the Focus Room client: audio graph, countdown
//! synchronization, wake lock, preferences and the settings panel.
//!
//! Browser capabilities sit behind traits ([`AudioBackend`], [`Scheduler`],
//! [`WakeLockApi`], [`KeyValueStore`], [`TimerDisplay`], [`PanelView`]) so the
//! state machines run and test on the host.

pub mod audio_engine;
pub mod countdown;
pub mod prefs;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod sound;
pub mod wake_lock;

pub use audio_engine::{AmbientControl, AudioBackend, AudioEngine, AudioError, ContextState};
pub use countdown::{ClockFace, CountdownTimer, MountError, ResyncPolicy, TimerDisplay, TimerMount};
pub use prefs::{KeyValueStore, MemoryStore, PreferenceError, PreferenceStore};
pub use scheduler::{Scheduler, TimerId};
pub use session::{ClientEvent, PhaseChanged, PhaseReaction, SessionAudio};
pub use settings::{PanelMode, PanelState, PanelView, SettingsPanel};
pub use sound::{AmbientSoundId, InvalidVolume, VolumeLevel};
pub use wake_lock::{WakeLockApi, WakeLockCoordinator, WakeLockError, WakeLockSentinel};
