use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Buffer name of the one-shot alert tone.
pub const ALERT_BUFFER: &str = "alert";
pub const ALERT_URL: &str = "/sounds/alert.mp3";

/// Looping ambient tracks the user can pick from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbientSoundId {
    /// Sentinel: ambient audio stopped.
    #[default]
    None,
    Rain,
    Cafe,
    WhiteNoise,
}

impl AmbientSoundId {
    /// Every selectable option, in panel order.
    pub const ALL: [AmbientSoundId; 4] = [
        AmbientSoundId::None,
        AmbientSoundId::Rain,
        AmbientSoundId::Cafe,
        AmbientSoundId::WhiteNoise,
    ];

    /// Sounds backed by a looped buffer (everything but `None`).
    pub const PLAYABLE: [AmbientSoundId; 3] = [
        AmbientSoundId::Rain,
        AmbientSoundId::Cafe,
        AmbientSoundId::WhiteNoise,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AmbientSoundId::None => "none",
            AmbientSoundId::Rain => "rain",
            AmbientSoundId::Cafe => "cafe",
            AmbientSoundId::WhiteNoise => "white_noise",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AmbientSoundId::None => "Off",
            AmbientSoundId::Rain => "Rain",
            AmbientSoundId::Cafe => "Café",
            AmbientSoundId::WhiteNoise => "White noise",
        }
    }

    /// Asset path of the looped track, `None` for the sentinel.
    pub fn asset_url(self) -> Option<&'static str> {
        match self {
            AmbientSoundId::None => None,
            AmbientSoundId::Rain => Some("/sounds/rain.mp3"),
            AmbientSoundId::Cafe => Some("/sounds/cafe.mp3"),
            AmbientSoundId::WhiteNoise => Some("/sounds/white_noise.mp3"),
        }
    }

    pub fn is_none(self) -> bool {
        self == AmbientSoundId::None
    }
}

impl fmt::Display for AmbientSoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ambient sound: {0:?}")]
pub struct UnknownSound(pub String);

impl FromStr for AmbientSoundId {
    type Err = UnknownSound;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AmbientSoundId::ALL
            .into_iter()
            .find(|id| id.as_str() == s.trim())
            .ok_or_else(|| UnknownSound(s.to_string()))
    }
}

/// Every buffer the engine loads on initialization, as `(name, url)`.
pub fn asset_manifest() -> Vec<(&'static str, &'static str)> {
    let mut assets = vec![(ALERT_BUFFER, ALERT_URL)];
    for id in AmbientSoundId::PLAYABLE {
        if let Some(url) = id.asset_url() {
            assets.push((id.as_str(), url));
        }
    }
    assets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("volume {0} is outside 0..=100")]
pub struct InvalidVolume(pub i64);

/// User volume, an integer percentage in `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct VolumeLevel(u8);

impl VolumeLevel {
    pub const MAX: VolumeLevel = VolumeLevel(100);
    pub const DEFAULT: VolumeLevel = VolumeLevel(50);

    /// Validate a raw level. Out-of-range input is rejected, never clamped.
    pub fn new(level: i64) -> Result<Self, InvalidVolume> {
        if (0..=100).contains(&level) {
            Ok(VolumeLevel(level as u8))
        } else {
            Err(InvalidVolume(level))
        }
    }

    /// Parse slider or storage text ("75", " 40 ").
    pub fn parse(text: &str) -> Option<Self> {
        let level = text.trim().parse::<i64>().ok()?;
        Self::new(level).ok()
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Linear gain in `0.0..=1.0`.
    pub fn gain(self) -> f32 {
        self.0 as f32 / 100.0
    }
}

impl Default for VolumeLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for VolumeLevel {
    type Error = InvalidVolume;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<VolumeLevel> for u8 {
    fn from(level: VolumeLevel) -> Self {
        level.0
    }
}

impl fmt::Display for VolumeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
