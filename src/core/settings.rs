//=========================================================================
// Settings
//=========================================================================
//
// Process-wide scalars: display mode, brightness, data delay and the
// focus (gamecast) entity id.
//
// Every value arrives as text, either from the bus or from the control
// surface, and is validated here before anything else sees it. A value
// that fails validation is rejected and the previous setting is kept.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//=== SettingsError =======================================================

/// Rejections raised at the settings-apply boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("mode {0:?} not recognized")]
    UnknownMode(String),

    #[error("brightness {0:?} is not an integer")]
    InvalidBrightness(String),

    #[error("brightness level {0} outside 0..={max}", max = Brightness::MAX_LEVEL)]
    BrightnessOutOfRange(i64),

    #[error("delay {0:?} must be seconds, or p<N>/m<N> for a relative change")]
    InvalidDelay(String),

    #[error("focus id {0:?} is not an integer")]
    InvalidFocusId(String),

    #[error("focus id {id} out of range for {count} tracked games")]
    FocusOutOfRange { id: usize, count: usize },

    #[error("unknown setting {0:?}")]
    UnknownSetting(String),
}

//=== Mode ================================================================

/// Display layout currently active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Multi-game overview, two columns.
    #[default]
    Overview,
    /// Two games side by side.
    Dual,
    /// One column of games with matchup details.
    Detailed,
    /// Side list of games plus one large focus game.
    Gamecast,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Overview, Mode::Dual, Mode::Detailed, Mode::Gamecast];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Overview => "overview",
            Mode::Dual => "dual",
            Mode::Detailed => "detailed",
            Mode::Gamecast => "gamecast",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "overview" | "basic" => Ok(Mode::Overview),
            "dual" => Ok(Mode::Dual),
            "detailed" => Ok(Mode::Detailed),
            "gamecast" => Ok(Mode::Gamecast),
            other => Err(SettingsError::UnknownMode(other.to_string())),
        }
    }
}

//=== Brightness ==========================================================

/// Brightness level in `0..=3`.
///
/// Levels map onto driver intensities that stay visible with low PWM bit
/// depths: 0 is off, 1..=3 are low, mid and high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Brightness(u8);

impl Brightness {
    pub const MAX_LEVEL: u8 = 3;
    const INTENSITY: [u8; 4] = [0, 60, 80, 90];

    pub fn new(level: i64) -> Result<Self, SettingsError> {
        match u8::try_from(level) {
            Ok(level) if level <= Self::MAX_LEVEL => Ok(Self(level)),
            _ => Err(SettingsError::BrightnessOutOfRange(level)),
        }
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// Driver intensity in percent.
    pub fn intensity(self) -> u8 {
        Self::INTENSITY[self.0 as usize]
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Self(Self::MAX_LEVEL)
    }
}

impl FromStr for Brightness {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level: i64 = s
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidBrightness(s.to_string()))?;
        Self::new(level)
    }
}

impl TryFrom<u8> for Brightness {
    type Error = SettingsError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(i64::from(level))
    }
}

impl From<Brightness> for u8 {
    fn from(brightness: Brightness) -> u8 {
        brightness.0
    }
}

//=== DelayUpdate =========================================================

/// A delay change: absolute seconds, or a relative `p<N>` / `m<N>` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayUpdate {
    Absolute(u32),
    Plus(u32),
    Minus(u32),
}

impl DelayUpdate {
    /// Resolves the update against the currently stored delay.
    ///
    /// Relative decreases clamp at zero.
    pub fn resolve(self, current: u32) -> u32 {
        match self {
            DelayUpdate::Absolute(secs) => secs,
            DelayUpdate::Plus(secs) => current.saturating_add(secs),
            DelayUpdate::Minus(secs) => current.saturating_sub(secs),
        }
    }
}

impl FromStr for DelayUpdate {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let seconds = |digits: &str| {
            digits
                .parse::<u32>()
                .map_err(|_| SettingsError::InvalidDelay(s.to_string()))
        };

        match raw.as_bytes().first() {
            Some(b'p') => seconds(&raw[1..]).map(DelayUpdate::Plus),
            Some(b'm') => seconds(&raw[1..]).map(DelayUpdate::Minus),
            _ => seconds(raw).map(DelayUpdate::Absolute),
        }
    }
}

//=== SettingUpdate =======================================================

/// One validated settings change, as carried on a settings topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingUpdate {
    Mode(Mode),
    Brightness(Brightness),
    Delay(DelayUpdate),
    FocusId(usize),
}

impl SettingUpdate {
    /// Parses the payload published on the named settings topic.
    pub fn parse(name: &str, payload: &str) -> Result<Self, SettingsError> {
        match name {
            keys::MODE => payload.parse().map(SettingUpdate::Mode),
            keys::BRIGHTNESS => payload.parse().map(SettingUpdate::Brightness),
            keys::DELAY => payload.parse().map(SettingUpdate::Delay),
            keys::FOCUS_ID => payload
                .trim()
                .parse()
                .map(SettingUpdate::FocusId)
                .map_err(|_| SettingsError::InvalidFocusId(payload.to_string())),
            other => Err(SettingsError::UnknownSetting(other.to_string())),
        }
    }

    /// Key under which the setting is stored and the topic it travels on.
    pub fn key(&self) -> &'static str {
        match self {
            SettingUpdate::Mode(_) => keys::MODE,
            SettingUpdate::Brightness(_) => keys::BRIGHTNESS,
            SettingUpdate::Delay(_) => keys::DELAY,
            SettingUpdate::FocusId(_) => keys::FOCUS_ID,
        }
    }
}

/// Snapshot-store keys and topic names for settings.
pub mod keys {
    pub const MODE: &str = "mode";
    pub const BRIGHTNESS: &str = "brightness";
    pub const DELAY: &str = "delay";
    pub const FOCUS_ID: &str = "gamecast_id";
    pub const NUM_GAMES: &str = "num_games";
}

/// Checks a focus id against the number of tracked games.
pub fn check_focus(id: usize, tracked: usize) -> Result<usize, SettingsError> {
    if id < tracked {
        Ok(id)
    } else {
        Err(SettingsError::FocusOutOfRange { id, count: tracked })
    }
}

//=== Settings ============================================================

/// Read-only view of every process-wide scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub mode: Mode,
    pub page: usize,
    pub brightness: Brightness,
    pub delay: u32,
    pub focus_id: Option<usize>,
    pub visible_count: usize,
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_all_names() {
        for mode in Mode::ALL {
            assert_eq!(mode.as_str().parse::<Mode>(), Ok(mode));
        }
        assert_eq!("basic".parse::<Mode>(), Ok(Mode::Overview));
    }

    #[test]
    fn mode_rejects_unknown() {
        assert_eq!(
            "scoreboard".parse::<Mode>(),
            Err(SettingsError::UnknownMode("scoreboard".into()))
        );
    }

    #[test]
    fn brightness_maps_levels_to_intensity() {
        let intensities: Vec<u8> = (0..=3).map(|l| Brightness::new(l).unwrap().intensity()).collect();
        assert_eq!(intensities, vec![0, 60, 80, 90]);
    }

    #[test]
    fn brightness_rejects_out_of_range() {
        assert_eq!("4".parse::<Brightness>(), Err(SettingsError::BrightnessOutOfRange(4)));
        assert_eq!("-1".parse::<Brightness>(), Err(SettingsError::BrightnessOutOfRange(-1)));
        assert!(matches!("hi".parse::<Brightness>(), Err(SettingsError::InvalidBrightness(_))));
    }

    #[test]
    fn delay_absolute_and_relative() {
        assert_eq!("30".parse::<DelayUpdate>().unwrap().resolve(60), 30);
        assert_eq!("p15".parse::<DelayUpdate>().unwrap().resolve(60), 75);
        assert_eq!("m15".parse::<DelayUpdate>().unwrap().resolve(60), 45);
    }

    #[test]
    fn delay_minus_clamps_at_zero() {
        assert_eq!("m90".parse::<DelayUpdate>().unwrap().resolve(60), 0);
    }

    #[test]
    fn delay_rejects_garbage() {
        assert!("-5".parse::<DelayUpdate>().is_err());
        assert!("p".parse::<DelayUpdate>().is_err());
        assert!("x10".parse::<DelayUpdate>().is_err());
    }

    #[test]
    fn setting_update_parses_by_topic() {
        assert_eq!(SettingUpdate::parse("mode", "gamecast"), Ok(SettingUpdate::Mode(Mode::Gamecast)));
        assert_eq!(SettingUpdate::parse("gamecast_id", "3"), Ok(SettingUpdate::FocusId(3)));
        assert!(matches!(
            SettingUpdate::parse("volume", "3"),
            Err(SettingsError::UnknownSetting(_))
        ));
    }

    #[test]
    fn focus_is_range_checked() {
        assert_eq!(check_focus(2, 3), Ok(2));
        assert_eq!(check_focus(3, 3), Err(SettingsError::FocusOutOfRange { id: 3, count: 3 }));
    }
}
