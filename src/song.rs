//! The built-in songs and the validated playback configuration.
//!
//! Each song is a fixed melody (notes and pauses, in performance order), a
//! step interval, and a short release delay for the key-up visual. A `Score`
//! bundles those three and is the only way timing data reaches the
//! sequencer, so illegal configurations are rejected before playback starts.

use std::fmt;
use std::time::Duration;

use crate::note::Note;
use crate::note::Note::*;

/// The two songs the piano can perform on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Song {
    HeartAndSoul,
    JingleBells,
}

const HEART_AND_SOUL: [Note; 51] = [
    C2, C2, E2, G2, //
    A1, A1, C2, E2, //
    F1, F1, A1, C2, //
    G1, G1, B1, D2, Pause, //
    C2, C2, C2, Pause, Pause, //
    C2, B1, A1, B1, C2, D2, Pause, //
    E2, E2, E2, Pause, //
    E2, D2, C2, D2, E2, F2, Pause, //
    G2, Pause, C2, Pause, A2, Pause, //
    G2, F2, E2, D2, C2,
];

const JINGLE_BELLS: [Note; 63] = [
    E2, E2, E2, Pause, //
    E2, E2, E2, Pause, //
    E2, G2, C2, D2, //
    E2, Pause, Pause, Pause, //
    F2, F2, F2, F2, //
    F2, E2, E2, E2, Pause, //
    E2, D2, D2, E2, //
    D2, Pause, G2, Pause, //
    E2, E2, E2, Pause, //
    E2, E2, E2, Pause, //
    E2, G2, C2, D2, //
    E2, Pause, Pause, Pause, //
    F2, F2, F2, F2, //
    F2, E2, E2, E2, Pause, //
    G2, G2, F2, D2, C2,
];

impl Song {
    pub const ALL: [Song; 2] = [Song::HeartAndSoul, Song::JingleBells];

    pub fn title(self) -> &'static str {
        match self {
            Song::HeartAndSoul => "Heart and Soul",
            Song::JingleBells => "Jingle Bells",
        }
    }

    pub fn melody(self) -> &'static [Note] {
        match self {
            Song::HeartAndSoul => &HEART_AND_SOUL,
            Song::JingleBells => &JINGLE_BELLS,
        }
    }

    /// Time between successive melody steps.
    pub fn step_interval(self) -> Duration {
        match self {
            Song::HeartAndSoul => Duration::from_millis(450),
            Song::JingleBells => Duration::from_millis(350),
        }
    }

    /// Time between a key's press and release visuals. Must stay below the
    /// step interval so a release never lands after the next press.
    pub fn release_delay(self) -> Duration {
        Duration::from_millis(150)
    }

    /// Whether each played note triggers a decorative effect (hearts).
    pub fn has_note_effect(self) -> bool {
        self == Song::HeartAndSoul
    }

    /// Whether an ambient effect (snow) runs for the whole performance.
    pub fn has_ambient_effect(self) -> bool {
        self == Song::JingleBells
    }

    /// The song's built-in score.
    pub fn score(self) -> Score {
        // Known-valid constants; `test_builtin_scores_pass_validation` keeps
        // them honest against `Score::new`.
        Score {
            melody: self.melody().to_vec(),
            step_interval: self.step_interval(),
            release_delay: self.release_delay(),
        }
    }

    /// Resolve a command-line song name.
    pub fn from_name(name: &str) -> Option<Song> {
        match name.to_ascii_lowercase().as_str() {
            "heart-and-soul" | "heart" => Some(Song::HeartAndSoul),
            "jingle-bells" | "jingle" => Some(Song::JingleBells),
            _ => None,
        }
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A melody plus its timing, checked at construction.
#[derive(Debug, Clone)]
pub struct Score {
    melody: Vec<Note>,
    step_interval: Duration,
    release_delay: Duration,
}

/// Rejected `Score` configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreError {
    EmptyMelody,
    ZeroInterval,
    ReleaseNotBeforeInterval,
}

impl fmt::Display for ScoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreError::EmptyMelody => write!(f, "melody has no entries"),
            ScoreError::ZeroInterval => write!(f, "step interval must be positive"),
            ScoreError::ReleaseNotBeforeInterval => {
                write!(f, "release delay must be shorter than the step interval")
            }
        }
    }
}

impl Score {
    /// Build a score, rejecting configurations that could not play cleanly:
    /// an empty melody, a zero interval, or a release delay that would let
    /// one key's release overlap the next key's press.
    pub fn new(
        melody: Vec<Note>,
        step_interval: Duration,
        release_delay: Duration,
    ) -> Result<Score, ScoreError> {
        if melody.is_empty() {
            return Err(ScoreError::EmptyMelody);
        }
        if step_interval.is_zero() {
            return Err(ScoreError::ZeroInterval);
        }
        if release_delay >= step_interval {
            return Err(ScoreError::ReleaseNotBeforeInterval);
        }
        Ok(Score {
            melody,
            step_interval,
            release_delay,
        })
    }

    pub fn melody(&self) -> &[Note] {
        &self.melody
    }

    pub fn step_interval(&self) -> Duration {
        self.step_interval
    }

    pub fn release_delay(&self) -> Duration {
        self.release_delay
    }
}
