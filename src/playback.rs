//! Playback exclusivity: at most one song plays at a time.

use std::fmt;
use std::mem;

use crate::song::Song;

/// What the piano is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing(Song),
}

/// Returned by `Playback::start` when a song is already active. Carries the
/// active song; the caller decides what to do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyPlaying(pub Song);

impl fmt::Display for AlreadyPlaying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "already playing {}", self.0)
    }
}

/// The Idle/Playing state machine. Starting is refused while a song is
/// active (it never cancels on the caller's behalf); stopping is
/// unconditional and idempotent.
#[derive(Debug, Default)]
pub struct Playback {
    state: PlaybackState,
}

impl Playback {
    pub fn new() -> Playback {
        Playback {
            state: PlaybackState::Idle,
        }
    }

    /// Transition Idle → Playing(song). If a song is already active the
    /// state is left untouched and the active song is reported back.
    pub fn start(&mut self, song: Song) -> Result<(), AlreadyPlaying> {
        match self.state {
            PlaybackState::Idle => {
                self.state = PlaybackState::Playing(song);
                Ok(())
            }
            PlaybackState::Playing(active) => Err(AlreadyPlaying(active)),
        }
    }

    /// Natural end of a performance. Returns the song that finished, or None
    /// when already idle (a no-op).
    pub fn finish(&mut self) -> Option<Song> {
        match mem::take(&mut self.state) {
            PlaybackState::Playing(song) => Some(song),
            PlaybackState::Idle => None,
        }
    }

    /// Explicit cancel. Same transition as `finish`; the separate name keeps
    /// the caller's bookkeeping honest about which signal to emit.
    pub fn stop(&mut self) -> Option<Song> {
        self.finish()
    }

    pub fn current(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing(_))
    }
}
