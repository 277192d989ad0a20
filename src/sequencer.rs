//! The song sequencer: advances a melody one step per tick, presses keys
//! through the registry, and schedules the deferred key release.
//!
//! The sequencer is a plain state machine; it owns no clock. A driver calls
//! `tick` every step interval and `release_due` after the release delay
//! (`main` sleeps between calls, the live mode checks deadlines while
//! polling input). `play` never blocks.

use std::time::Duration;

use crate::keyboard::{Key, Keyboard};
use crate::note::Note;
use crate::playback::{AlreadyPlaying, Playback, PlaybackState};
use crate::song::{Score, Song};

/// UI-side hooks the sequencer signals into. Implementations update button
/// labels, theming, and the decorative effects; the sequencer never knows
/// what they draw.
pub trait SongObserver {
    /// A song started (true) or ended/was stopped (false).
    fn song_state_changed(&mut self, song: Song, playing: bool);

    /// Decorative per-note effect, fired right after the key press for songs
    /// that carry one (hearts).
    fn note_played(&mut self, _note: Note) {}

    /// Decorative ambient effect tied to one song's lifetime (snow).
    fn ambient_changed(&mut self, _active: bool) {}
}

/// What a `play` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A performance started.
    Started,
    /// A song was already active, so it was stopped instead. Pressing either
    /// song's control while one plays always means "stop", never "switch".
    Stopped(Song),
}

pub struct Sequencer {
    playback: Playback,
    score: Option<Score>,
    cursor: usize,
    pending_release: Option<Note>,
}

impl Sequencer {
    pub fn new() -> Sequencer {
        Sequencer {
            playback: Playback::new(),
            score: None,
            cursor: 0,
            pending_release: None,
        }
    }

    /// Start performing `score` as `song`, or stop the active performance if
    /// there is one. Returns immediately either way; on `Started` the driver
    /// is expected to begin ticking at the score's step interval.
    pub fn play(
        &mut self,
        song: Song,
        score: Score,
        keyboard: &mut Keyboard,
        observer: &mut dyn SongObserver,
    ) -> PlayOutcome {
        match self.playback.start(song) {
            Err(AlreadyPlaying(active)) => {
                self.stop(keyboard, observer);
                PlayOutcome::Stopped(active)
            }
            Ok(()) => {
                log::info!("song started: {song}");
                observer.song_state_changed(song, true);
                if song.has_ambient_effect() {
                    observer.ambient_changed(true);
                }
                self.cursor = 0;
                self.score = Some(score);
                PlayOutcome::Started
            }
        }
    }

    /// Advance one melody step. No-op when idle.
    ///
    /// Order within a tick is fixed: press, per-note effect, completion
    /// check, cursor increment. On the final index, pause or not, the
    /// performance ends in this same tick and the clock should stop; a
    /// release scheduled here stays pending and fires at its due time.
    pub fn tick(&mut self, keyboard: &mut Keyboard, observer: &mut dyn SongObserver) {
        // A release the driver has not fired yet must land before this press.
        self.flush_release(keyboard);

        let (entry, last) = match &self.score {
            Some(score) => {
                let melody = score.melody();
                (melody[self.cursor], self.cursor + 1 == melody.len())
            }
            None => return,
        };
        let song = match self.playback.current() {
            PlaybackState::Playing(song) => song,
            PlaybackState::Idle => return,
        };

        if !entry.is_pause() {
            match keyboard.lookup(entry) {
                Some(key) => {
                    key.press();
                    if song.has_note_effect() {
                        observer.note_played(entry);
                    }
                    self.pending_release = Some(entry);
                }
                None => log::debug!("no key registered for {entry}, skipping"),
            }
        }

        if last {
            log::info!("song finished: {song}");
            self.score = None;
            self.playback.finish();
            if song.has_ambient_effect() {
                observer.ambient_changed(false);
            }
            observer.song_state_changed(song, false);
        }

        self.cursor += 1;
    }

    /// Fire the deferred release scheduled by the last press, if one is
    /// still pending. Called by the driver one release delay after a tick.
    pub fn release_due(&mut self, keyboard: &mut Keyboard) {
        self.flush_release(keyboard);
    }

    /// Cancel the active performance: flush the pending release so no key
    /// stays stuck pressed, go idle, and signal the end for whichever song
    /// was playing. A no-op when already idle.
    pub fn stop(&mut self, keyboard: &mut Keyboard, observer: &mut dyn SongObserver) -> Option<Song> {
        self.flush_release(keyboard);
        self.score = None;
        let stopped = self.playback.stop();
        if let Some(song) = stopped {
            log::info!("song stopped: {song}");
            if song.has_ambient_effect() {
                observer.ambient_changed(false);
            }
            observer.song_state_changed(song, false);
        }
        stopped
    }

    pub fn state(&self) -> PlaybackState {
        self.playback.current()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Step interval of the active performance, if one is running.
    pub fn step_interval(&self) -> Option<Duration> {
        self.score.as_ref().map(Score::step_interval)
    }

    /// Release delay of the active performance, if one is running.
    pub fn release_delay(&self) -> Option<Duration> {
        self.score.as_ref().map(Score::release_delay)
    }

    fn flush_release(&mut self, keyboard: &mut Keyboard) {
        if let Some(note) = self.pending_release.take() {
            // The key may have been rebuilt away since the press; a lost
            // release must not fail.
            if let Some(key) = keyboard.lookup(note) {
                key.release();
            }
        }
    }
}

impl Default for Sequencer {
    fn default() -> Sequencer {
        Sequencer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::Key;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    /// Everything the collaborators observe, in emission order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Ev {
        Press(Note),
        Release(Note),
        State(Song, bool),
        Heart(Note),
        Snow(bool),
    }

    type Log = Rc<RefCell<Vec<Ev>>>;

    struct MockKey {
        note: Note,
        log: Log,
    }

    impl Key for MockKey {
        fn press(&mut self) {
            self.log.borrow_mut().push(Ev::Press(self.note));
        }

        fn release(&mut self) {
            self.log.borrow_mut().push(Ev::Release(self.note));
        }
    }

    struct MockUi {
        log: Log,
    }

    impl SongObserver for MockUi {
        fn song_state_changed(&mut self, song: Song, playing: bool) {
            self.log.borrow_mut().push(Ev::State(song, playing));
        }

        fn note_played(&mut self, note: Note) {
            self.log.borrow_mut().push(Ev::Heart(note));
        }

        fn ambient_changed(&mut self, active: bool) {
            self.log.borrow_mut().push(Ev::Snow(active));
        }
    }

    fn rig(notes: &[Note]) -> (Keyboard, MockUi, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut keyboard = Keyboard::new();
        for &note in notes.iter().filter(|n| !n.is_pause()) {
            keyboard.register(
                note,
                Box::new(MockKey {
                    note,
                    log: log.clone(),
                }),
            );
        }
        let ui = MockUi { log: log.clone() };
        (keyboard, ui, log)
    }

    fn score(melody: &[Note]) -> Score {
        Score::new(
            melody.to_vec(),
            Duration::from_millis(500),
            Duration::from_millis(150),
        )
        .unwrap()
    }

    /// Drive a performance to completion the way main's loop does:
    /// tick, then fire the deferred release, until the sequencer goes idle.
    /// Returns how many ticks ran.
    fn run_to_end(
        seq: &mut Sequencer,
        keyboard: &mut Keyboard,
        ui: &mut MockUi,
    ) -> usize {
        let mut ticks = 0;
        while seq.is_playing() {
            seq.tick(keyboard, ui);
            seq.release_due(keyboard);
            ticks += 1;
        }
        ticks
    }

    #[test]
    fn test_full_run_ticks_once_per_entry_and_goes_idle() {
        let melody = [Note::C2, Note::Pause, Note::D2, Note::E2];
        let (mut keyboard, mut ui, _log) = rig(&melody);
        let mut seq = Sequencer::new();

        assert_eq!(seq.state(), PlaybackState::Idle);
        let outcome = seq.play(Song::HeartAndSoul, score(&melody), &mut keyboard, &mut ui);
        assert_eq!(outcome, PlayOutcome::Started);
        assert_eq!(seq.state(), PlaybackState::Playing(Song::HeartAndSoul));

        let ticks = run_to_end(&mut seq, &mut keyboard, &mut ui);
        assert_eq!(ticks, melody.len());
        assert_eq!(seq.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_press_effect_completion_order() {
        // The timing scenario [C2, pause, D2]: press at tick 0, the pause
        // emits nothing, the final press and the ended signal share tick 2,
        // and the last release fires after the ended signal.
        let melody = [Note::C2, Note::Pause, Note::D2];
        let (mut keyboard, mut ui, log) = rig(&melody);
        let mut seq = Sequencer::new();

        seq.play(Song::HeartAndSoul, score(&melody), &mut keyboard, &mut ui);
        seq.tick(&mut keyboard, &mut ui);
        seq.release_due(&mut keyboard);
        seq.tick(&mut keyboard, &mut ui);
        seq.release_due(&mut keyboard);
        seq.tick(&mut keyboard, &mut ui);
        assert!(!seq.is_playing());
        seq.release_due(&mut keyboard);

        assert_eq!(
            *log.borrow(),
            vec![
                Ev::State(Song::HeartAndSoul, true),
                Ev::Press(Note::C2),
                Ev::Heart(Note::C2),
                Ev::Release(Note::C2),
                Ev::Press(Note::D2),
                Ev::Heart(Note::D2),
                Ev::State(Song::HeartAndSoul, false),
                Ev::Release(Note::D2),
            ]
        );
    }

    #[test]
    fn test_missed_release_is_flushed_before_next_press() {
        // If the driver never fires the release, the next tick does, and the
        // release still lands before the following press.
        let melody = [Note::C2, Note::D2];
        let (mut keyboard, mut ui, log) = rig(&melody);
        let mut seq = Sequencer::new();

        seq.play(Song::HeartAndSoul, score(&melody), &mut keyboard, &mut ui);
        seq.tick(&mut keyboard, &mut ui);
        seq.tick(&mut keyboard, &mut ui);

        let events = log.borrow();
        let c2_release = events.iter().position(|e| *e == Ev::Release(Note::C2));
        let d2_press = events.iter().position(|e| *e == Ev::Press(Note::D2));
        assert!(c2_release.unwrap() < d2_press.unwrap());
    }

    #[test]
    fn test_second_play_stops_and_never_starts() {
        let melody = [Note::C2, Note::D2];
        let (mut keyboard, mut ui, log) = rig(&melody);
        let mut seq = Sequencer::new();

        seq.play(Song::HeartAndSoul, score(&melody), &mut keyboard, &mut ui);
        let outcome = seq.play(Song::JingleBells, score(&melody), &mut keyboard, &mut ui);

        assert_eq!(outcome, PlayOutcome::Stopped(Song::HeartAndSoul));
        assert_eq!(seq.state(), PlaybackState::Idle);
        assert!(!log
            .borrow()
            .contains(&Ev::State(Song::JingleBells, true)));
        // Further ticks do nothing.
        seq.tick(&mut keyboard, &mut ui);
        assert_eq!(
            *log.borrow(),
            vec![
                Ev::State(Song::HeartAndSoul, true),
                Ev::State(Song::HeartAndSoul, false),
            ]
        );
    }

    #[test]
    fn test_repressing_the_same_song_stops_it() {
        let melody = [Note::C2, Note::D2];
        let (mut keyboard, mut ui, _log) = rig(&melody);
        let mut seq = Sequencer::new();

        seq.play(Song::JingleBells, score(&melody), &mut keyboard, &mut ui);
        seq.tick(&mut keyboard, &mut ui);
        let outcome = seq.play(Song::JingleBells, score(&melody), &mut keyboard, &mut ui);
        assert_eq!(outcome, PlayOutcome::Stopped(Song::JingleBells));
        assert_eq!(seq.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_stop_flushes_the_pending_release() {
        let melody = [Note::C2, Note::D2];
        let (mut keyboard, mut ui, log) = rig(&melody);
        let mut seq = Sequencer::new();

        seq.play(Song::HeartAndSoul, score(&melody), &mut keyboard, &mut ui);
        seq.tick(&mut keyboard, &mut ui);
        // Stop before the driver fires the release: the key must not stay
        // stuck pressed.
        seq.stop(&mut keyboard, &mut ui);

        let events = log.borrow();
        assert!(events.contains(&Ev::Release(Note::C2)));
        let release = events.iter().position(|e| *e == Ev::Release(Note::C2));
        let ended = events
            .iter()
            .position(|e| *e == Ev::State(Song::HeartAndSoul, false));
        assert!(release.unwrap() < ended.unwrap());
    }

    #[test]
    fn test_pauses_emit_nothing() {
        let melody = [Note::Pause, Note::Pause, Note::C2];
        let (mut keyboard, mut ui, log) = rig(&[Note::C2]);
        let mut seq = Sequencer::new();

        seq.play(Song::HeartAndSoul, score(&melody), &mut keyboard, &mut ui);
        seq.tick(&mut keyboard, &mut ui);
        seq.tick(&mut keyboard, &mut ui);

        // Two pause ticks: only the start signal so far.
        assert_eq!(*log.borrow(), vec![Ev::State(Song::HeartAndSoul, true)]);
        assert!(seq.is_playing());
    }

    #[test]
    fn test_final_pause_still_completes_in_the_same_tick() {
        let melody = [Note::C2, Note::Pause];
        let (mut keyboard, mut ui, log) = rig(&[Note::C2]);
        let mut seq = Sequencer::new();

        seq.play(Song::HeartAndSoul, score(&melody), &mut keyboard, &mut ui);
        seq.tick(&mut keyboard, &mut ui);
        seq.release_due(&mut keyboard);
        seq.tick(&mut keyboard, &mut ui);

        assert!(!seq.is_playing());
        assert_eq!(
            log.borrow().last(),
            Some(&Ev::State(Song::HeartAndSoul, false))
        );
    }

    #[test]
    fn test_registry_miss_is_skipped_but_still_completes() {
        let melody = [Note::G2];
        // Empty keyboard: no handle for G2.
        let (mut keyboard, mut ui, log) = rig(&[]);
        let mut seq = Sequencer::new();

        seq.play(Song::HeartAndSoul, score(&melody), &mut keyboard, &mut ui);
        seq.tick(&mut keyboard, &mut ui);
        seq.release_due(&mut keyboard);

        assert!(!seq.is_playing());
        assert_eq!(
            *log.borrow(),
            vec![
                Ev::State(Song::HeartAndSoul, true),
                Ev::State(Song::HeartAndSoul, false),
            ]
        );
    }

    #[test]
    fn test_stop_from_idle_is_idempotent() {
        let (mut keyboard, mut ui, log) = rig(&[]);
        let mut seq = Sequencer::new();

        assert_eq!(seq.stop(&mut keyboard, &mut ui), None);
        assert_eq!(seq.stop(&mut keyboard, &mut ui), None);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_heart_and_soul_fires_hearts_only() {
        let melody = [Note::C2, Note::Pause, Note::E2];
        let (mut keyboard, mut ui, log) = rig(&melody);
        let mut seq = Sequencer::new();

        seq.play(Song::HeartAndSoul, score(&melody), &mut keyboard, &mut ui);
        run_to_end(&mut seq, &mut keyboard, &mut ui);

        let events = log.borrow();
        let hearts: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, Ev::Heart(_)))
            .collect();
        assert_eq!(hearts, vec![&Ev::Heart(Note::C2), &Ev::Heart(Note::E2)]);
        assert!(!events.iter().any(|e| matches!(e, Ev::Snow(_))));
    }

    #[test]
    fn test_jingle_bells_snows_for_the_whole_performance() {
        let melody = [Note::E2, Note::E2];
        let (mut keyboard, mut ui, log) = rig(&melody);
        let mut seq = Sequencer::new();

        seq.play(Song::JingleBells, score(&melody), &mut keyboard, &mut ui);
        run_to_end(&mut seq, &mut keyboard, &mut ui);

        let events = log.borrow();
        assert!(!events.iter().any(|e| matches!(e, Ev::Heart(_))));
        let snow: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Ev::Snow(active) => Some(*active),
                _ => None,
            })
            .collect();
        assert_eq!(snow, vec![true, false]);
        // Snow starts after the started signal and stops before the ended
        // signal.
        let on = events.iter().position(|e| *e == Ev::Snow(true)).unwrap();
        let off = events.iter().position(|e| *e == Ev::Snow(false)).unwrap();
        let started = events
            .iter()
            .position(|e| *e == Ev::State(Song::JingleBells, true))
            .unwrap();
        let ended = events
            .iter()
            .position(|e| *e == Ev::State(Song::JingleBells, false))
            .unwrap();
        assert!(started < on && on < off && off < ended);
    }

    #[test]
    fn test_replay_after_completion_starts_from_the_top() {
        let melody = [Note::C2, Note::D2];
        let (mut keyboard, mut ui, log) = rig(&melody);
        let mut seq = Sequencer::new();

        seq.play(Song::HeartAndSoul, score(&melody), &mut keyboard, &mut ui);
        run_to_end(&mut seq, &mut keyboard, &mut ui);
        seq.play(Song::JingleBells, score(&melody), &mut keyboard, &mut ui);
        let ticks = run_to_end(&mut seq, &mut keyboard, &mut ui);

        assert_eq!(ticks, melody.len());
        let presses: Vec<_> = log
            .borrow()
            .iter()
            .filter(|e| matches!(e, Ev::Press(_)))
            .cloned()
            .collect();
        assert_eq!(
            presses,
            vec![
                Ev::Press(Note::C2),
                Ev::Press(Note::D2),
                Ev::Press(Note::C2),
                Ev::Press(Note::D2),
            ]
        );
    }

    #[test]
    fn test_builtin_song_drives_every_non_pause_entry() {
        let whole: Vec<Note> = Note::WHITE
            .iter()
            .chain(Note::BLACK.iter())
            .copied()
            .collect();
        let (mut keyboard, mut ui, log) = rig(&whole);
        let mut seq = Sequencer::new();

        seq.play(
            Song::JingleBells,
            Song::JingleBells.score(),
            &mut keyboard,
            &mut ui,
        );
        let ticks = run_to_end(&mut seq, &mut keyboard, &mut ui);
        assert_eq!(ticks, 63);

        let melody = Song::JingleBells.melody();
        let expected_presses = melody.iter().filter(|n| !n.is_pause()).count();
        let events = log.borrow();
        let presses = events.iter().filter(|e| matches!(e, Ev::Press(_))).count();
        let releases = events
            .iter()
            .filter(|e| matches!(e, Ev::Release(_)))
            .count();
        assert_eq!(presses, expected_presses);
        assert_eq!(releases, expected_presses);
    }
}
