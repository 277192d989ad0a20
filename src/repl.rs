use std::io::{self, Write};
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

use crate::keyboard::{Key, Keyboard};
use crate::note::Note;
use crate::parser::char_to_note;
use crate::sequencer::{PlayOutcome, Sequencer, SongObserver};
use crate::song::Song;
use crate::synth::{AudioEngine, LiveCommand};

const HEART_ROW: u16 = 16;
const JINGLE_ROW: u16 = 17;
const NOTE_ROW: u16 = 19;
const EFFECT_ROW: u16 = 20;

/// How long a manually played key keeps sounding when the terminal cannot
/// report key releases.
const FALLBACK_HOLD: Duration = Duration::from_millis(300);

/// Run the interactive piano: manual keys plus the two automatic songs.
pub fn run(silent: bool) -> Result<(), String> {
    let engine = if silent { None } else { Some(AudioEngine::new()?) };
    let mut keyboard = build_keyboard(engine.as_ref());
    log::debug!("{} keys registered", keyboard.len());

    let mut stdout = io::stdout();

    // Enter raw mode
    terminal::enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {}", e))?;
    execute!(stdout, EnterAlternateScreen).map_err(|e| format!("alternate screen: {}", e))?;

    // Enable keyboard enhancement for key release detection.
    // On macOS, the terminal may accept the enhancement flag but not actually
    // send release events, so we disable it and use the fallback timer.
    let has_key_release = if cfg!(target_os = "macos") {
        false
    } else {
        queue!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok()
            && stdout.flush().is_ok()
    };

    print_banner(&mut stdout);

    let result = event_loop(&mut keyboard, has_key_release);

    // Restore terminal
    if let Some(engine) = &engine {
        let _ = engine.send(LiveCommand::AllNotesOff);
        std::thread::sleep(Duration::from_millis(20));
        let _ = engine.send(LiveCommand::Shutdown);
    }

    if has_key_release {
        let _ = execute!(
            stdout,
            crossterm::event::PopKeyboardEnhancementFlags,
            LeaveAlternateScreen
        );
    } else {
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
    let _ = terminal::disable_raw_mode();

    result
}

fn event_loop(keyboard: &mut Keyboard, has_key_release: bool) -> Result<(), String> {
    let mut seq = Sequencer::new();
    let mut ui = LiveUi;

    // Fallback path: timer threads send the note to release back to the
    // main loop over this channel.
    let (fallback_tx, fallback_rx) = std_mpsc::channel::<Note>();

    // Sequencer clock: deadlines checked every pass through the loop.
    let mut next_tick: Option<Instant> = None;
    let mut release_at: Option<Instant> = None;
    let mut step = Duration::ZERO;
    let mut delay = Duration::ZERO;

    loop {
        let now = Instant::now();
        if let Some(at) = release_at {
            if now >= at {
                seq.release_due(keyboard);
                release_at = None;
            }
        }
        if let Some(at) = next_tick {
            if now >= at {
                seq.tick(keyboard, &mut ui);
                // The final release of a finished song still comes due.
                release_at = Some(at + delay);
                next_tick = seq.is_playing().then_some(at + step);
            }
        }

        // Drain any fallback release messages from timer threads
        if !has_key_release {
            while let Ok(note) = fallback_rx.try_recv() {
                if let Some(key) = keyboard.lookup(note) {
                    key.release();
                }
            }
        }

        if !event::poll(Duration::from_millis(10))
            .map_err(|e| format!("event poll error: {}", e))?
        {
            continue;
        }

        let ev = event::read().map_err(|e| format!("event read error: {}", e))?;

        match ev {
            Event::Key(KeyEvent {
                code: KeyCode::Esc,
                kind: KeyEventKind::Press,
                ..
            }) => {
                seq.stop(keyboard, &mut ui);
                return Ok(());
            }

            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                kind: KeyEventKind::Press,
                ..
            }) => {
                // Song toggles
                if let Some(song) = song_for_char(c) {
                    match seq.play(song, song.score(), keyboard, &mut ui) {
                        PlayOutcome::Started => {
                            step = song.step_interval();
                            delay = song.release_delay();
                            next_tick = Some(Instant::now());
                            release_at = None;
                        }
                        PlayOutcome::Stopped(stopped) => {
                            log::debug!("stopped {stopped}; now {:?}", seq.state());
                            next_tick = None;
                            release_at = None;
                        }
                    }
                    continue;
                }

                // Manual keys are ignored while a song performs
                if seq.is_playing() {
                    continue;
                }

                if let Some(note) = char_to_note(c) {
                    // Fallback: no key release support — stop the note
                    // before starting it again
                    if !has_key_release {
                        if let Some(key) = keyboard.lookup(note) {
                            key.release();
                        }
                    }

                    if let Some(key) = keyboard.lookup(note) {
                        key.press();
                    }

                    // Fallback: auto-release after a short hold
                    if !has_key_release {
                        let tx = fallback_tx.clone();
                        std::thread::spawn(move || {
                            std::thread::sleep(FALLBACK_HOLD);
                            let _ = tx.send(note);
                        });
                    }
                }
            }

            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                kind: KeyEventKind::Release,
                ..
            }) => {
                if let Some(note) = char_to_note(c) {
                    if let Some(key) = keyboard.lookup(note) {
                        key.release();
                    }
                }
            }

            _ => {}
        }
    }
}

fn song_for_char(c: char) -> Option<Song> {
    match c {
        '9' => Some(Song::HeartAndSoul),
        '0' => Some(Song::JingleBells),
        _ => None,
    }
}

/// One console key: sounds its note (when audio is on) and shows it on the
/// status line.
struct LiveKey {
    note: Note,
    audio: Option<std_mpsc::Sender<LiveCommand>>,
}

impl Key for LiveKey {
    fn press(&mut self) {
        if let (Some(tx), Some(freq)) = (&self.audio, self.note.to_freq()) {
            let _ = tx.send(LiveCommand::NoteOn {
                note: self.note,
                freq,
            });
        }
        write_row(NOTE_ROW, &format!("Note: {}", self.note));
    }

    fn release(&mut self) {
        if let Some(tx) = &self.audio {
            let _ = tx.send(LiveCommand::NoteOff { note: self.note });
        }
        write_row(NOTE_ROW, "Note: ---");
    }
}

/// Status-line renderer standing in for the song buttons and particle
/// effects of a graphical front end.
struct LiveUi;

impl SongObserver for LiveUi {
    fn song_state_changed(&mut self, song: Song, playing: bool) {
        song_row(song, playing);
    }

    fn note_played(&mut self, _note: Note) {
        write_row(EFFECT_ROW, "♥");
    }

    fn ambient_changed(&mut self, active: bool) {
        write_row(EFFECT_ROW, if active { "❄ ❄ ❄" } else { "" });
    }
}

fn build_keyboard(engine: Option<&AudioEngine>) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for &note in Note::WHITE.iter().chain(Note::BLACK.iter()) {
        keyboard.register(
            note,
            Box::new(LiveKey {
                note,
                audio: engine.map(AudioEngine::sender),
            }),
        );
    }
    keyboard
}

fn song_row(song: Song, playing: bool) {
    let (row, key, trailer) = match song {
        Song::HeartAndSoul => (HEART_ROW, '9', "♥"),
        Song::JingleBells => (JINGLE_ROW, '0', "❄"),
    };
    let label = if playing {
        format!("[{}] ◼ stop {} {}", key, song, trailer)
    } else {
        format!("[{}] ▶ play {} {}", key, song, trailer)
    };
    write_row(row, &label);
    if !playing {
        write_row(EFFECT_ROW, "");
    }
}

fn write_row(row: u16, text: &str) {
    let mut stdout = io::stdout();
    let _ = write!(stdout, "\x1b[{};1H\x1b[2K  {}\r", row, text);
    let _ = stdout.flush();
}

fn print_banner(stdout: &mut io::Stdout) {
    let banner = "\x1b[2J\x1b[H\
pianola live - virtual piano\r\n\
─────────────────────────────────────────\r\n\
\r\n\
  Lower octave:   z  x  c  v  b  n  m\r\n\
                  C1 D1 E1 F1 G1 A1 B1\r\n\
       (black)     s  d     g  h  j\r\n\
\r\n\
  Upper octave:   q  w  e  r  t  y  u\r\n\
                  C2 D2 E2 F2 G2 A2 B2\r\n\
       (black)     2  3     5  6  7\r\n\
\r\n\
  Quit:           Esc\r\n";
    let _ = write!(stdout, "{}", banner);
    song_row(Song::HeartAndSoul, false);
    song_row(Song::JingleBells, false);
    write_row(NOTE_ROW, "Note: ---");
    let _ = stdout.flush();
}
