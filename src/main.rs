mod keyboard;
mod note;
mod parser;
mod playback;
mod repl;
mod sequencer;
mod song;
mod synth;

use clap::{Parser, Subcommand};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use keyboard::{Key, Keyboard};
use note::{KeyKind, Note};
use sequencer::{Sequencer, SongObserver};
use song::{Score, Song};
use synth::{AudioEngine, LiveCommand};

#[derive(Parser)]
#[command(name = "pianola", about = "Virtual piano with an automatic song player")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Perform a song on the console piano
    Play {
        /// Song to perform: heart-and-soul or jingle-bells
        #[arg(default_value = "heart-and-soul")]
        song: String,

        /// Replace the song's melody, e.g. "C2 C2 E2 G2 - A1"
        #[arg(long)]
        melody: Option<String>,

        /// Override the seconds between melody steps
        #[arg(long)]
        interval: Option<f64>,

        /// Override the seconds between a key's press and release
        #[arg(long)]
        release_delay: Option<f64>,

        /// Don't open an audio device
        #[arg(long)]
        silent: bool,
    },

    /// List the built-in songs and their melodies
    Songs,

    /// Interactive piano — play notes by typing
    Live {
        /// Don't open an audio device
        #[arg(long)]
        silent: bool,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Play {
            song,
            melody,
            interval,
            release_delay,
            silent,
        } => {
            let song = resolve_song(&song);
            let score = build_score(song, melody, interval, release_delay);
            perform(song, score, silent);
        }
        Command::Songs => print_songs(),
        Command::Live { silent } => {
            if let Err(e) = repl::run(silent) {
                eprintln!("Live mode error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn resolve_song(name: &str) -> Song {
    Song::from_name(name).unwrap_or_else(|| {
        eprintln!("Unknown song '{}'. Available songs:", name);
        for song in Song::ALL {
            eprintln!("  {} ({})", song_arg_name(song), song);
        }
        std::process::exit(1);
    })
}

fn song_arg_name(song: Song) -> &'static str {
    match song {
        Song::HeartAndSoul => "heart-and-soul",
        Song::JingleBells => "jingle-bells",
    }
}

fn build_score(
    song: Song,
    melody: Option<String>,
    interval: Option<f64>,
    release_delay: Option<f64>,
) -> Score {
    let melody = match melody {
        Some(text) => parser::parse_melody(&text).unwrap_or_else(|e| {
            eprintln!("Melody error: {}", e);
            std::process::exit(1);
        }),
        None => song.melody().to_vec(),
    };

    let interval = seconds_arg("--interval", interval).unwrap_or_else(|| song.step_interval());
    let release_delay =
        seconds_arg("--release-delay", release_delay).unwrap_or_else(|| song.release_delay());

    Score::new(melody, interval, release_delay).unwrap_or_else(|e| {
        eprintln!("Score error: {}", e);
        std::process::exit(1);
    })
}

fn seconds_arg(flag: &str, value: Option<f64>) -> Option<Duration> {
    let secs = value?;
    if !secs.is_finite() || secs < 0.0 {
        eprintln!("Invalid {} value: {}", flag, secs);
        std::process::exit(1);
    }
    Some(Duration::from_secs_f64(secs))
}

/// Perform `score` as `song`: the blocking driver that gives the sequencer
/// its repeating clock. Each pass ticks once, fires the deferred release
/// after the release delay, then sleeps out the rest of the step interval.
fn perform(song: Song, score: Score, silent: bool) {
    let engine = if silent {
        None
    } else {
        match AudioEngine::new() {
            Ok(engine) => Some(engine),
            Err(e) => {
                eprintln!("Audio error: {} (try --silent)", e);
                std::process::exit(1);
            }
        }
    };

    let mut keyboard = build_console_keyboard(engine.as_ref());
    let mut ui = ConsoleUi;
    let mut seq = Sequencer::new();

    println!(
        "Performing: {} ({} steps, {:.2}s per step)",
        song,
        score.melody().len(),
        score.step_interval().as_secs_f64()
    );
    println!();

    seq.play(song, score, &mut keyboard, &mut ui);

    while seq.is_playing() {
        let interval = seq.step_interval().unwrap_or_default();
        let delay = seq.release_delay().unwrap_or_default();

        seq.tick(&mut keyboard, &mut ui);
        thread::sleep(delay);
        seq.release_due(&mut keyboard);
        if let Some(rest) = interval.checked_sub(delay) {
            thread::sleep(rest);
        }
    }

    // Brief silence at the end so the last note rings out
    thread::sleep(Duration::from_millis(100));
    if let Some(engine) = &engine {
        let _ = engine.send(LiveCommand::AllNotesOff);
        let _ = engine.send(LiveCommand::Shutdown);
    }
}

fn print_songs() {
    for song in Song::ALL {
        println!("--- {} ({}) ---", song, song_arg_name(song));
        println!(
            "  {} steps, {:.2}s per step, {:.2}s release delay",
            song.melody().len(),
            song.step_interval().as_secs_f64(),
            song.release_delay().as_secs_f64()
        );
        let tokens: Vec<&str> = song
            .melody()
            .iter()
            .map(|n| if n.is_pause() { "-" } else { n.name() })
            .collect();
        for line in tokens.chunks(8) {
            println!("    {}", line.join(" "));
        }
        println!();
    }
}

/// One console key: prints the note as it is pressed and sounds it when
/// audio is on. Releases only stop the sound; a printed line has nothing to
/// un-press.
struct ConsoleKey {
    note: Note,
    audio: Option<mpsc::Sender<LiveCommand>>,
}

impl Key for ConsoleKey {
    fn press(&mut self) {
        if let (Some(tx), Some(freq)) = (&self.audio, self.note.to_freq()) {
            let _ = tx.send(LiveCommand::NoteOn {
                note: self.note,
                freq,
            });
        }
        let marker = match self.note.kind() {
            Some(KeyKind::Black) => "♭",
            _ => "♪",
        };
        println!("  {} {}", marker, self.note);
    }

    fn release(&mut self) {
        if let Some(tx) = &self.audio {
            let _ = tx.send(LiveCommand::NoteOff { note: self.note });
        }
    }
}

/// Console stand-in for the song buttons and particle effects.
struct ConsoleUi;

impl SongObserver for ConsoleUi {
    fn song_state_changed(&mut self, song: Song, playing: bool) {
        if playing {
            println!("▶ {}", song);
        } else {
            println!("◼ {}", song);
        }
    }

    fn note_played(&mut self, _note: Note) {
        println!("      ♥");
    }

    fn ambient_changed(&mut self, active: bool) {
        if active {
            println!("  ❄ let it snow");
        } else {
            println!("  ❄ snow stops");
        }
    }
}

fn build_console_keyboard(engine: Option<&AudioEngine>) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for &note in Note::WHITE.iter().chain(Note::BLACK.iter()) {
        keyboard.register(
            note,
            Box::new(ConsoleKey {
                note,
                audio: engine.map(AudioEngine::sender),
            }),
        );
    }
    keyboard
}
