use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::HashMap;
use std::sync::mpsc;

use crate::note::Note;

/// A command sent to the audio stream
#[derive(Debug, Clone)]
pub enum LiveCommand {
    /// Start sounding a note at the given frequency
    NoteOn { note: Note, freq: f64 },
    /// Stop sounding a note
    NoteOff { note: Note },
    /// Silence everything but keep the stream alive
    AllNotesOff,
    /// Silence everything and ignore further commands
    Shutdown,
}

/// One sounding note: its frequency and a per-voice sample counter.
struct Voice {
    freq: f64,
    phase: f64,
}

/// Persistent sine synth on the default output device. Commands arrive over
/// a channel and are applied inside the stream callback, so the engine can
/// be driven from the main thread without blocking audio.
pub struct AudioEngine {
    cmd_tx: mpsc::Sender<LiveCommand>,
    _stream: cpal::Stream,
}

impl AudioEngine {
    pub fn new() -> Result<AudioEngine, String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("no output audio device available")?;

        let config = device
            .default_output_config()
            .map_err(|e| format!("failed to get default output config: {}", e))?;

        let sample_rate = config.sample_rate() as f64;

        let (cmd_tx, cmd_rx) = mpsc::channel::<LiveCommand>();

        let mut voices: HashMap<Note, Voice> = HashMap::new();
        let mut shutdown = false;

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Apply any queued commands (non-blocking)
                    while let Ok(cmd) = cmd_rx.try_recv() {
                        if shutdown {
                            break;
                        }
                        match cmd {
                            LiveCommand::NoteOn { note, freq } => {
                                // Retriggering a sounding note restarts it
                                voices.insert(note, Voice { freq, phase: 0.0 });
                            }
                            LiveCommand::NoteOff { note } => {
                                voices.remove(&note);
                            }
                            LiveCommand::AllNotesOff => voices.clear(),
                            LiveCommand::Shutdown => {
                                voices.clear();
                                shutdown = true;
                            }
                        }
                    }

                    for sample in data.iter_mut() {
                        if voices.is_empty() {
                            *sample = 0.0;
                            continue;
                        }
                        let mut value = 0.0_f64;
                        for voice in voices.values_mut() {
                            value += (voice.phase * voice.freq * 2.0 * std::f64::consts::PI
                                / sample_rate)
                                .sin();
                            voice.phase += 1.0;
                        }
                        // Normalize by number of voices and apply a gentle volume
                        value = value / voices.len() as f64 * 0.3;
                        *sample = value as f32;
                    }
                },
                move |err| {
                    log::error!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| format!("failed to build output stream: {}", e))?;

        stream
            .play()
            .map_err(|e| format!("failed to play stream: {}", e))?;

        Ok(AudioEngine {
            cmd_tx,
            _stream: stream,
        })
    }

    pub fn send(&self, cmd: LiveCommand) -> Result<(), String> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| "audio thread disconnected".to_string())
    }

    /// A cloneable sender for key handles that sound their own note.
    pub fn sender(&self) -> mpsc::Sender<LiveCommand> {
        self.cmd_tx.clone()
    }
}
