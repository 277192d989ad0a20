//! The key registry: maps a note to whatever renders and sounds that key.
//!
//! The surrounding UI owns the key implementations and rebuilds the registry
//! when the keyboard is resized; the sequencer only looks keys up.

use std::collections::HashMap;

use crate::note::Note;

/// A playable key. Press and release are the visual/audio feedback hooks the
/// sequencer drives; what they actually do is up to the registering layer.
pub trait Key {
    fn press(&mut self);
    fn release(&mut self);
}

/// Note → key handle registry. Registering a note twice replaces the prior
/// binding (last write wins), which is how a rebuilt keyboard takes over.
#[derive(Default)]
pub struct Keyboard {
    keys: HashMap<Note, Box<dyn Key>>,
}

impl Keyboard {
    pub fn new() -> Keyboard {
        Keyboard {
            keys: HashMap::new(),
        }
    }

    pub fn register(&mut self, note: Note, key: Box<dyn Key>) {
        if self.keys.insert(note, key).is_some() {
            log::debug!("key for {note} replaced");
        }
    }

    pub fn lookup(&mut self, note: Note) -> Option<&mut (dyn Key + 'static)> {
        self.keys.get_mut(&note).map(|key| key.as_mut())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}
