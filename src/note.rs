use std::fmt;

/// Piano note identifiers: two octaves of keys, plus a `Pause` marker used
/// in melodies to skip a step without sounding anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Note {
    C1,
    Db1,
    D1,
    Eb1,
    E1,
    F1,
    Gb1,
    G1,
    Ab1,
    A1,
    Bb1,
    B1,
    C2,
    Db2,
    D2,
    Eb2,
    E2,
    F2,
    Gb2,
    G2,
    Ab2,
    A2,
    Bb2,
    B2,
    Pause,
}

/// White (wide) vs black (raised) key shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    White,
    Black,
}

impl Note {
    /// The white keys, left to right.
    pub const WHITE: [Note; 14] = [
        Note::C1,
        Note::D1,
        Note::E1,
        Note::F1,
        Note::G1,
        Note::A1,
        Note::B1,
        Note::C2,
        Note::D2,
        Note::E2,
        Note::F2,
        Note::G2,
        Note::A2,
        Note::B2,
    ];

    /// The black keys, left to right.
    pub const BLACK: [Note; 10] = [
        Note::Db1,
        Note::Eb1,
        Note::Gb1,
        Note::Ab1,
        Note::Bb1,
        Note::Db2,
        Note::Eb2,
        Note::Gb2,
        Note::Ab2,
        Note::Bb2,
    ];

    pub fn is_pause(self) -> bool {
        self == Note::Pause
    }

    /// Key shape for this note, or None for a pause.
    pub fn kind(self) -> Option<KeyKind> {
        match self {
            Note::Pause => None,
            Note::Db1
            | Note::Eb1
            | Note::Gb1
            | Note::Ab1
            | Note::Bb1
            | Note::Db2
            | Note::Eb2
            | Note::Gb2
            | Note::Ab2
            | Note::Bb2 => Some(KeyKind::Black),
            _ => Some(KeyKind::White),
        }
    }

    /// Chromatic offset from the leftmost key (C1=0, B2=23), None for a pause.
    pub fn semitone(self) -> Option<u8> {
        let semitone = match self {
            Note::C1 => 0,
            Note::Db1 => 1,
            Note::D1 => 2,
            Note::Eb1 => 3,
            Note::E1 => 4,
            Note::F1 => 5,
            Note::Gb1 => 6,
            Note::G1 => 7,
            Note::Ab1 => 8,
            Note::A1 => 9,
            Note::Bb1 => 10,
            Note::B1 => 11,
            Note::C2 => 12,
            Note::Db2 => 13,
            Note::D2 => 14,
            Note::Eb2 => 15,
            Note::E2 => 16,
            Note::F2 => 17,
            Note::Gb2 => 18,
            Note::G2 => 19,
            Note::Ab2 => 20,
            Note::A2 => 21,
            Note::Bb2 => 22,
            Note::B2 => 23,
            Note::Pause => return None,
        };
        Some(semitone)
    }

    /// MIDI note number. The keyboard starts at middle C (C1 = MIDI 60).
    pub fn to_midi(self) -> Option<u8> {
        self.semitone().map(|s| 60 + s)
    }

    /// Frequency in Hz (A above middle C = 440 Hz), None for a pause.
    pub fn to_freq(self) -> Option<f64> {
        self.to_midi()
            .map(|midi| 440.0 * 2.0_f64.powf((midi as f64 - 69.0) / 12.0))
    }

    /// Note name as written in melodies ("C1", "Db2", "pause").
    pub fn name(self) -> &'static str {
        match self {
            Note::C1 => "C1",
            Note::Db1 => "Db1",
            Note::D1 => "D1",
            Note::Eb1 => "Eb1",
            Note::E1 => "E1",
            Note::F1 => "F1",
            Note::Gb1 => "Gb1",
            Note::G1 => "G1",
            Note::Ab1 => "Ab1",
            Note::A1 => "A1",
            Note::Bb1 => "Bb1",
            Note::B1 => "B1",
            Note::C2 => "C2",
            Note::Db2 => "Db2",
            Note::D2 => "D2",
            Note::Eb2 => "Eb2",
            Note::E2 => "E2",
            Note::F2 => "F2",
            Note::Gb2 => "Gb2",
            Note::G2 => "G2",
            Note::Ab2 => "Ab2",
            Note::A2 => "A2",
            Note::Bb2 => "Bb2",
            Note::B2 => "B2",
            Note::Pause => "pause",
        }
    }

    /// Inverse of `name`. Case-sensitive: note names are an uppercase letter,
    /// an optional lowercase flat mark, and an octave digit.
    pub fn from_name(name: &str) -> Option<Note> {
        for &note in Note::WHITE.iter().chain(Note::BLACK.iter()) {
            if note.name() == name {
                return Some(note);
            }
        }
        if name == "pause" {
            return Some(Note::Pause);
        }
        None
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
