use crate::note::Note;

/// Map a keyboard character to a piano note.
/// The lower octave sits on the z-row (white) and s-row (black), the upper
/// octave on the q-row and the digit row, like a tracker keyboard.
pub fn char_to_note(c: char) -> Option<Note> {
    match c {
        // Lower octave: white keys
        'z' => Some(Note::C1),
        'x' => Some(Note::D1),
        'c' => Some(Note::E1),
        'v' => Some(Note::F1),
        'b' => Some(Note::G1),
        'n' => Some(Note::A1),
        'm' => Some(Note::B1),

        // Lower octave: black keys
        's' => Some(Note::Db1),
        'd' => Some(Note::Eb1),
        'g' => Some(Note::Gb1),
        'h' => Some(Note::Ab1),
        'j' => Some(Note::Bb1),

        // Upper octave: white keys
        'q' => Some(Note::C2),
        'w' => Some(Note::D2),
        'e' => Some(Note::E2),
        'r' => Some(Note::F2),
        't' => Some(Note::G2),
        'y' => Some(Note::A2),
        'u' => Some(Note::B2),

        // Upper octave: black keys
        '2' => Some(Note::Db2),
        '3' => Some(Note::Eb2),
        '5' => Some(Note::Gb2),
        '6' => Some(Note::Ab2),
        '7' => Some(Note::Bb2),

        _ => None,
    }
}

/// Melody parse errors with the offending token's position
#[derive(Debug)]
pub struct ParseError {
    pub token: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "token {}: {}", self.token, self.message)
    }
}

/// Parse a melody string into a sequence of notes.
///
/// Tokens are separated by whitespace and/or commas. A token is a note name
/// ("C1".."B2", flats written like "Db2"), or a pause: "pause", "-" or "_".
///
/// ```text
/// C2 C2 E2 G2 - A1 A1 C2 E2
/// ```
pub fn parse_melody(input: &str) -> Result<Vec<Note>, ParseError> {
    let mut melody = Vec::new();

    for (idx, token) in input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .enumerate()
    {
        let note = match token {
            "-" | "_" => Note::Pause,
            _ => Note::from_name(token).ok_or_else(|| ParseError {
                token: idx + 1,
                message: format!("unknown note '{}'", token),
            })?,
        };
        melody.push(note);
    }

    Ok(melody)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notes_and_pauses() {
        let melody = parse_melody("C2 C2, E2 -\n G2 pause _").unwrap();
        assert_eq!(
            melody,
            vec![
                Note::C2,
                Note::C2,
                Note::E2,
                Note::Pause,
                Note::G2,
                Note::Pause,
                Note::Pause,
            ]
        );
    }

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(parse_melody("  \n ").unwrap(), vec![]);
    }

    #[test]
    fn test_parse_reports_token_position() {
        let err = parse_melody("C2 E2 X9").unwrap_err();
        assert_eq!(err.token, 3);
        assert!(err.message.contains("X9"));
    }

    #[test]
    fn test_every_key_char_maps_to_a_distinct_note() {
        let chars = "zxcvbnm sdghj qwertyu 23567";
        let mut notes: Vec<Note> = chars
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| char_to_note(c).unwrap())
            .collect();
        assert_eq!(notes.len(), 24);
        notes.sort_by_key(|n| n.semitone());
        notes.dedup();
        assert_eq!(notes.len(), 24);
    }

    #[test]
    fn test_unmapped_chars() {
        assert_eq!(char_to_note('9'), None);
        assert_eq!(char_to_note('0'), None);
        assert_eq!(char_to_note(' '), None);
    }
}
