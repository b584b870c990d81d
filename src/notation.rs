//! Importing tunes written in ABC notation.
//!
//! Only the melodic core of ABC is understood: the `X T M L K` header
//! fields, notes with accidentals and octave marks, note lengths, rests and
//! bar lines. A quarter note lasts one cycle and each note becomes an event
//! whose value is its MIDI number divided by 127. Rests leave a gap.
//!
//! ```rust
//! use weft::notation::parse_abc;
//!
//! let events = parse_abc("X:1\nL:1/4\nK:C\nC D E2 | z G |").unwrap();
//! assert_eq!(events.len(), 4);
//! ```

use std::collections::HashMap;

use crate::error::{LoomError, Result};
use crate::event::{Event, EventCollection};
use crate::fraction::Fraction;

/// Sharpened letters in circle-of-fifths order; flats use the reverse.
const SHARP_ORDER: [char; 7] = ['F', 'C', 'G', 'D', 'A', 'E', 'B'];

/// A parsed tune.
#[derive(Debug, Clone, PartialEq)]
pub struct Tune {
    pub index: Option<u32>,
    pub title: Option<String>,
    pub meter: Option<String>,
    /// Length of a note without an explicit duration, in whole notes.
    pub unit_length: Fraction,
    pub key: Key,
    pub events: EventCollection,
}

/// A key signature, as the number of sharps (positive) or flats (negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Key {
    pub fifths: i32,
}

impl Key {
    /// Parse a `K:` field value such as `G`, `Bb`, `F#m` or `D dorian`.
    pub fn parse(text: &str) -> Option<Key> {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("none") {
            return Some(Key::default());
        }

        let mut chars = text.chars().peekable();
        let tonic = chars.next()?.to_ascii_uppercase();
        let mut fifths = match tonic {
            'C' => 0,
            'G' => 1,
            'D' => 2,
            'A' => 3,
            'E' => 4,
            'B' => 5,
            'F' => -1,
            _ => return None,
        };
        match chars.peek() {
            Some('#') => {
                fifths += 7;
                chars.next();
            }
            Some('b') => {
                fifths -= 7;
                chars.next();
            }
            _ => {}
        }

        let mode: String = chars
            .filter(|c| !c.is_whitespace())
            .take(3)
            .collect::<String>()
            .to_ascii_lowercase();
        fifths += match mode.as_str() {
            "" | "maj" | "ion" => 0,
            "m" | "min" | "aeo" => -3,
            "mix" => -1,
            "dor" => -2,
            "phr" => -4,
            "lyd" => 1,
            "loc" => -5,
            _ => return None,
        };
        Some(Key { fifths })
    }

    /// Semitone adjustment the key applies to a note letter.
    pub fn accidental_for(&self, letter: char) -> i32 {
        let letter = letter.to_ascii_uppercase();
        let count = self.fifths.unsigned_abs() as usize;
        if self.fifths > 0 && SHARP_ORDER[..count.min(7)].contains(&letter) {
            1
        } else if self.fifths < 0 && SHARP_ORDER.iter().rev().take(count).any(|&c| c == letter) {
            -1
        } else {
            0
        }
    }
}

/// Parse a tune into events.
pub fn parse_abc(text: &str) -> Result<EventCollection> {
    Ok(parse_tune(text)?.events)
}

/// Parse a tune, keeping its header fields.
pub fn parse_tune(text: &str) -> Result<Tune> {
    let mut tune = Tune {
        index: None,
        title: None,
        meter: None,
        unit_length: Fraction::new(1, 8),
        key: Key::default(),
        events: EventCollection::new(),
    };
    let mut sequence: Vec<Event> = Vec::new();
    let mut length = Fraction::zero();

    for (i, raw_line) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = match raw_line.find('%') {
            Some(comment) => &raw_line[..comment],
            None => raw_line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((field, value)) = header_field(line) {
            let value = value.trim();
            match field {
                'X' => {
                    let index = value
                        .parse()
                        .map_err(|_| notation_error(line_no, "X: needs a number"))?;
                    tune.index = Some(index);
                }
                'T' => {
                    if tune.title.is_none() {
                        tune.title = Some(value.to_string());
                    }
                }
                'M' => tune.meter = Some(value.to_string()),
                'L' => {
                    tune.unit_length = parse_ratio(value).ok_or_else(|| {
                        notation_error(line_no, format!("bad unit length {:?}", value))
                    })?;
                }
                'K' => {
                    tune.key = Key::parse(value).ok_or_else(|| {
                        notation_error(line_no, format!("unknown key {:?}", value))
                    })?;
                }
                other => tracing::debug!(field = %other, line = line_no, "ignoring header field"),
            }
            continue;
        }

        let mut body = BodyParser {
            chars: line.chars().collect(),
            pos: 0,
            line: line_no,
            unit_length: tune.unit_length,
            key: tune.key,
            bar_accidentals: HashMap::new(),
        };
        let first_new = sequence.len();
        body.parse_into(&mut sequence)?;
        for event in &sequence[first_new..] {
            length = length
                .checked_add(event.interval().size())
                .ok_or_else(|| notation_error(line_no, "tune is too long"))?;
        }
    }

    tune.events = Event::seq(&sequence).into_iter().collect();
    tracing::debug!(events = tune.events.len(), title = ?tune.title, "imported tune");
    Ok(tune)
}

fn header_field(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let field = chars.next()?;
    if field.is_ascii_alphabetic() && chars.next() == Some(':') {
        Some((field, &line[2..]))
    } else {
        None
    }
}

fn parse_ratio(text: &str) -> Option<Fraction> {
    let (numer, denom) = text.split_once('/')?;
    let numer: i64 = numer.trim().parse().ok()?;
    let denom: i64 = denom.trim().parse().ok()?;
    if numer <= 0 || denom <= 0 {
        return None;
    }
    Some(Fraction::new(numer, denom))
}

fn notation_error(line: usize, message: impl Into<String>) -> LoomError {
    LoomError::Notation {
        line,
        message: message.into(),
    }
}

/// Pitch of a natural note letter above middle C.
fn natural_height(letter: char) -> Option<i32> {
    match letter.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

struct BodyParser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    unit_length: Fraction,
    key: Key,
    /// Explicit accidentals seen earlier in the bar, keyed by natural pitch.
    bar_accidentals: HashMap<i32, i32>,
}

impl BodyParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> LoomError {
        notation_error(self.line, message)
    }

    fn parse_into(&mut self, sequence: &mut Vec<Event>) -> Result<()> {
        while let Some(c) = self.peek() {
            match c {
                '|' | ':' | '[' | ']' => {
                    self.pos += 1;
                    self.bar_accidentals.clear();
                }
                ' ' | '\t' | '-' | '(' | ')' | '~' | '.' | '\\' => {
                    if c == '(' && self.chars.get(self.pos + 1).is_some_and(char::is_ascii_digit) {
                        return Err(self.error("tuplets are not supported"));
                    }
                    self.pos += 1;
                }
                '"' => self.skip_quoted()?,
                'z' | 'x' => {
                    self.pos += 1;
                    let duration = self.duration()?;
                    sequence.push(Event::rest(duration));
                }
                '^' | '_' | '=' | 'A'..='G' | 'a'..='g' => {
                    let event = self.note()?;
                    sequence.push(event);
                }
                other => return Err(self.error(format!("unexpected {:?}", other))),
            }
        }
        Ok(())
    }

    fn skip_quoted(&mut self) -> Result<()> {
        self.pos += 1;
        while let Some(c) = self.bump() {
            if c == '"' {
                return Ok(());
            }
        }
        Err(self.error("unterminated quoted string"))
    }

    fn note(&mut self) -> Result<Event> {
        let explicit = self.accidental();
        let letter = self
            .bump()
            .ok_or_else(|| self.error("accidental without a note"))?;
        let height = natural_height(letter).ok_or_else(|| {
            self.error(format!("expected a note after an accidental, got {:?}", letter))
        })?;

        let mut octave = if letter.is_ascii_lowercase() { 1 } else { 0 };
        while let Some(mark) = self.peek() {
            match mark {
                '\'' => octave += 1,
                ',' => octave -= 1,
                _ => break,
            }
            self.pos += 1;
        }

        let natural = 60 + 12 * octave + height;
        let adjustment = match explicit {
            Some(semitones) => {
                self.bar_accidentals.insert(natural, semitones);
                semitones
            }
            None => match self.bar_accidentals.get(&natural) {
                Some(&semitones) => semitones,
                None => self.key.accidental_for(letter),
            },
        };
        let midi = natural + adjustment;
        let midi = u8::try_from(midi)
            .ok()
            .filter(|m| *m <= 127)
            .ok_or_else(|| self.error(format!("note {} is out of MIDI range", midi)))?;

        let duration = self.duration()?;
        Ok(Event::note(duration, midi))
    }

    fn accidental(&mut self) -> Option<i32> {
        let semitones = match self.peek()? {
            '^' => 1,
            '_' => -1,
            '=' => {
                self.pos += 1;
                return Some(0);
            }
            _ => return None,
        };
        self.pos += 1;
        let doubled = match self.peek() {
            Some('^') if semitones > 0 => true,
            Some('_') if semitones < 0 => true,
            _ => false,
        };
        if doubled {
            self.pos += 1;
            Some(semitones * 2)
        } else {
            Some(semitones)
        }
    }

    fn number(&mut self) -> Result<Option<i64>> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Ok(None);
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse()
            .map(Some)
            .map_err(|_| self.error(format!("number {} is too large", digits)))
    }

    /// Length in cycles: unit length times the written multiplier, with a
    /// quarter note lasting one cycle.
    fn duration(&mut self) -> Result<Fraction> {
        let numer = self.number()?.unwrap_or(1);
        let mut denom: i64 = 1;
        while self.peek() == Some('/') {
            self.pos += 1;
            let divisor = self.number()?.unwrap_or(2);
            denom = denom
                .checked_mul(divisor)
                .ok_or_else(|| self.error("note length is too short"))?;
        }
        if numer <= 0 || denom <= 0 {
            return Err(self.error("note length must be positive"));
        }
        Fraction::new(numer, denom)
            .checked_mul(self.unit_length)
            .and_then(|length| length.checked_mul(Fraction::from_integer(4)))
            .ok_or_else(|| self.error("note length is out of range"))
    }
}
