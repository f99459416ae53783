use std::fmt::Display;

use compact_str::CompactString;

/// A 1-based position within a source file.
///
/// A fresh `Location` is produced for every character consumed, and gets attached
/// to the tokens and diagnostics that character gives rise to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub const START: Self = Self { line: 1, column: 1 };
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.line, self.column)
    }
}

/// Character-level reader over a source text, with pushback and checkpointing.
///
/// The cursor tracks the location of the next character to be consumed.
/// Note that [`unread`][Self::unread] does *not* rewind the location; speculative
/// scans that need location accuracy must bracket themselves with
/// [`mark`][Self::mark] and [`restore`][Self::restore] (the snapshot covers the
/// read position, the pending pushback, and the location, so a `restore` undoes
/// everything a speculative scan did).
#[derive(Debug)]
pub struct SourceCursor {
    name: CompactString,
    text: Vec<char>,
    pos: usize,
    pushback: Vec<char>,
    location: Location,
    marks: Vec<Snapshot>,
}

#[derive(Debug)]
struct Snapshot {
    pos: usize,
    pushback: Vec<char>,
    location: Location,
}

impl SourceCursor {
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.into(),
            text: text.chars().collect(),
            pos: 0,
            pushback: vec![],
            location: Location::START,
            marks: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The location of the next character that [`read`][Self::read] would return.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Consumes one character, advancing the location.
    /// Reading past the end of input is idempotent, and keeps yielding `None`.
    pub fn read(&mut self) -> Option<char> {
        let ch = match self.pushback.pop() {
            Some(ch) => ch,
            None => {
                let ch = *self.text.get(self.pos)?;
                self.pos += 1;
                ch
            }
        };
        if ch == '\n' {
            self.location.line += 1;
            self.location.column = 1;
        } else {
            self.location.column += 1;
        }
        Some(ch)
    }

    /// Returns the next character without consuming it.
    pub fn peek(&self) -> Option<char> {
        match self.pushback.last() {
            Some(&ch) => Some(ch),
            None => self.text.get(self.pos).copied(),
        }
    }

    /// Pushes one character back; the next [`read`][Self::read] returns it.
    pub fn unread(&mut self, ch: char) {
        self.pushback.push(ch);
    }

    /// Pushes a whole sequence back; a subsequent run of [`read`][Self::read]s
    /// observes it in original order.
    pub fn unread_all(&mut self, seq: &str) {
        for ch in seq.chars().rev() {
            self.pushback.push(ch);
        }
    }

    /// Saves the current position, pushback, and location.
    /// Marks nest; each [`restore`][Self::restore] or [`unmark`][Self::unmark]
    /// pops the most recent one.
    pub fn mark(&mut self) {
        self.marks.push(Snapshot {
            pos: self.pos,
            pushback: self.pushback.clone(),
            location: self.location,
        });
    }

    /// Reverts to the most recent [`mark`][Self::mark], discarding it.
    pub fn restore(&mut self) {
        let snapshot = self
            .marks
            .pop()
            .expect("Restoring a source cursor with no active mark!?");
        self.pos = snapshot.pos;
        self.pushback = snapshot.pushback;
        self.location = snapshot.location;
    }

    /// Discards the most recent [`mark`][Self::mark] without reverting.
    pub fn unmark(&mut self) {
        self.marks
            .pop()
            .expect("Unmarking a source cursor with no active mark!?");
    }
}
