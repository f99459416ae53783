//! The innermost part of the language's processing.
//!
//! The lexer is context-sensitive in two ways. First, dotted mnemonics
//! (`ldc.i4.s`, `bne.un`) share their lexical shape with dotted compound names
//! (`System.Console`), so identifier scanning speculatively extends across dots
//! and falls back via the cursor's pushback when the extended form is not
//! cataloged. Second, byte-array mode (toggled by the parser, which is the only
//! layer that can know a `(` opens hex data) switches the whole tokenizer into
//! hex-pair scanning until the closing parenthesis.
//!
//! The core is [`SourceCursor`]'s `read`/`peek`/`unread`, plus its mark/restore
//! checkpointing: every speculative scan (`...` vs `..`, directive names, dotted
//! mnemonics) brackets itself with a mark so that a miss leaves the input exactly
//! as it found it.

use compact_str::{format_compact, CompactString};

use crate::{
    diagnostics::ErrorKind,
    sources::{Location, SourceCursor},
    AsmError,
};

use super::tokens::{self, tok, Token, TokenPayload};

/// Characters (besides letters) that may start an identifier.
/// The dot only occurs in practice after a directive introducer, since the main
/// loop handles a leading `.` before identifier scanning gets a chance.
pub fn is_id_start(ch: char) -> bool {
    ch.is_alphabetic() || matches!(ch, '_' | '$' | '@' | '?' | '`' | '.')
}

/// Characters that may continue an identifier. Dots are not included; dotted
/// continuation is handled separately so that mnemonic lookup can backtrack.
pub fn is_id_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '$' | '@' | '?' | '`')
}

/// Produces one classified token per [`next_token`][Self::next_token] call.
///
/// The byte-array flag and the last emitted token are per-instance state, so
/// multiple tokenizers can run independently.
pub struct Tokenizer {
    cursor: SourceCursor,
    last_token: Option<Token>,
    in_byte_array: bool,
    observers: Vec<Box<dyn FnMut(&Token)>>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("cursor", &self.cursor)
            .field("last_token", &self.last_token)
            .field("in_byte_array", &self.in_byte_array)
            .finish_non_exhaustive()
    }
}

impl Tokenizer {
    pub fn new(source_name: &str, text: &str) -> Self {
        Self {
            cursor: SourceCursor::new(source_name, text),
            last_token: None,
            in_byte_array: false,
            observers: vec![],
        }
    }

    pub fn source_name(&self) -> &str {
        self.cursor.name()
    }

    /// The location of the next character to be lexed.
    pub fn location(&self) -> Location {
        self.cursor.location()
    }

    /// The previously emitted token, for lookahead-sensitive parser logic.
    pub fn last_token(&self) -> Option<&Token> {
        self.last_token.as_ref()
    }

    /// Switches hex-pair scanning on or off. Only the parser can know that an
    /// opening parenthesis introduces byte-array data, so the flag lives here
    /// but is driven from outside.
    pub fn set_byte_array_mode(&mut self, active: bool) {
        self.in_byte_array = active;
    }

    /// Registers a callback invoked for every emitted token, including the end
    /// marker the first (and only notified) time it is produced.
    pub fn on_token(&mut self, observer: impl FnMut(&Token) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn next_token(&mut self) -> Result<Token, AsmError> {
        // Idempotent end of stream: no further scanning, no further notifications.
        if let Some(token @ Token { payload: tok!("end of input"), .. }) = &self.last_token {
            return Ok(token.clone());
        }

        let token = loop {
            let location = self.cursor.location();
            let Some(ch) = self.cursor.read() else {
                break Token { payload: tok!("end of input"), location };
            };

            macro_rules! token {
                ($what:tt $(($($params:tt)+))?) => {
                    Token { payload: tok!($what $(($($params)+))?), location }
                };
            }

            // Comments.
            if ch == '/' {
                match self.cursor.peek() {
                    Some('/') => {
                        while let Some(ch) = self.cursor.read() {
                            if ch == '\n' {
                                break;
                            }
                        }
                        continue;
                    }
                    Some('*') => {
                        self.cursor.read();
                        // An unterminated block comment is absorbed to end of
                        // input without an error; grammar compatibility.
                        loop {
                            match self.cursor.read() {
                                None => break,
                                Some('*') if self.cursor.peek() == Some('/') => {
                                    self.cursor.read();
                                    break;
                                }
                                Some(_) => {}
                            }
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            // Byte-array mode: hex pairs and the closing parenthesis only.
            if self.in_byte_array {
                if ch.is_whitespace() {
                    continue;
                }
                if ch == ')' {
                    break token!(")");
                }
                let Some(high) = ch.to_digit(16) else {
                    return Err(self.lex_error(location, ch));
                };
                let mut value = high as u8;
                match self.cursor.peek() {
                    Some(low) if low.is_ascii_hexdigit() => {
                        self.cursor.read();
                        let low = low.to_digit(16).expect("Hex digit failed to convert!?");
                        value = value * 16 + low as u8;
                    }
                    Some(next) if !next.is_whitespace() && next != ')' => {
                        return Err(self.lex_error(self.cursor.location(), next));
                    }
                    Some(_) => {}
                    // A byte array cannot end mid-pair; the closing parenthesis
                    // has to be seen first.
                    None => {
                        return Err(AsmError {
                            kind: ErrorKind::Lexical,
                            location: Some(self.cursor.location()),
                            message: "unexpected end of input in byte array".into(),
                            file_path: self.cursor.name().into(),
                        });
                    }
                }
                while matches!(self.cursor.peek(), Some(ch) if ch.is_whitespace()) {
                    self.cursor.read();
                }
                break token!("hex byte"(value));
            }

            // Ellipsis; seeing two characters past the first dot needs a checkpoint.
            if ch == '.' && self.cursor.peek() == Some('.') {
                self.cursor.mark();
                self.cursor.read();
                if self.cursor.peek() == Some('.') {
                    self.cursor.read();
                    self.cursor.unmark();
                    break token!("...");
                }
                self.cursor.restore();
            }

            // Directive introducers, and `.5`-style floats.
            if ch == '.' || ch == '#' {
                match self.cursor.peek() {
                    Some(next) if ch == '.' && next.is_ascii_digit() => {
                        break Token { payload: self.scan_number(ch, location)?, location };
                    }
                    Some(next) if is_id_start(next) => {
                        self.cursor.mark();
                        let body = self.scan_plain_id();
                        let name = format_compact!("{ch}{body}");
                        if let Some(payload) = tokens::lookup_directive(&name) {
                            self.cursor.unmark();
                            break Token { payload, location };
                        }
                        // Not a directive: put the name back for the next call.
                        self.cursor.restore();
                        break if ch == '.' { token!(".") } else { token!("#") };
                    }
                    _ => break if ch == '.' { token!(".") } else { token!("#") },
                }
            }

            // Numbers; a bare `-` is punctuation, not a sign.
            if ch.is_ascii_digit() || ch == '-' {
                if ch == '-' && !matches!(self.cursor.peek(), Some(next) if next.is_ascii_digit())
                {
                    break token!("-");
                }
                break Token { payload: self.scan_number(ch, location)?, location };
            }

            // Punctuation.
            match ch {
                ':' => {
                    if self.cursor.peek() == Some(':') {
                        self.cursor.read();
                        break token!("::");
                    }
                    break token!(":");
                }
                '(' => break token!("("),
                ')' => break token!(")"),
                '{' => break token!("opening brace"),
                '}' => break token!("closing brace"),
                '[' => break token!("["),
                ']' => break token!("]"),
                '<' => break token!("<"),
                '>' => break token!(">"),
                ',' => break token!(","),
                ';' => break token!(";"),
                '=' => break token!("="),
                '!' => break token!("!"),
                '&' => break token!("&"),
                '+' => break token!("+"),
                '*' => break token!("*"),
                '/' => break token!("/"),
                _ => {}
            }

            // Strings.
            if ch == '"' {
                let contents = self.scan_string('"', location)?;
                break token!("quoted string"(contents));
            }
            if ch == '\'' {
                let contents = self.scan_string('\'', location)?;
                break token!("singly quoted string"(contents));
            }

            // Identifiers, keywords, mnemonics.
            if is_id_start(ch) {
                let mut name = format_compact!("{ch}");
                name.push_str(&self.scan_plain_id());
                break Token { payload: self.classify_name(name), location };
            }

            // Anything else falls through and is skipped.
        };

        for observer in &mut self.observers {
            observer(&token);
        }
        self.last_token = Some(token.clone());
        Ok(token)
    }

    /// Resolves a scanned name against the opcode and keyword catalogs,
    /// extending across dots where the catalogs call for it.
    fn classify_name(&mut self, name: CompactString) -> TokenPayload {
        if self.cursor.peek() == Some('.') {
            self.cursor.mark();
            self.cursor.read();
            match self.cursor.peek() {
                Some(next) if is_id_char(next) => {
                    let tail = self.scan_dotted_id();
                    let full = format_compact!("{name}.{tail}");
                    self.cursor.unmark();
                    if let Some(payload) = tokens::lookup_opcode(&full) {
                        return payload;
                    }
                    // A dotted name that is not a mnemonic is a single opaque
                    // compound name; the parser splits it if it needs to.
                    return tok!("compound name"(full));
                }
                Some(next) if next.is_whitespace() => {
                    // Mnemonics ending in a literal dot: `tail.`, `unaligned.`, ...
                    let with_dot = format_compact!("{name}.");
                    if let Some(payload) = tokens::lookup_opcode(&with_dot) {
                        self.cursor.unmark();
                        return payload;
                    }
                    // Leave the dot for the next call.
                    self.cursor.restore();
                }
                _ => self.cursor.restore(),
            }
        }

        if let Some(payload) = tokens::lookup_opcode(&name) {
            return payload;
        }
        if let Some(payload) = tokens::lookup_keyword(&name) {
            return payload;
        }
        tok!("identifier"(name))
    }

    /// Scans the continuation of an identifier (no dots); the starting character
    /// is the caller's to deal with.
    fn scan_plain_id(&mut self) -> CompactString {
        let mut name = CompactString::default();
        while let Some(ch) = self.cursor.peek() {
            if !is_id_char(ch) {
                break;
            }
            self.cursor.read();
            name.push(ch);
        }
        name
    }

    /// Scans an identifier body that may contain interior dots.
    /// An identifier never *ends* on a dot: a dot is only consumed once the
    /// character after it is known to continue the name.
    fn scan_dotted_id(&mut self) -> CompactString {
        let mut name = CompactString::default();
        loop {
            match self.cursor.peek() {
                Some(ch) if is_id_char(ch) => {
                    self.cursor.read();
                    name.push(ch);
                }
                Some('.') => {
                    self.cursor.mark();
                    self.cursor.read();
                    if matches!(self.cursor.peek(), Some(next) if is_id_char(next)) {
                        self.cursor.unmark();
                        name.push('.');
                    } else {
                        self.cursor.restore();
                        break;
                    }
                }
                _ => break,
            }
        }
        name
    }

    /// Scans a maximal numeric literal: optional sign, digits, optional fraction,
    /// optional exponent; or a `0x` hex integer. `first` is the already-consumed
    /// starting character; the caller has established that a literal follows
    /// (a sign or leading dot is always backed by a digit).
    fn scan_number(&mut self, mut first: char, location: Location) -> Result<TokenPayload, AsmError> {
        let mut text = CompactString::default();

        let negative = first == '-';
        if negative {
            text.push('-');
            first = self
                .cursor
                .read()
                .expect("Numeric sign with nothing after it!?");
        }

        if first == '0' && matches!(self.cursor.peek(), Some('x' | 'X')) {
            self.cursor.read();
            let mut digits = CompactString::default();
            while let Some(digit) = self.cursor.peek().filter(char::is_ascii_hexdigit) {
                self.cursor.read();
                digits.push(digit);
            }
            if digits.is_empty() {
                return Err(self.invalid_literal(location, "0x"));
            }
            // Hex constants are bit patterns; let them span the full 64 bits.
            let value = u64::from_str_radix(&digits, 16)
                .map_err(|_| self.invalid_literal(location, &digits))?
                as i64;
            let value = if negative { value.wrapping_neg() } else { value };
            return Ok(tok!("integer constant"(value)));
        }

        let mut is_float = false;
        if first == '.' {
            // `.5`-style literal; the caller guarantees the digit.
            text.push_str("0.");
            is_float = true;
        } else {
            text.push(first);
        }
        while let Some(digit) = self.cursor.peek().filter(char::is_ascii_digit) {
            self.cursor.read();
            text.push(digit);
        }

        if !is_float && self.cursor.peek() == Some('.') {
            self.cursor.mark();
            self.cursor.read();
            if matches!(self.cursor.peek(), Some(next) if next.is_ascii_digit()) {
                self.cursor.unmark();
                text.push('.');
                while let Some(digit) = self.cursor.peek().filter(char::is_ascii_digit) {
                    self.cursor.read();
                    text.push(digit);
                }
                is_float = true;
            } else {
                self.cursor.restore();
            }
        }

        if let Some(e @ ('e' | 'E')) = self.cursor.peek() {
            self.cursor.mark();
            self.cursor.read();
            let mut exponent = CompactString::default();
            exponent.push(e);
            if let Some(sign @ ('+' | '-')) = self.cursor.peek() {
                self.cursor.read();
                exponent.push(sign);
            }
            if matches!(self.cursor.peek(), Some(next) if next.is_ascii_digit()) {
                self.cursor.unmark();
                while let Some(digit) = self.cursor.peek().filter(char::is_ascii_digit) {
                    self.cursor.read();
                    exponent.push(digit);
                }
                text.push_str(&exponent);
                is_float = true;
            } else {
                self.cursor.restore();
            }
        }

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.invalid_literal(location, &text))?;
            Ok(tok!("float constant"(value)))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.invalid_literal(location, &text))?;
            Ok(tok!("integer constant"(value)))
        }
    }

    /// Scans the remainder of a quoted string; the opening delimiter has already
    /// been consumed. Both delimiters share the same escape rules.
    fn scan_string(
        &mut self,
        delimiter: char,
        start: Location,
    ) -> Result<CompactString, AsmError> {
        let mut contents = CompactString::default();
        loop {
            let Some(ch) = self.cursor.read() else {
                return Err(AsmError {
                    kind: ErrorKind::Lexical,
                    location: Some(start),
                    message: "unterminated string literal".into(),
                    file_path: self.cursor.name().into(),
                });
            };
            if ch == delimiter {
                break;
            }
            if ch != '\\' {
                contents.push(ch);
                continue;
            }
            match self.cursor.read() {
                Some('n') => contents.push('\n'),
                Some('t') => contents.push('\t'),
                Some('r') => contents.push('\r'),
                Some(ch @ ('\\' | '"' | '\'')) => contents.push(ch),
                Some(digit @ '0'..='7') => {
                    let mut value = digit.to_digit(8).expect("Octal digit failed to convert!?");
                    for _ in 0..2 {
                        match self.cursor.peek().and_then(|ch| ch.to_digit(8)) {
                            Some(digit) => {
                                self.cursor.read();
                                value = value * 8 + digit;
                            }
                            None => break,
                        }
                    }
                    // Three octal digits reach up to 511, past one byte; the
                    // whole value becomes the character.
                    let escaped =
                        char::from_u32(value).expect("Octal escape out of char range!?");
                    contents.push(escaped);
                }
                Some(other) => {
                    // Unknown escapes pass through verbatim.
                    contents.push('\\');
                    contents.push(other);
                }
                None => {
                    return Err(AsmError {
                        kind: ErrorKind::Lexical,
                        location: Some(start),
                        message: "unterminated string literal".into(),
                        file_path: self.cursor.name().into(),
                    });
                }
            }
        }
        Ok(contents)
    }

    fn lex_error(&self, location: Location, offending: char) -> AsmError {
        AsmError {
            kind: ErrorKind::Lexical,
            location: Some(location),
            message: format_compact!("unexpected character `{offending}`"),
            file_path: self.cursor.name().into(),
        }
    }

    fn invalid_literal(&self, location: Location, text: &str) -> AsmError {
        AsmError {
            kind: ErrorKind::InvalidLiteral,
            location: Some(location),
            message: format_compact!("malformed numeric literal `{text}`"),
            file_path: self.cursor.name().into(),
        }
    }
}
