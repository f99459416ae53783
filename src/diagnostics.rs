//! Diagnostic reporting for assembly and disassembly jobs.
//!
//! Errors are fatal: building one through [`Report::error`] notifies any observers
//! and hands back an [`AsmError`] for the caller to propagate, which unwinds the
//! whole job. Warnings and messages return normally.

use std::io::Write;

use compact_str::CompactString;
use thiserror::Error;
use yansi::Paint;

use crate::sources::Location;

/// Warning codes, rendered as `ILW####`.
/// The numeric values are part of the output contract; never renumber them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, displaydoc::Display)]
pub enum Warning {
    /// packing size is not zero or a power of two between 1 and 128
    InvalidPackingSize = 1,
    /// layout attributes are ignored on auto layout types
    LayoutIgnored = 2,
    /// declared size differs from the computed size
    SizeMismatch = 3,
    /// unknown escape sequence in string literal
    UnknownEscape = 4,
}

impl Warning {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Error codes, rendered as `ILE####`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, displaydoc::Display)]
pub enum ErrorKind {
    /// malformed or unexpected character sequence
    Lexical = 1,
    /// malformed literal value
    InvalidLiteral = 2,
    /// invalid directive argument
    InvalidDirective = 3,
    /// construct is not supported
    Unsupported = 4,
}

impl ErrorKind {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// The structured failure that aborts an assembly job.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", self.render())]
pub struct AsmError {
    pub kind: ErrorKind,
    pub location: Option<Location>,
    pub message: CompactString,
    pub file_path: CompactString,
}

impl AsmError {
    fn render(&self) -> String {
        match self.location {
            Some(location) => format!(
                "{}:{location}: Error ILE{:04}: {}",
                self.file_path,
                self.kind.code(),
                self.message,
            ),
            None => format!("Error ILE{:04}: {}", self.kind.code(), self.message),
        }
    }
}

/// Per-job diagnostic configuration: three independently replaceable sinks, a
/// quiet flag (suppressing plain messages only), and observer lists.
///
/// One `Report` is expected per assembly/disassembly job; it is deliberately not
/// global state, so concurrent jobs and tests cannot interfere with each other.
pub struct Report {
    message_out: Box<dyn Write>,
    warning_out: Box<dyn Write>,
    error_out: Box<dyn Write>,
    pub quiet: bool,
    file_path: CompactString,
    location: Option<Location>,
    message_observers: Vec<Box<dyn FnMut(&str)>>,
    warning_observers: Vec<Box<dyn FnMut(Warning, Option<Location>, &str)>>,
    error_observers: Vec<Box<dyn FnMut(&AsmError)>>,
}

impl std::fmt::Debug for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Report")
            .field("quiet", &self.quiet)
            .field("file_path", &self.file_path)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new(
            Box::new(std::io::stdout()),
            Box::new(std::io::stdout()),
            Box::new(std::io::stderr()),
        )
    }
}

impl Report {
    pub fn new(
        message_out: Box<dyn Write>,
        warning_out: Box<dyn Write>,
        error_out: Box<dyn Write>,
    ) -> Self {
        Self {
            message_out,
            warning_out,
            error_out,
            quiet: false,
            file_path: CompactString::default(),
            location: None,
            message_observers: vec![],
            warning_observers: vec![],
            error_observers: vec![],
        }
    }

    pub fn set_file_path(&mut self, path: &str) {
        self.file_path = path.into();
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Updates the fallback location used when a diagnostic carries none;
    /// drivers keep this pointed at the active tokenizer's position.
    pub fn set_location(&mut self, location: Option<Location>) {
        self.location = location;
    }

    pub fn on_message(&mut self, observer: impl FnMut(&str) + 'static) {
        self.message_observers.push(Box::new(observer));
    }

    pub fn on_warning(
        &mut self,
        observer: impl FnMut(Warning, Option<Location>, &str) + 'static,
    ) {
        self.warning_observers.push(Box::new(observer));
    }

    pub fn on_error(&mut self, observer: impl FnMut(&AsmError) + 'static) {
        self.error_observers.push(Box::new(observer));
    }

    /// Builds the fatal failure for the current job and notifies observers.
    /// The caller must propagate the returned error; nothing is retried.
    #[must_use]
    pub fn error(
        &mut self,
        kind: ErrorKind,
        location: Option<Location>,
        message: impl Into<CompactString>,
    ) -> AsmError {
        let err = AsmError {
            kind,
            location: location.or(self.location),
            message: message.into(),
            file_path: self.file_path.clone(),
        };
        for observer in &mut self.error_observers {
            observer(&err);
        }
        err
    }

    /// Writes a fatal error to the error sink; meant for the outermost driver
    /// once the job has unwound.
    pub fn print_error(&mut self, err: &AsmError) {
        writeln!(self.error_out, "{}", err.red()).expect("Failed to print diagnostic");
    }

    /// Reports a warning and continues. The warning sink can only be silenced by
    /// replacing it, never by the quiet flag.
    pub fn warning(&mut self, warning: Warning, location: Option<Location>, message: &str) {
        let location = location.or(self.location);
        for observer in &mut self.warning_observers {
            observer(warning, location, message);
        }

        let location_str = match location {
            Some(location) => format!("{}:{location}: ", self.file_path),
            None => String::new(),
        };
        let line = format!(
            "{location_str}Warning ILW{:04}: {message}",
            warning.code()
        );
        writeln!(self.warning_out, "{}", line.yellow()).expect("Failed to print diagnostic");
    }

    /// Reports a plain informational message; suppressed by the quiet flag.
    pub fn message(&mut self, message: &str) {
        for observer in &mut self.message_observers {
            observer(message);
        }
        if self.quiet {
            return;
        }
        writeln!(self.message_out, "{message}").expect("Failed to print diagnostic");
    }
}
