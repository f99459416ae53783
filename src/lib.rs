//! Core of a bidirectional translator for CIL textual assembly.
//!
//! The forward direction is a hand-written, context-sensitive lexer
//! ([`syntax::lexer::Tokenizer`]) producing classified tokens from source text;
//! the reverse direction is a method-body renderer ([`disasm::Disassembler`])
//! turning decoded instructions and exception-handler regions back into the
//! same textual syntax. [`diagnostics::Report`] carries the per-job message,
//! warning, and error plumbing shared by both directions.

pub mod diagnostics;
pub mod disasm;
pub mod sources;
pub mod syntax;

pub use diagnostics::{AsmError, ErrorKind, Report, Warning};
pub use disasm::{Disassembler, MethodBody};
pub use sources::{Location, SourceCursor};
pub use syntax::lexer::Tokenizer;
pub use syntax::tokens::{Token, TokenPayload};
