use std::fmt;

use thiserror::Error;

use crate::{exception::HostException, value::Value};

/// Represents a byte span within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// One-based line of `start` within `source`.
    pub fn line_in(&self, source: &str) -> usize {
        let end = self.start.min(source.len());
        source.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
    }
}

/// Script file and line an error was raised from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " in {} at line {}", self.file, self.line)
    }
}

/// Classification of a built-in failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Runtime,
}

impl DiagnosticKind {
    /// Name the failure carries once it is visible to scripts.
    pub fn error_name(self) -> &'static str {
        match self {
            DiagnosticKind::Lexer | DiagnosticKind::Parser => "SyntaxError",
            DiagnosticKind::Runtime => "Error",
        }
    }
}

/// Built-in failure raised by the lexer, parser or interpreter.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub location: Option<Location>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            location: None,
            notes: Vec::new(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Runtime, message)
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.error_name(), self.message)?;
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the resin host.
#[derive(Debug, Error)]
pub enum ResinError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("{0}")]
    Host(#[from] HostException),
    #[error("uncaught {value}")]
    Thrown {
        value: Value,
        span: Option<SourceSpan>,
        location: Option<Location>,
    },
    #[error("exit requested with status {0}")]
    Exit(u8),
}

impl ResinError {
    pub fn thrown(value: Value, span: SourceSpan) -> Self {
        ResinError::Thrown {
            value,
            span: Some(span),
            location: None,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            ResinError::Diagnostic(diag) => diag.location.as_ref(),
            ResinError::Host(exception) => exception.location.as_ref(),
            ResinError::Thrown { location, .. } => location.as_ref(),
            ResinError::Exit(_) => None,
        }
    }

    /// Records `span` as the failure site unless one is already known.
    pub(crate) fn at_call_site(mut self, site: SourceSpan) -> Self {
        if self.location().is_none() {
            if let Some(span) = self.span_mut() {
                if span.is_none() {
                    *span = Some(site);
                }
            }
        }
        self
    }

    /// Resolves the recorded span against the script it refers to.
    pub(crate) fn locate(mut self, file: &str, source: &str) -> Self {
        if self.location().is_some() {
            return self;
        }
        let line = match self.span_mut() {
            Some(Some(span)) => span.line_in(source),
            _ => return self,
        };
        let location = Some(Location {
            file: file.to_string(),
            line,
        });
        match &mut self {
            ResinError::Diagnostic(diag) => diag.location = location,
            ResinError::Host(exception) => exception.location = location,
            ResinError::Thrown { location: slot, .. } => *slot = location,
            ResinError::Exit(_) => {}
        }
        self
    }

    fn span_mut(&mut self) -> Option<&mut Option<SourceSpan>> {
        match self {
            ResinError::Diagnostic(diag) => Some(&mut diag.span),
            ResinError::Host(exception) => Some(&mut exception.span),
            ResinError::Thrown { span, .. } => Some(span),
            ResinError::Exit(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResinError>;
