//! Diagnostics and the public error type for the Ryx pipeline.
//!
//! Every stage accumulates [`Diagnostic`] records into an [`ErrorList`];
//! the pipeline converts a failed stage's list into one [`CompileError`]
//! variant. The core never prints and never emits escape sequences;
//! rendering (color, carets) is the caller's concern.

use core::fmt;

use thiserror::Error;

/// A single error record with its source location.
///
/// Line and column are 1-based. A line or column of 0 means the error has
/// no precise location (for example, a file-level problem).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Diagnostic {
    pub fn new(
        message: impl Into<String>,
        file: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Diagnostic {
            message: message.into(),
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {}", self.message)?;
        if !self.file.is_empty() {
            write!(f, "\n --> {}:{}:{}", self.file, self.line, self.column)?;
        }
        Ok(())
    }
}

/// An ordered collection of diagnostics, preserving insertion order.
#[derive(Debug, Default, Clone)]
pub struct ErrorList {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorList {
    pub fn new() -> Self {
        ErrorList::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Returns the text of a 1-based line of `source`, without its terminator.
///
/// Used by callers that want to print the offending line under a
/// diagnostic.
pub fn source_line(source: &str, line: usize) -> Option<&str> {
    if line == 0 {
        return None;
    }
    source
        .lines()
        .nth(line - 1)
        .map(|text| text.trim_end_matches('\r'))
}

/// The error a pipeline stage surfaces to its caller.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("{0}")]
    Lex(Diagnostic),
    #[error("parsing failed with {} error(s)", .0.len())]
    Parse(Vec<Diagnostic>),
    #[error("semantic analysis failed with {} error(s)", .0.len())]
    Semantic(Vec<Diagnostic>),
}

impl CompileError {
    /// All diagnostics carried by this error, in insertion order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::SourceIo(_) => &[],
            CompileError::Lex(diagnostic) => core::slice::from_ref(diagnostic),
            CompileError::Parse(list) | CompileError::Semantic(list) => list,
        }
    }
}
