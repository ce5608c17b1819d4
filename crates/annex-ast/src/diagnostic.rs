//! Diagnostic shape shared with the host compiler

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    Warning,
    Error,
    Suggestion,
    Message,
}

/// File reference carried by a diagnostic. Only the name and text are
/// needed to render it, so synthetic files can be built from a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticFile {
    pub file_name: String,
    pub text: String,
}

/// Zero-based position inside a named file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub file_name: String,
    pub line: usize,
    pub column: usize,
}

/// Nested explanation attached to a diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChain {
    pub message_text: String,
    pub position: Option<Position>,
    pub next: Vec<MessageChain>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: i32,
    pub file: Option<DiagnosticFile>,
    pub start: Option<usize>,
    pub length: Option<usize>,
    pub chain: Option<MessageChain>,
    /// Location outside any parsed file, such as a metadata position
    pub position: Option<Position>,
    /// Producer of the diagnostic, `None` for the host compiler itself
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message_text: impl Into<String>, code: i32) -> Self {
        Self {
            message_text: message_text.into(),
            category: DiagnosticCategory::Error,
            code,
            file: None,
            start: None,
            length: None,
            chain: None,
            position: None,
            source: None,
        }
    }

    /// Informational message without a location.
    pub fn message(message_text: impl Into<String>, source: &str) -> Self {
        Self {
            category: DiagnosticCategory::Message,
            source: Some(source.to_string()),
            ..Self::error(message_text, 0)
        }
    }

    pub fn with_location(mut self, file: DiagnosticFile, start: usize, length: usize) -> Self {
        self.file = Some(file);
        self.start = Some(start);
        self.length = Some(length);
        self
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }

    /// Message text followed by the chain, one entry per line, nested
    /// entries indented by two spaces per level.
    pub fn flatten_message(&self) -> String {
        let mut out = self.message_text.clone();
        if let Some(chain) = &self.chain {
            flatten_chain(chain, 1, &mut out);
        }
        out
    }
}

fn flatten_chain(chain: &MessageChain, depth: usize, out: &mut String) {
    out.push('\n');
    out.push_str(&"  ".repeat(depth));
    out.push_str(&chain.message_text);
    for next in &chain.next {
        flatten_chain(next, depth + 1, out);
    }
}

/// Zero-based line and column of a byte offset in `text`.
pub fn line_and_character_of(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = &text[..offset];
    let line = before.matches('\n').count();
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    (line, offset - line_start)
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::Warning => write!(f, "warning"),
            DiagnosticCategory::Error => write!(f, "error"),
            DiagnosticCategory::Suggestion => write!(f, "suggestion"),
            DiagnosticCategory::Message => write!(f, "message"),
        }
    }
}
