use thiserror::Error;

/// A parsing error with source location.
///
/// `line` and `col` are 1-based positions coming from the lexer spans.
/// For errors at end of input the parser falls back to the last consumed
/// token's span so locations are never `0:0`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{line}:{col}: {message}")]
pub struct ParserError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A message collected while compiling. Errors make the result unusable;
/// warnings do not.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>, line: usize, col: usize) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            line,
            col,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<ParserError> for Diagnostic {
    fn from(err: ParserError) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: err.message,
            line: err.line,
            col: err.col,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    /// Formats as `line:col: severity: message` for CLI-friendly diagnostics.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}:{}: {}: {}", self.line, self.col, severity, self.message)
    }
}
