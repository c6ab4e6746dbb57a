use thiserror::Error;

/// Error raised while executing compiled Lingo.
///
/// `call_stack` is filled innermost first as the error unwinds through
/// handler calls.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("runtime error: {message}{}", format_call_stack(.call_stack))]
pub struct RuntimeError {
    pub message: String,
    pub call_stack: Vec<String>,
}

fn format_call_stack(call_stack: &[String]) -> String {
    let mut out = String::new();
    if !call_stack.is_empty() {
        out.push_str("\n  call stack:");
        for (i, frame) in call_stack.iter().enumerate() {
            out.push_str(&format!("\n    {}: {}", i, frame));
        }
    }
    out
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
            call_stack: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.call_stack.push(context.to_string());
        self
    }
}

pub fn type_error(op: &str, expected: &str, got: &str) -> RuntimeError {
    RuntimeError::new(format!(
        "type error in {}: expected {}, got {}",
        op, expected, got
    ))
}

pub fn stack_underflow(op: &str) -> RuntimeError {
    RuntimeError::new(format!("stack underflow in {}", op))
}

pub fn division_by_zero() -> RuntimeError {
    RuntimeError::new("division by zero")
}

pub fn undefined_handler(name: &str) -> RuntimeError {
    RuntimeError::new(format!("undefined handler '{}'", name))
}

pub fn index_out_of_bounds(index: i64, len: usize) -> RuntimeError {
    RuntimeError::new(format!("index {} out of bounds for list of {}", index, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_call_stack() {
        let err = RuntimeError::new("boom")
            .with_context("inner")
            .with_context("outer");
        let text = err.to_string();
        assert!(text.starts_with("runtime error: boom"));
        assert!(text.contains("0: inner"));
        assert!(text.contains("1: outer"));
    }

    #[test]
    fn test_display_without_call_stack() {
        assert_eq!(division_by_zero().to_string(), "runtime error: division by zero");
    }
}
