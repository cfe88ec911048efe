//! Runtime error values.

use mythos_util::Span;
use thiserror::Error;

use crate::value::Value;

/// The runtime error subtypes of the language.
///
/// `Error` covers user-thrown values (`throw expr`) and generic runtime
/// failures such as exceeding the call depth limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Type,
    Name,
    Index,
    Key,
    Arity,
    Error,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ErrorKind::Type => "TypeError",
            ErrorKind::Name => "NameError",
            ErrorKind::Index => "IndexError",
            ErrorKind::Key => "KeyError",
            ErrorKind::Arity => "ArityError",
            ErrorKind::Error => "Error",
        };
        f.write_str(text)
    }
}

/// One entry of a captured call stack, innermost last.
#[derive(Clone, Debug)]
pub struct FrameInfo {
    pub function: String,
    pub span: Span,
}

/// A runtime error with position and the call stack captured at the
/// throw site.
#[derive(Clone, Debug, Error)]
#[error("{kind}: {message}")]
pub struct VmError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub stack: Vec<FrameInfo>,
    /// Payload of a user `throw`; `None` for VM-raised errors.
    pub value: Option<Value>,
}

impl VmError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            stack: Vec::new(),
            value: None,
        }
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Type, message, span)
    }

    pub fn name_error(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Name, message, span)
    }

    pub fn index_error(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Index, message, span)
    }

    pub fn key_error(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Key, message, span)
    }

    pub fn arity_error(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Arity, message, span)
    }

    /// A user-thrown error carrying the thrown value.
    pub fn thrown(value: Value, message: String, span: Span) -> Self {
        Self {
            kind: ErrorKind::Error,
            message,
            span,
            stack: Vec::new(),
            value: Some(value),
        }
    }

    /// Fill in the span if the error was raised without one (builtins
    /// do not know their call site).
    pub fn with_span(mut self, span: Span) -> Self {
        if self.span == Span::DUMMY {
            self.span = span;
        }
        self
    }

    /// Multi-line report: message, position, and call stack.
    pub fn report(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        if self.span.line > 0 {
            let _ = write!(out, "{} at {}", self, self.span);
        } else {
            let _ = write!(out, "{}", self);
        }
        for frame in self.stack.iter().rev() {
            let _ = write!(out, "\n  in {} at {}", frame.function, frame.span);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        let err = VmError::type_error("cannot add number and null", Span::new(0, 1, 3, 7));
        assert_eq!(err.to_string(), "TypeError: cannot add number and null");
    }

    #[test]
    fn test_report_includes_position_and_stack() {
        let mut err = VmError::name_error("name 'foo' is not defined", Span::new(0, 1, 2, 5));
        err.stack = vec![
            FrameInfo {
                function: "<main>".into(),
                span: Span::new(0, 1, 1, 1),
            },
            FrameInfo {
                function: "f".into(),
                span: Span::new(0, 1, 2, 5),
            },
        ];
        let report = err.report();
        assert!(report.contains("NameError"));
        assert!(report.contains("at 2:5"));
        assert!(report.contains("in f"));
        assert!(report.contains("in <main>"));
    }

    #[test]
    fn test_with_span_only_fills_dummy() {
        let err = VmError::type_error("x", Span::DUMMY).with_span(Span::new(0, 0, 5, 1));
        assert_eq!(err.span.line, 5);
        let err = VmError::type_error("x", Span::new(0, 0, 2, 2)).with_span(Span::new(0, 0, 5, 1));
        assert_eq!(err.span.line, 2);
    }
}
