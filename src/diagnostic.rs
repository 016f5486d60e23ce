use super::token::Span;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    TotalityViolation,
    PurityViolation,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DiagnosticKind::TotalityViolation => write!(f, "totality violation"),
            DiagnosticKind::PurityViolation => write!(f, "purity violation"),
        }
    }
}

/// A static finding against one `@pure` function.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub function: String,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn line(&self) -> usize {
        self.span.line
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "line {}: {} in `{}`: {}",
            self.span.line, self.kind, self.function, self.message
        )
    }
}
