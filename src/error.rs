use super::diagnostic::Diagnostic;
use failure::{Backtrace, Context, Fail};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, Debug, PartialEq, Fail)]
pub enum ErrorKind {
    #[fail(display = "lex error at byte {}: {}", offset, message)]
    Lex { offset: usize, message: String },
    #[fail(display = "parse error at line {}: {}", line, message)]
    Parse {
        offset: usize,
        line: usize,
        message: String,
    },
    #[fail(display = "program rejected with {} diagnostic(s)", _0)]
    Rejected(DiagnosticCount),
    #[fail(display = "undefined reference to `{}`", _0)]
    UndefinedReference(String),
    #[fail(display = "arithmetic overflow in {}", _0)]
    Overflow(String),
    #[fail(display = "division by zero")]
    DivisionByZero,
    #[fail(display = "type mismatch: {}", _0)]
    TypeMismatch(String),
    #[fail(display = "incomparable values: {}", _0)]
    Incomparable(String),
    #[fail(display = "non-reversible operation: {}", _0)]
    NonReversibleOperation(String),
    #[fail(display = "budget exhausted: {}", _0)]
    BudgetExhausted(String),
}

/// Diagnostics attached to a rejected program.
#[derive(Clone, Debug, PartialEq)]
pub struct DiagnosticCount(pub Vec<Diagnostic>);

impl fmt::Display for DiagnosticCount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.len())
    }
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.inner.get_context()
    }

    /// Diagnostics of a program the checker refused, empty for every other kind.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self.kind() {
            ErrorKind::Rejected(DiagnosticCount(diagnostics)) => diagnostics,
            _ => &[],
        }
    }

    pub(crate) fn rejected(diagnostics: Vec<Diagnostic>) -> Error {
        Error::from(ErrorKind::Rejected(DiagnosticCount(diagnostics)))
    }

    pub(crate) fn parse(offset: usize, line: usize, message: impl Into<String>) -> Error {
        Error::from(ErrorKind::Parse {
            offset,
            line,
            message: message.into(),
        })
    }

    pub(crate) fn mismatch(message: impl Into<String>) -> Error {
        Error::from(ErrorKind::TypeMismatch(message.into()))
    }

    pub(crate) fn irreversible(message: impl Into<String>) -> Error {
        Error::from(ErrorKind::NonReversibleOperation(message.into()))
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(inner: Context<ErrorKind>) -> Error {
        Error { inner }
    }
}
