//! Error taxonomy for the embedded host
//!
//! Three kinds of failure can escape a compile call:
//!
//! - [`CompilerError`]: the stylesheet was bad and the compiler said so.
//!   Recoverable; the compiler stays up.
//! - [`ProtocolError`]: the compiler misbehaved on the wire. The child is
//!   torn down and restarted on the next compile.
//! - [`LifecycleError`]: host-side lifecycle got in the way - a timeout, a
//!   user-requested restart, a shutdown, or a compiler that would not
//!   start.
//!
//! Host-function and value-model failures (`sass_values::ValueError`) never
//! escape a compile: the dispatcher converts them to wire error fields and
//! the compiler reports them as ordinary compilation failures.

use url::Url;

/// A location in a stylesheet. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Byte offset from the start of the source
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// A span in a stylesheet, as reported by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// The text the span covers
    pub text: String,
    /// URL of the stylesheet, when it has one
    pub url: Option<Url>,
    pub start: Location,
    /// Exclusive end, when the span covers more than a point
    pub end: Option<Location>,
    /// Surrounding text, for excerpts
    pub context: Option<String>,
}

/// Severity of a diagnostic emitted during compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `@warn` or a compiler warning
    Warning,
    /// Use of a deprecated feature
    Deprecation,
    /// `@debug`
    Debug,
}

/// A warning, deprecation, or debug message collected during compilation.
///
/// Available on success and on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerMessage {
    pub kind: MessageKind,
    pub message: String,
    pub span: Option<Span>,
    pub stack_trace: Option<String>,
    /// The compiler's pre-formatted rendition, ready to print
    pub formatted: String,
}

impl std::fmt::Display for CompilerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.formatted.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}", self.formatted)
        }
    }
}

/// The compilation failed cleanly.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerError {
    pub message: String,
    pub span: Option<Span>,
    pub stack_trace: Option<String>,
    /// Diagnostics collected before the failure
    pub messages: Vec<CompilerMessage>,
    /// The compiler's pre-formatted description, what a CLI would print
    pub description: String,
}

impl std::fmt::Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}", self.description)
        }
    }
}

impl std::error::Error for CompilerError {}

/// The compiler broke the protocol: malformed frame, unknown message kind,
/// unexpected id, or a version mismatch. The child process is torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    pub message: String,
}

impl ProtocolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sass compiler protocol error: {}", self.message)
    }
}

impl std::error::Error for ProtocolError {}

/// Host-side lifecycle failure: timeout, restart, shutdown, or a compiler
/// that could not start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleError {
    pub message: String,
}

impl LifecycleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LifecycleError {}

/// Any failure a compile call can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Compiler(CompilerError),
    Protocol(ProtocolError),
    Lifecycle(LifecycleError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Compiler(e) => write!(f, "{}", e),
            Error::Protocol(e) => write!(f, "{}", e),
            Error::Lifecycle(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Compiler(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Lifecycle(e) => Some(e),
        }
    }
}

impl From<CompilerError> for Error {
    fn from(e: CompilerError) -> Self {
        Error::Compiler(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<LifecycleError> for Error {
    fn from(e: LifecycleError) -> Self {
        Error::Lifecycle(e)
    }
}
