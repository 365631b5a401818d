//! Errors generated by the compiler.
use thiserror::Error as ThisError;

/// Convenience wrapper to represent success or a meaningful compiler error.
pub type EsiResult<T> = std::result::Result<T, Error>;

/// Errors generated by the compiler
pub struct Error {
    kind: Box<ErrorKind>,
    post_msg: Option<String>,
}

/// The different kinds of compile-time errors.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The hardware type cannot be represented in the supported Cap'n Proto
    /// subset.
    #[error("Unsupported type `{ty}': {reason}")]
    UnsupportedType { ty: String, reason: String },

    /// The generated schema did not survive the round trip through the schema
    /// compiler. Always a compiler bug.
    #[error("internal error: schema round-trip failed: {0}")]
    InternalSchema(String),

    /// An operand does not have the shape the schema demands.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The circuit IR is malformed.
    #[error("Malformed structure: {0}")]
    MalformedStructure(String),

    /// Failed to parse a type or schema string.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The input file is invalid (does not exist).
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    /// Failed to write the output
    #[error("Failed to write output: {0}")]
    WriteError(String),

    /// A miscellaneous error. Should be replaced with a more precise error.
    #[error("{0}")]
    Misc(String),
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            post_msg: None,
        }
    }

    /// Attach a note that is printed after the main message.
    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    pub fn unsupported_type<T: ToString, S: ToString>(ty: T, reason: S) -> Self {
        Self::new(ErrorKind::UnsupportedType {
            ty: ty.to_string(),
            reason: reason.to_string(),
        })
    }
    pub fn internal_schema<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::InternalSchema(msg.to_string()))
    }
    pub fn shape_mismatch<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::ShapeMismatch(msg.to_string()))
    }
    pub fn malformed_structure<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::MalformedStructure(msg.to_string()))
    }
    pub fn parse_error<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Parse(msg.to_string()))
    }
    pub fn invalid_file<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::InvalidFile(msg.to_string()))
    }
    pub fn write_error<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::WriteError(msg.to_string()))
    }
    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::new(ErrorKind::Misc(msg.to_string()))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn is_unsupported_type(&self) -> bool {
        matches!(*self.kind, ErrorKind::UnsupportedType { .. })
    }

    pub fn is_internal(&self) -> bool {
        matches!(*self.kind, ErrorKind::InternalSchema(_))
    }

    /// The full message, including the note if there is one.
    pub fn message(&self) -> String {
        match &self.post_msg {
            Some(post) => format!("{}\n{}", self.kind, post),
            None => self.kind.to_string(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

// Printed as-is so that `main` returning an error shows something sensible.
impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::invalid_file(format!("Invalid UTF-8: {err}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::write_error(format!("IO Error: {err}"))
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::write_error(format!("Formatting Error: {err}"))
    }
}
