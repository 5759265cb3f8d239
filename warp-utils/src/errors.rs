//! Errors generated by the IR and the pass framework.
use crate::position::GPosIdx;
use itertools::Itertools;

/// Convenience wrapper to represent success or a meaningful compiler error.
pub type WarpResult<T> = std::result::Result<T, Error>;

/// An error with an optional source position attached to it.
pub struct Error {
    kind: Box<ErrorKind>,
    pos: Option<GPosIdx>,
    /// Additional notes attached after the main message.
    post_msg: Option<String>,
}

/// The different kinds of failure the compiler core distinguishes. The
/// builder surface never produces a malformed graph; it fails with one of
/// these instead.
enum ErrorKind {
    /// A caller-supplied value violates a documented precondition.
    InvalidArgument(String),
    /// An operation was attempted on a disposed builder, a replaced value,
    /// or a sealed target.
    InvalidState(String),
    /// A rebuild or specialisation was given mismatched methods or an
    /// incomplete mapping.
    Incompatible(String),
    /// An invariant violation that should have been prevented.
    Internal(String),
    /// Miscellaneous failures outside the IR proper (pass registration,
    /// unknown pass names).
    Misc(String),
}

impl ErrorKind {
    fn message(&self) -> &str {
        match self {
            ErrorKind::InvalidArgument(msg)
            | ErrorKind::InvalidState(msg)
            | ErrorKind::Incompatible(msg)
            | ErrorKind::Internal(msg)
            | ErrorKind::Misc(msg) => msg,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument(_) => "invalid argument",
            ErrorKind::InvalidState(_) => "invalid state",
            ErrorKind::Incompatible(_) => "incompatible",
            ErrorKind::Internal(_) => "internal",
            ErrorKind::Misc(_) => "error",
        }
    }
}

impl Error {
    pub fn invalid_argument<S: ToString>(msg: S) -> Self {
        Self::from_kind(ErrorKind::InvalidArgument(msg.to_string()))
    }

    pub fn invalid_state<S: ToString>(msg: S) -> Self {
        Self::from_kind(ErrorKind::InvalidState(msg.to_string()))
    }

    pub fn incompatible<S: ToString>(msg: S) -> Self {
        Self::from_kind(ErrorKind::Incompatible(msg.to_string()))
    }

    pub fn internal<S: ToString>(msg: S) -> Self {
        Self::from_kind(ErrorKind::Internal(msg.to_string()))
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::from_kind(ErrorKind::Misc(msg.to_string()))
    }

    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            pos: None,
            post_msg: None,
        }
    }

    /// Attach a source position to the error.
    pub fn with_pos(mut self, pos: GPosIdx) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Attach a note rendered after the main message.
    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(*self.kind, ErrorKind::InvalidArgument(_))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(*self.kind, ErrorKind::InvalidState(_))
    }

    pub fn is_incompatible(&self) -> bool {
        matches!(*self.kind, ErrorKind::Incompatible(_))
    }

    pub fn message(&self) -> &str {
        self.kind.message()
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.prefix(), self.kind.message())?;
        if let Some(pos) = self.pos {
            if pos != GPosIdx::UNKNOWN {
                write!(f, " ({})", pos.format_location())?;
            }
        }
        if let Some(post) = &self.post_msg {
            write!(f, ". {post}")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for Error {}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::internal(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::internal(err.to_string())
    }
}

/// An aggregate of errors, used by drivers that keep going after the first
/// failing method or pass.
pub struct MultiError {
    errors: Vec<Error>,
}

impl MultiError {
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }
}

impl std::fmt::Debug for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.errors.iter().map(|e| format!("{e:?}")).join("\n"))
    }
}

impl std::fmt::Display for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for MultiError {}

impl From<Error> for MultiError {
    fn from(err: Error) -> Self {
        Self { errors: vec![err] }
    }
}

impl From<Vec<Error>> for MultiError {
    fn from(errors: Vec<Error>) -> Self {
        Self { errors }
    }
}
