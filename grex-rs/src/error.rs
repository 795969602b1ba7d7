/// Represents all possible errors that can occur in the grex library.
///
/// Directory parsing, detection, extraction and configuration loading all report
/// failures through this enum. Which variant is returned tells the caller how far
/// the failure reaches: a `ConstraintViolation` only ends one parse attempt, while
/// `Truncated` and `CodecFailure` only affect a single resource.
#[derive(Debug)]
pub enum GrexError {
    /// A structural field failed a validator check (implausible count, offset, length or name).
    ConstraintViolation(String),
    /// A declared span reaches past the live size of its container.
    Truncated {
        /// The logical name of the resource being extracted.
        name: String,
        /// The end of the declared span.
        end: u64,
        /// The size of the container at extraction time.
        size: u64,
    },
    /// A decode transform could not produce the declared number of bytes.
    CodecFailure(String),
    /// Parallel chunk or block arrays differ in length. This is a descriptor bug, not bad input.
    ArityMismatch(String),
    /// Every registered descriptor scored at or below the minimum viable score.
    NoMatchingFormat(String),
    /// The selected descriptor failed to parse the directory of the candidate.
    ParseFailed {
        /// The name of the descriptor that was selected.
        format: String,
        /// The error raised while parsing.
        reason: Box<GrexError>,
    },
    /// A named entry or a file on disk could not be found.
    FileNotFound(String),
    /// A configuration, hint or dictionary file is malformed.
    InvalidData(String),
    /// A long running decode was cancelled between blocks.
    Cancelled,
    /// Represents an error that occurs during I/O operations.
    Io(std::io::Error),
}

impl GrexError {
    pub(crate) fn constraint(message: impl Into<String>) -> Self {
        GrexError::ConstraintViolation(message.into())
    }

    pub(crate) fn codec(message: impl Into<String>) -> Self {
        GrexError::CodecFailure(message.into())
    }

    /// Returns `true` when the error means "the data does not look like this format".
    ///
    /// Detection treats these as a failed sub-check instead of a broken descriptor.
    pub fn is_mismatch(&self) -> bool {
        match self {
            GrexError::ConstraintViolation(_) => true,
            GrexError::Io(err) => err.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

/// Provides a user-friendly string representation for each error variant in `GrexError`.
impl std::fmt::Display for GrexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrexError::ConstraintViolation(err) => write!(f, "Constraint violation: {err}"),
            GrexError::Truncated { name, end, size } => write!(
                f,
                "Resource {name} is truncated: span ends at {end} but the container holds {size} bytes"
            ),
            GrexError::CodecFailure(err) => write!(f, "Codec failure: {err}"),
            GrexError::ArityMismatch(err) => write!(f, "Arity mismatch: {err}"),
            GrexError::NoMatchingFormat(name) => write!(f, "No matching format for {name}"),
            GrexError::ParseFailed { format, reason } => write!(
                f,
                "File did not match the {format} format after all: {reason}"
            ),
            GrexError::FileNotFound(name) => write!(f, "File not found: {name}"),
            GrexError::InvalidData(err) => write!(f, "Invalid data: {err}"),
            GrexError::Cancelled => write!(f, "Operation cancelled"),
            GrexError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for GrexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GrexError::Io(err) => Some(err),
            GrexError::ParseFailed { reason, .. } => Some(reason.as_ref()),
            _ => None,
        }
    }
}

/// Allows automatic conversion from `std::io::Error` to `GrexError`.
impl From<std::io::Error> for GrexError {
    fn from(error: std::io::Error) -> Self {
        GrexError::Io(error)
    }
}

/// Lets codec failures travel through `std::io::Read` implementations.
///
/// The original variant is recovered by [`GrexError::from_stream`].
impl From<GrexError> for std::io::Error {
    fn from(error: GrexError) -> Self {
        match error {
            GrexError::Io(err) => err,
            other => std::io::Error::other(other),
        }
    }
}

impl GrexError {
    /// Converts an error raised while pulling decoded bytes back into a `GrexError`.
    ///
    /// Errors that wrap a `GrexError` are unwrapped, everything else is a codec failure
    /// since the stream sits on top of an already bounds-checked span.
    pub(crate) fn from_stream(error: std::io::Error, codec: &str) -> Self {
        if error
            .get_ref()
            .is_some_and(|inner| inner.is::<GrexError>())
        {
            if let Some(inner) = error.into_inner() {
                if let Ok(grex) = inner.downcast::<GrexError>() {
                    return *grex;
                }
            }
            return GrexError::codec(format!("{codec}: stream failed"));
        }
        GrexError::codec(format!("{codec}: {error}"))
    }
}
