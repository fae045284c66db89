use std::fmt;
use std::string::FromUtf8Error;

/// Layout sub-code: the description frame is absent or too short.
pub const MISSING_HEADER: i32 = -1;
/// Layout sub-code: the declared frame count doesn't match the message.
pub const FRAME_COUNT_MISMATCH: i32 = -2;

/// Decoding error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("missing header: description is {len} byte(s) long")]
    MissingHeader { len: usize },
    #[error("frame count mismatch: expected {expected}, got {actual}")]
    FrameCountMismatch { expected: usize, actual: usize },
    #[error("too few frames: expected at least {min}, got {actual}")]
    TooFewFrames { min: usize, actual: usize },
    #[error("description has no tag for frame {index}")]
    MissingTag { index: usize },
    #[error("too many tags: {count} exceeds the limit of 255")]
    TooManyTags { count: usize },
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] FromUtf8Error),
}

impl Error {
    /// Whether the message violates its own description, as opposed to
    /// failing for another reason while being decoded.
    pub fn is_layout(&self) -> bool {
        matches!(
            self,
            Self::MissingHeader { .. } | Self::FrameCountMismatch { .. } | Self::TooFewFrames { .. }
        )
    }

    /// Numeric sub-code reported alongside [`crate::State::Invalid`].
    pub fn code(&self) -> i32 {
        match self {
            Self::MissingHeader { .. } | Self::TooFewFrames { .. } => MISSING_HEADER,
            Self::FrameCountMismatch { .. } => FRAME_COUNT_MISMATCH,
            Self::MissingTag { .. } | Self::TooManyTags { .. } | Self::Utf8(_) => 0,
        }
    }
}

/// An unexpected fault, captured instead of being propagated to the caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error(transparent)]
    Wire(#[from] Error),
    #[error("transport panicked: {0}")]
    Panic(String),
}

/// Error reported by the underlying transport: an error number and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub code: i32,
    pub text: String,
}

impl NativeError {
    /// No such file or endpoint.
    pub const ENOENT: i32 = 2;
    /// Resource temporarily unavailable. The only transient error.
    pub const EAGAIN: i32 = 11;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
    /// Broken pipe: the peer went away.
    pub const EPIPE: i32 = 32;
    /// Operation not supported by this kind of socket.
    pub const ENOTSUP: i32 = 95;
    /// Address already in use.
    pub const EADDRINUSE: i32 = 98;
    /// Connection refused.
    pub const ECONNREFUSED: i32 = 111;
    /// Operation not supported by the socket's state machine.
    pub const EFSM: i32 = 156384763;
    /// The socket was terminated.
    pub const ETERM: i32 = 156384765;

    pub fn new(code: i32, text: impl ToString) -> Self {
        Self {
            code,
            text: text.to_string(),
        }
    }

    /// Build an error from a known error number, with its standard text.
    pub fn from_code(code: i32) -> Self {
        let text = match code {
            Self::ENOENT => "No such file or directory",
            Self::EAGAIN => "Resource temporarily unavailable",
            Self::EINVAL => "Invalid argument",
            Self::EPIPE => "Broken pipe",
            Self::ENOTSUP => "Operation not supported",
            Self::EADDRINUSE => "Address already in use",
            Self::ECONNREFUSED => "Connection refused",
            Self::EFSM => "Operation cannot be accomplished in current state",
            Self::ETERM => "Context was terminated",
            _ => "Unknown error",
        };
        Self::new(code, text)
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_again(&self) -> bool {
        self.code == Self::EAGAIN
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (errno {})", self.text, self.code)
    }
}

impl std::error::Error for NativeError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_layout_codes() {
        assert_eq!(Error::MissingHeader { len: 1 }.code(), MISSING_HEADER);
        assert_eq!(
            Error::FrameCountMismatch {
                expected: 2,
                actual: 3
            }
            .code(),
            FRAME_COUNT_MISMATCH
        );
        assert!(!Error::MissingTag { index: 1 }.is_layout());
    }

    #[test]
    fn test_native_error() {
        let err = NativeError::from_code(NativeError::EAGAIN);

        assert!(err.is_again());
        assert_eq!(err.to_string(), "Resource temporarily unavailable (errno 11)");
        assert!(!NativeError::from_code(NativeError::EPIPE).is_again());
    }
}
