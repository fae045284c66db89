use std::fmt;

/// Outcome of an operation.
///
/// Peers carry this in byte `1` of a response description. The local
/// variants (`LocalSendError`, `LocalRecvError`, `Exception`) are never sent
/// by well-behaved stations but share the same byte space so that every
/// outcome has a single representation.
///
/// The set of values is part of the protocol and must stay stable. Bytes
/// outside of it decode to [`State::Unknown`], which preserves the value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum State {
    Ok,
    Plan,
    Running,
    Bye,
    Welcome,
    Error,
    Failed,
    NotFound,
    NotSupport,
    /// The message didn't match its own description.
    Invalid,
    ArgumentInvalid,
    Timeout,
    NetError,
    Unavailable,
    LocalSendError,
    /// The transport failed to send or receive.
    LocalRecvError,
    /// Unexpected fault while talking to the transport or decoding.
    Exception,
    Unknown(u8),
}

impl State {
    /// Whether this is [`State::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<u8> for State {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => Self::Ok,
            0x01 => Self::Plan,
            0x02 => Self::Running,
            0x03 => Self::Bye,
            0x04 => Self::Welcome,
            0x81 => Self::Error,
            0x82 => Self::Failed,
            0x83 => Self::NotFound,
            0x84 => Self::NotSupport,
            0x85 => Self::Invalid,
            0x86 => Self::ArgumentInvalid,
            0x87 => Self::Timeout,
            0x88 => Self::NetError,
            0x89 => Self::Unavailable,
            0xf1 => Self::LocalSendError,
            0xf2 => Self::LocalRecvError,
            0xff => Self::Exception,
            other => Self::Unknown(other),
        }
    }
}

impl From<State> for u8 {
    fn from(state: State) -> Self {
        match state {
            State::Ok => 0x00,
            State::Plan => 0x01,
            State::Running => 0x02,
            State::Bye => 0x03,
            State::Welcome => 0x04,
            State::Error => 0x81,
            State::Failed => 0x82,
            State::NotFound => 0x83,
            State::NotSupport => 0x84,
            State::Invalid => 0x85,
            State::ArgumentInvalid => 0x86,
            State::Timeout => 0x87,
            State::NetError => 0x88,
            State::Unavailable => 0x89,
            State::LocalSendError => 0xf1,
            State::LocalRecvError => 0xf2,
            State::Exception => 0xff,
            State::Unknown(other) => other,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(byte) => write!(f, "unknown({byte:#04x})"),
            other => write!(f, "{other:?}"),
        }
    }
}
