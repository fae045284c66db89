//! Frame tags.
//!
//! Every data frame of a message is described by a single byte in the
//! description frame, naming the role of that frame. The set of tags is
//! fixed; unknown bytes received from peers are still representable so that
//! they can be passed through or ignored by the receiving schema.
use std::fmt;

/// Semantic role of a data frame.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(u8);

impl Tag {
    /// Terminates a description.
    pub const END: Self = Self(0x00);
    /// Global (cross-station) identifier.
    pub const GLOBAL_ID: Self = Self(0x01);
    /// Sub-title of a broadcast.
    pub const SUB_TITLE: Self = Self(0x02);
    /// Title of a broadcast.
    pub const PUB_TITLE: Self = Self(b'*');
    /// Execution plan.
    pub const PLAN: Self = Self(b'P');
    /// Call argument or broadcast content.
    pub const ARGUMENT: Self = Self(b'A');
    /// Request identifier.
    pub const REQUEST_ID: Self = Self(b'I');
    /// Originator of a request.
    pub const REQUESTER: Self = Self(b'R');
    /// Originator of a broadcast. Same wire byte as [`Tag::REQUESTER`].
    pub const PUBLISHER: Self = Self::REQUESTER;
    /// Receiver of a request.
    pub const RESPONDER: Self = Self(b'G');
    /// Receiver of a broadcast. Same wire byte as [`Tag::RESPONDER`].
    pub const SUBSCRIBER: Self = Self::RESPONDER;
    /// Call context.
    pub const CONTEXT: Self = Self(b'T');
    /// Raw value of a message whose schema isn't known to the receiver.
    pub const BINARY_VALUE: Self = Self(b'B');

    /// Create a tag from its wire byte.
    pub const fn new(byte: u8) -> Self {
        Self(byte)
    }

    /// The wire byte of this tag.
    pub const fn byte(&self) -> u8 {
        self.0
    }

    /// Human-readable name, if this is one of the known tags.
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::END => "end",
            Self::GLOBAL_ID => "global-id",
            Self::SUB_TITLE => "sub-title",
            Self::PUB_TITLE => "pub-title",
            Self::PLAN => "plan",
            Self::ARGUMENT => "argument",
            Self::REQUEST_ID => "request-id",
            Self::REQUESTER => "requester",
            Self::RESPONDER => "responder",
            Self::CONTEXT => "context",
            Self::BINARY_VALUE => "binary-value",
            _ => return None,
        };
        Some(name)
    }
}

impl From<u8> for Tag {
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{:#04x}", self.0),
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

/// Command byte placed in the status position of outbound descriptions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Command(u8);

impl Command {
    /// Generic command, used by broadcasts.
    pub const GENERAL: Self = Self(0x01);

    /// The wire byte of this command.
    pub const fn byte(&self) -> u8 {
        self.0
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> Self {
        cmd.0
    }
}
