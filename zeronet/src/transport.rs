//! Messaging transport.
//!
//! The protocol sits on top of any transport that offers socket patterns,
//! atomic multi-part messages and per-socket options. Errors are reported as
//! [`NativeError`]s, carrying the transport's own error number.
pub mod inproc;

use std::fmt;

use crate::wire::{Message, NativeError};

/// Socket pattern.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SocketKind {
    /// Strict request/reply client: every send must be followed by exactly
    /// one receive.
    Request,
    /// Request/reply server.
    Reply,
    /// Asynchronous request client.
    Dealer,
    /// Broadcasting socket.
    Publish,
    /// Receiving end of broadcasts, filtered by topic.
    Subscribe,
}

impl SocketKind {
    /// Whether the socket is able to send.
    pub fn can_send(&self) -> bool {
        !matches!(self, Self::Subscribe)
    }

    /// Whether the socket is able to receive.
    pub fn can_recv(&self) -> bool {
        !matches!(self, Self::Publish)
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Request => "REQ",
            Self::Reply => "REP",
            Self::Dealer => "DEALER",
            Self::Publish => "PUB",
            Self::Subscribe => "SUB",
        };
        write!(f, "{s}")
    }
}

/// Socket option. Durations are in milliseconds, limits in messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketOption {
    Identity(Vec<u8>),
    ReconnectInterval(i32),
    ReconnectIntervalMax(i32),
    Linger(i32),
    ReceiveTimeout(i32),
    SendTimeout(i32),
    Backlog(i32),
    ReceiveHighWaterMark(i32),
    SendHighWaterMark(i32),
    /// Topic prefix filter. An empty filter matches every message.
    Subscribe(Vec<u8>),
}

impl SocketOption {
    /// Option name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity(_) => "IDENTITY",
            Self::ReconnectInterval(_) => "RECONNECT_IVL",
            Self::ReconnectIntervalMax(_) => "RECONNECT_IVL_MAX",
            Self::Linger(_) => "LINGER",
            Self::ReceiveTimeout(_) => "RCVTIMEO",
            Self::SendTimeout(_) => "SNDTIMEO",
            Self::Backlog(_) => "BACKLOG",
            Self::ReceiveHighWaterMark(_) => "RCVHWM",
            Self::SendHighWaterMark(_) => "SNDHWM",
            Self::Subscribe(_) => "SUBSCRIBE",
        }
    }
}

/// A transport able to create sockets.
pub trait Transport {
    type Socket: Socket;

    /// Create a socket of the given kind.
    fn socket(&self, kind: SocketKind) -> Result<Self::Socket, NativeError>;
}

/// A transport socket.
///
/// Sockets are not meant to be shared: every operation takes `&mut self`,
/// so one socket has one logical owner at a time.
pub trait Socket {
    /// The pattern of this socket.
    fn kind(&self) -> SocketKind;
    /// Set an option. Options apply to endpoints bound or connected after
    /// they are set.
    fn set_option(&mut self, option: SocketOption) -> Result<(), NativeError>;
    /// Accept connections on the given address.
    fn bind(&mut self, addr: &str) -> Result<(), NativeError>;
    /// Stop accepting connections on the given address.
    fn unbind(&mut self, addr: &str) -> Result<(), NativeError>;
    /// Connect to the given address.
    fn connect(&mut self, addr: &str) -> Result<(), NativeError>;
    /// Disconnect from the given address.
    fn disconnect(&mut self, addr: &str) -> Result<(), NativeError>;
    /// Addresses this socket is bound to.
    fn binds(&self) -> Vec<String>;
    /// Addresses this socket is connected to.
    fn connects(&self) -> Vec<String>;
    /// Send a multi-part message atomically, waiting at most the configured
    /// send timeout.
    fn send(&mut self, message: Message) -> Result<(), NativeError>;
    /// Receive a multi-part message, waiting at most the configured receive
    /// timeout.
    fn recv(&mut self) -> Result<Message, NativeError>;
    /// Release the socket's resources.
    fn close(&mut self);

    /// Comma-separated summary of the socket's endpoints, for diagnostics.
    fn endpoints(&self) -> String {
        let mut addrs = self.connects();
        addrs.extend(self.binds());
        addrs.join(",")
    }
}
