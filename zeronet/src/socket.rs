//! Socket lifecycle.
//!
//! Sockets are created in one of two roles. *Service* sockets bind to an
//! address and expect many short-lived peers; *client* sockets connect to
//! a service. Each role applies its own table of options, see [`OptionSet`].
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::transport::{Socket, SocketKind, SocketOption, Transport};
use crate::wire::NativeError;

/// Error creating a socket.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to create {kind} socket for {addr}: {err}")]
    Create {
        addr: String,
        kind: SocketKind,
        err: NativeError,
    },
    #[error("failed to set option {option} on {kind} socket for {addr}: {err}")]
    Option {
        addr: String,
        kind: SocketKind,
        option: &'static str,
        err: NativeError,
    },
    #[error("failed to bind {kind} socket to {addr}: {err}")]
    Bind {
        addr: String,
        kind: SocketKind,
        err: NativeError,
    },
    #[error("failed to connect {kind} socket to {addr}: {err}")]
    Connect {
        addr: String,
        kind: SocketKind,
        err: NativeError,
    },
}

impl Error {
    /// The native transport error.
    pub fn native(&self) -> &NativeError {
        match self {
            Self::Create { err, .. }
            | Self::Option { err, .. }
            | Self::Bind { err, .. }
            | Self::Connect { err, .. } => err,
        }
    }
}

/// Socket role.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Role {
    /// Binds to its address.
    Service,
    /// Connects to its address.
    Client,
}

/// Options applied to a socket when it is created. Durations are in
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSet {
    /// Initial reconnection interval of peers.
    pub reconnect_interval: i32,
    /// Maximum reconnection interval of peers.
    pub reconnect_interval_max: i32,
    /// How long pending messages are kept after the socket is closed.
    pub linger: i32,
    /// How long a receive waits for a message.
    pub receive_timeout: i32,
    /// How long a send waits for queue space. Not set on subscribers.
    pub send_timeout: i32,
    /// Queue of pending connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlog: Option<i32>,
    /// Inbound queue limit.
    pub receive_hwm: i32,
    /// Outbound queue limit.
    pub send_hwm: i32,
    /// Whether the outbound queue limit also applies to subscribers.
    #[serde(default)]
    pub subscriber_send_hwm: bool,
}

impl OptionSet {
    /// Options of bound sockets: short linger, to shut down fast under load,
    /// and a deep backlog for many transient clients.
    pub fn service() -> Self {
        Self {
            reconnect_interval: 10,
            reconnect_interval_max: 500,
            linger: 200,
            receive_timeout: 5000,
            send_timeout: 500,
            backlog: Some(10000),
            receive_hwm: 4096,
            send_hwm: 4096,
            subscriber_send_hwm: false,
        }
    }

    /// Options of connected sockets: a longer linger lets in-flight sends
    /// drain before teardown.
    pub fn client() -> Self {
        Self {
            reconnect_interval: 10,
            reconnect_interval_max: 500,
            linger: 1000,
            receive_timeout: 5000,
            send_timeout: 500,
            backlog: None,
            receive_hwm: 4096,
            send_hwm: 4096,
            subscriber_send_hwm: true,
        }
    }

    /// Defaults for the given role.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Service => Self::service(),
            Role::Client => Self::client(),
        }
    }

    /// The options to set on a socket of the given kind, in order.
    ///
    /// Subscribers get a topic filter; `None` subscribes to everything.
    pub fn options(
        &self,
        kind: SocketKind,
        identity: &[u8],
        subscribe: Option<&str>,
    ) -> Vec<SocketOption> {
        let subscriber = kind == SocketKind::Subscribe;
        let mut options = vec![
            SocketOption::Identity(identity.to_vec()),
            SocketOption::ReconnectInterval(self.reconnect_interval),
            SocketOption::ReconnectIntervalMax(self.reconnect_interval_max),
            SocketOption::Linger(self.linger),
            SocketOption::ReceiveTimeout(self.receive_timeout),
        ];
        if let Some(backlog) = self.backlog {
            options.push(SocketOption::Backlog(backlog));
        }
        options.push(SocketOption::ReceiveHighWaterMark(self.receive_hwm));

        if !subscriber || self.subscriber_send_hwm {
            options.push(SocketOption::SendHighWaterMark(self.send_hwm));
        }
        if subscriber {
            let filter = subscribe.unwrap_or_default();
            options.push(SocketOption::Subscribe(filter.as_bytes().to_vec()));
        } else {
            options.push(SocketOption::SendTimeout(self.send_timeout));
        }
        options
    }
}

/// An owned socket, along with the address it was created for.
///
/// The socket is closed when the handle is dropped.
#[derive(Debug)]
pub struct Handle<S: Socket> {
    socket: S,
    addr: String,
    role: Role,
    closed: bool,
}

impl<S: Socket> Handle<S> {
    /// The address the socket was created for.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The role of the socket.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether the handle was closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the socket. See [`close`].
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        close(&mut self.socket);
        self.closed = true;
    }
}

impl<S: Socket> Deref for Handle<S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.socket
    }
}

impl<S: Socket> DerefMut for Handle<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.socket
    }
}

impl<S: Socket> Drop for Handle<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Disconnect and unbind every endpoint of the socket, then release it.
///
/// Failures are logged and don't prevent the remaining endpoints from being
/// released. Safe to call on a socket that is already degraded or closed.
pub fn close<S: Socket + ?Sized>(socket: &mut S) {
    for addr in socket.connects() {
        if let Err(err) = socket.disconnect(&addr) {
            log::error!(
                target: "socket",
                "CloseSocket: {}! Address: {}.", err.text, socket.connects().join(",")
            );
        }
    }
    for addr in socket.binds() {
        if let Err(err) = socket.unbind(&addr) {
            log::error!(
                target: "socket",
                "CloseSocket: {}! Address: {}.", err.text, socket.binds().join(",")
            );
        }
    }
    socket.close();
}

/// Create a socket in the service role, bound to the given address.
pub fn service<T: Transport>(
    transport: &T,
    options: &OptionSet,
    addr: &str,
    kind: SocketKind,
    identity: &[u8],
    subscribe: Option<&str>,
) -> Result<Handle<T::Socket>, Error> {
    create(transport, Role::Service, options, addr, kind, identity, subscribe)
}

/// Create a socket in the client role, connected to the given address.
pub fn client<T: Transport>(
    transport: &T,
    options: &OptionSet,
    addr: &str,
    kind: SocketKind,
    identity: &[u8],
    subscribe: Option<&str>,
) -> Result<Handle<T::Socket>, Error> {
    create(transport, Role::Client, options, addr, kind, identity, subscribe)
}

/// Create a request client with the default client options.
pub fn request<T: Transport>(
    transport: &T,
    addr: &str,
    identity: &[u8],
) -> Result<Handle<T::Socket>, Error> {
    client(
        transport,
        &OptionSet::client(),
        addr,
        SocketKind::Request,
        identity,
        None,
    )
}

/// Create a dealer client with the default client options.
pub fn dealer<T: Transport>(
    transport: &T,
    addr: &str,
    identity: &[u8],
) -> Result<Handle<T::Socket>, Error> {
    client(
        transport,
        &OptionSet::client(),
        addr,
        SocketKind::Dealer,
        identity,
        None,
    )
}

/// Create a subscriber with the default client options. An empty topic
/// subscribes to every broadcast.
pub fn subscriber<T: Transport>(
    transport: &T,
    addr: &str,
    identity: &[u8],
    topic: &str,
) -> Result<Handle<T::Socket>, Error> {
    client(
        transport,
        &OptionSet::client(),
        addr,
        SocketKind::Subscribe,
        identity,
        Some(topic),
    )
}

fn create<T: Transport>(
    transport: &T,
    role: Role,
    options: &OptionSet,
    addr: &str,
    kind: SocketKind,
    identity: &[u8],
    subscribe: Option<&str>,
) -> Result<Handle<T::Socket>, Error> {
    let mut socket = transport.socket(kind).map_err(|err| {
        log::error!(target: "socket", "CreateSocket: {} Address:{addr} type:{kind}.", err.text);
        Error::Create {
            addr: addr.to_owned(),
            kind,
            err,
        }
    })?;

    for option in options.options(kind, identity, subscribe) {
        let name = option.name();

        if let Err(err) = socket.set_option(option) {
            log::error!(
                target: "socket",
                "CreateSocket: {} Option:{name} Address:{addr} type:{kind}.", err.text
            );
            close(&mut socket);

            return Err(Error::Option {
                addr: addr.to_owned(),
                kind,
                option: name,
                err,
            });
        }
    }

    let result = match role {
        Role::Service => socket.bind(addr).map_err(|err| Error::Bind {
            addr: addr.to_owned(),
            kind,
            err,
        }),
        Role::Client => socket.connect(addr).map_err(|err| Error::Connect {
            addr: addr.to_owned(),
            kind,
            err,
        }),
    };
    if let Err(err) = result {
        log::error!(
            target: "socket",
            "CreateSocket: {} address:{addr} type:{kind}.", err.native().text
        );
        close(&mut socket);

        return Err(err);
    }
    log::debug!(target: "socket", "Created {kind} {role:?} socket for {addr}");

    Ok(Handle {
        socket,
        addr: addr.to_owned(),
        role,
        closed: false,
    })
}
