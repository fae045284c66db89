//! In-process transport.
//!
//! Sockets created from the same [`Hub`] talk to each other through
//! bounded queues. The patterns follow the usual semantics:
//!
//! * `REQ` strictly alternates send and receive, and fails with `EFSM`
//!   otherwise. After a receive timeout, the socket is still waiting for
//!   its reply.
//! * `REP` must send exactly one reply for every request it receives.
//! * `DEALER` sends to its peers in turn, without a state machine.
//! * `PUB` fans messages out to the subscribers whose filter is a prefix of
//!   the first frame, dropping messages for subscribers that are full.
//! * `SUB` only receives. It may either connect to a bound `PUB`, or bind
//!   and have `PUB` sockets connect to it.
//!
//! Unlike network transports, an address must be bound before it can be
//! connected to.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel as chan;

use crate::transport::{Socket, SocketKind, SocketOption, Transport};
use crate::wire::{Message, NativeError};

/// A message in flight, along with where to send the reply.
#[derive(Debug)]
struct Delivery {
    message: Message,
    reply: Option<chan::Sender<Delivery>>,
}

#[derive(Debug)]
struct Subscriber {
    socket: u64,
    filters: Vec<Vec<u8>>,
    sender: chan::Sender<Delivery>,
}

impl Subscriber {
    fn matches(&self, message: &Message) -> bool {
        matches(&self.filters, message)
    }
}

/// Whether one of the topic filters is a prefix of the first frame.
fn matches(filters: &[Vec<u8>], message: &Message) -> bool {
    let topic = message.first().map(Vec::as_slice).unwrap_or_default();
    filters.iter().any(|f| topic.starts_with(f))
}

#[derive(Debug)]
struct Endpoint {
    socket: u64,
    kind: SocketKind,
    inbox: chan::Sender<Delivery>,
    /// Topic filters of a bound `SUB` socket.
    filters: Vec<Vec<u8>>,
    subscribers: Vec<Subscriber>,
}

#[derive(Debug, Default)]
struct Registry {
    endpoints: HashMap<String, Endpoint>,
    sockets: u64,
}

/// Registry of in-process endpoints. Cheap to clone.
#[derive(Debug, Default, Clone)]
pub struct Hub {
    registry: Arc<Mutex<Registry>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether something is bound to the given address.
    pub fn is_bound(&self, addr: &str) -> bool {
        self.lock().endpoints.contains_key(addr)
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for Hub {
    type Socket = InprocSocket;

    fn socket(&self, kind: SocketKind) -> Result<InprocSocket, NativeError> {
        let id = {
            let mut registry = self.lock();
            registry.sockets += 1;
            registry.sockets
        };
        Ok(InprocSocket::new(id, kind, self.clone()))
    }
}

#[derive(Debug)]
struct Peer {
    addr: String,
    sender: Option<chan::Sender<Delivery>>,
}

/// Where a request/reply socket is in its send/receive cycle.
#[derive(Debug, Default)]
enum Cycle {
    #[default]
    Idle,
    /// A `REQ` socket sent a request and waits for the reply.
    AwaitingReply,
    /// A `REP` socket received a request and owes a reply.
    Replying(chan::Sender<Delivery>),
}

/// A socket of the in-process transport.
#[derive(Debug)]
pub struct InprocSocket {
    id: u64,
    kind: SocketKind,
    hub: Hub,
    options: Vec<SocketOption>,
    identity: Vec<u8>,
    receive_timeout: Option<Duration>,
    send_timeout: Option<Duration>,
    receive_hwm: usize,
    filters: Vec<Vec<u8>>,
    inbox: Option<(chan::Sender<Delivery>, chan::Receiver<Delivery>)>,
    binds: Vec<String>,
    peers: Vec<Peer>,
    next: usize,
    cycle: Cycle,
    closed: bool,
}

impl InprocSocket {
    /// Default high-water mark, in messages.
    pub const DEFAULT_HWM: usize = 1000;

    fn new(id: u64, kind: SocketKind, hub: Hub) -> Self {
        Self {
            id,
            kind,
            hub,
            options: Vec::new(),
            identity: Vec::new(),
            receive_timeout: None,
            send_timeout: None,
            receive_hwm: Self::DEFAULT_HWM,
            filters: Vec::new(),
            inbox: None,
            binds: Vec::new(),
            peers: Vec::new(),
            next: 0,
            cycle: Cycle::Idle,
            closed: false,
        }
    }

    /// Options set on this socket, in the order they were set.
    pub fn options(&self) -> &[SocketOption] {
        &self.options
    }

    /// The socket identity.
    pub fn identity(&self) -> &[u8] {
        &self.identity
    }

    /// Whether the socket was closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn inbox(&mut self) -> (chan::Sender<Delivery>, chan::Receiver<Delivery>) {
        let hwm = self.receive_hwm;
        let (tx, rx) = self.inbox.get_or_insert_with(|| {
            // A high-water mark of zero means no limit.
            if hwm == 0 {
                chan::unbounded()
            } else {
                chan::bounded(hwm)
            }
        });
        (tx.clone(), rx.clone())
    }

    fn check_open(&self) -> Result<(), NativeError> {
        if self.closed {
            return Err(NativeError::from_code(NativeError::ETERM));
        }
        Ok(())
    }

    fn can_connect(&self, bound: SocketKind) -> bool {
        matches!(
            (self.kind, bound),
            (SocketKind::Request | SocketKind::Dealer, SocketKind::Reply)
                | (SocketKind::Subscribe, SocketKind::Publish)
                | (SocketKind::Publish, SocketKind::Subscribe)
        )
    }

    fn deliver(&mut self, delivery: Delivery) -> Result<(), NativeError> {
        if self.peers.is_empty() {
            return Err(NativeError::from_code(NativeError::EAGAIN));
        }
        let peer = &self.peers[self.next % self.peers.len()];
        self.next = self.next.wrapping_add(1);

        let Some(sender) = &peer.sender else {
            return Err(NativeError::from_code(NativeError::ENOTSUP));
        };
        let result = match self.send_timeout {
            Some(timeout) => sender.send_timeout(delivery, timeout).map_err(|e| match e {
                chan::SendTimeoutError::Timeout(_) => NativeError::EAGAIN,
                chan::SendTimeoutError::Disconnected(_) => NativeError::EPIPE,
            }),
            None => sender.send(delivery).map_err(|_| NativeError::EPIPE),
        };
        result.map_err(NativeError::from_code)
    }

    fn publish(&mut self, message: Message) {
        let mut registry = self.hub.lock();

        for peer in &self.peers {
            let Some(endpoint) = registry.endpoints.get(&peer.addr) else {
                continue;
            };
            if !matches(&endpoint.filters, &message) {
                continue;
            }
            let delivery = Delivery {
                message: message.clone(),
                reply: None,
            };
            if let Err(chan::TrySendError::Full(_)) = endpoint.inbox.try_send(delivery) {
                log::debug!(target: "inproc", "Subscriber at {} is full, dropping message", peer.addr);
            }
        }

        for addr in &self.binds {
            let Some(endpoint) = registry.endpoints.get_mut(addr) else {
                continue;
            };
            endpoint.subscribers.retain(|sub| {
                if !sub.matches(&message) {
                    return true;
                }
                let delivery = Delivery {
                    message: message.clone(),
                    reply: None,
                };
                match sub.sender.try_send(delivery) {
                    Ok(()) => true,
                    Err(chan::TrySendError::Full(_)) => {
                        log::debug!(target: "inproc", "Subscriber {} is full, dropping message", sub.socket);
                        true
                    }
                    Err(chan::TrySendError::Disconnected(_)) => false,
                }
            });
        }
    }

    fn wait(&mut self) -> Result<Delivery, NativeError> {
        let (_, rx) = self.inbox();
        let received = match self.receive_timeout {
            None => rx.recv().map_err(|_| NativeError::ETERM),
            Some(timeout) if timeout.is_zero() => rx.try_recv().map_err(|e| match e {
                chan::TryRecvError::Empty => NativeError::EAGAIN,
                chan::TryRecvError::Disconnected => NativeError::ETERM,
            }),
            Some(timeout) => rx.recv_timeout(timeout).map_err(|e| match e {
                chan::RecvTimeoutError::Timeout => NativeError::EAGAIN,
                chan::RecvTimeoutError::Disconnected => NativeError::ETERM,
            }),
        };
        received.map_err(NativeError::from_code)
    }
}

/// Convert a millisecond option to a timeout; negative means "wait forever".
fn timeout(ms: i32) -> Option<Duration> {
    u64::try_from(ms).ok().map(Duration::from_millis)
}

impl Socket for InprocSocket {
    fn kind(&self) -> SocketKind {
        self.kind
    }

    fn set_option(&mut self, option: SocketOption) -> Result<(), NativeError> {
        self.check_open()?;

        match &option {
            SocketOption::Identity(id) => self.identity = id.clone(),
            SocketOption::ReceiveTimeout(ms) => self.receive_timeout = timeout(*ms),
            SocketOption::SendTimeout(ms) => self.send_timeout = timeout(*ms),
            SocketOption::ReceiveHighWaterMark(hwm) => {
                self.receive_hwm = usize::try_from(*hwm)
                    .map_err(|_| NativeError::from_code(NativeError::EINVAL))?;
            }
            SocketOption::Subscribe(filter) => {
                if self.kind != SocketKind::Subscribe {
                    return Err(NativeError::from_code(NativeError::EINVAL));
                }
                self.filters.push(filter.clone());

                let mut registry = self.hub.lock();
                for addr in &self.binds {
                    if let Some(endpoint) = registry.endpoints.get_mut(addr) {
                        endpoint.filters = self.filters.clone();
                    }
                }
                for peer in &self.peers {
                    if let Some(endpoint) = registry.endpoints.get_mut(&peer.addr) {
                        for sub in endpoint.subscribers.iter_mut().filter(|s| s.socket == self.id) {
                            sub.filters = self.filters.clone();
                        }
                    }
                }
            }
            // Recorded only: there is no connection management in-process.
            SocketOption::ReconnectInterval(_)
            | SocketOption::ReconnectIntervalMax(_)
            | SocketOption::Linger(_)
            | SocketOption::Backlog(_)
            | SocketOption::SendHighWaterMark(_) => {}
        }
        self.options.push(option);

        Ok(())
    }

    fn bind(&mut self, addr: &str) -> Result<(), NativeError> {
        self.check_open()?;

        let (inbox, _) = self.inbox();
        let mut registry = self.hub.lock();

        if registry.endpoints.contains_key(addr) {
            return Err(NativeError::from_code(NativeError::EADDRINUSE));
        }
        registry.endpoints.insert(
            addr.to_owned(),
            Endpoint {
                socket: self.id,
                kind: self.kind,
                inbox,
                filters: self.filters.clone(),
                subscribers: Vec::new(),
            },
        );
        self.binds.push(addr.to_owned());

        log::debug!(target: "inproc", "{} socket {} bound to {addr}", self.kind, self.id);

        Ok(())
    }

    fn unbind(&mut self, addr: &str) -> Result<(), NativeError> {
        self.check_open()?;

        let Some(ix) = self.binds.iter().position(|a| a == addr) else {
            return Err(NativeError::from_code(NativeError::ENOENT));
        };
        self.binds.remove(ix);

        let mut registry = self.hub.lock();
        if registry.endpoints.get(addr).map(|e| e.socket) == Some(self.id) {
            registry.endpoints.remove(addr);
        }
        Ok(())
    }

    fn connect(&mut self, addr: &str) -> Result<(), NativeError> {
        self.check_open()?;

        let (inbox, _) = self.inbox();
        let mut registry = self.hub.lock();

        let Some(endpoint) = registry.endpoints.get_mut(addr) else {
            return Err(NativeError::from_code(NativeError::ECONNREFUSED));
        };
        if !self.can_connect(endpoint.kind) {
            return Err(NativeError::from_code(NativeError::EINVAL));
        }
        let sender = if self.kind == SocketKind::Subscribe {
            endpoint.subscribers.push(Subscriber {
                socket: self.id,
                filters: self.filters.clone(),
                sender: inbox,
            });
            None
        } else {
            Some(endpoint.inbox.clone())
        };
        self.peers.push(Peer {
            addr: addr.to_owned(),
            sender,
        });

        log::debug!(target: "inproc", "{} socket {} connected to {addr}", self.kind, self.id);

        Ok(())
    }

    fn disconnect(&mut self, addr: &str) -> Result<(), NativeError> {
        self.check_open()?;

        let Some(ix) = self.peers.iter().position(|p| p.addr == addr) else {
            return Err(NativeError::from_code(NativeError::ENOENT));
        };
        self.peers.remove(ix);

        if self.kind == SocketKind::Subscribe {
            let mut registry = self.hub.lock();
            if let Some(endpoint) = registry.endpoints.get_mut(addr) {
                endpoint.subscribers.retain(|s| s.socket != self.id);
            }
        }
        Ok(())
    }

    fn binds(&self) -> Vec<String> {
        self.binds.clone()
    }

    fn connects(&self) -> Vec<String> {
        self.peers.iter().map(|p| p.addr.clone()).collect()
    }

    fn send(&mut self, message: Message) -> Result<(), NativeError> {
        self.check_open()?;

        match self.kind {
            SocketKind::Request => {
                if matches!(self.cycle, Cycle::AwaitingReply) {
                    return Err(NativeError::from_code(NativeError::EFSM));
                }
                let (inbox, _) = self.inbox();
                self.deliver(Delivery {
                    message,
                    reply: Some(inbox),
                })?;
                self.cycle = Cycle::AwaitingReply;
            }
            SocketKind::Dealer => {
                let (inbox, _) = self.inbox();
                self.deliver(Delivery {
                    message,
                    reply: Some(inbox),
                })?;
            }
            SocketKind::Reply => {
                let Cycle::Replying(sender) = std::mem::take(&mut self.cycle) else {
                    return Err(NativeError::from_code(NativeError::EFSM));
                };
                let delivery = Delivery {
                    message,
                    reply: None,
                };
                // A requester that went away doesn't get its reply.
                if sender.send(delivery).is_err() {
                    log::debug!(target: "inproc", "Dropping reply to disconnected requester");
                }
            }
            SocketKind::Publish => self.publish(message),
            SocketKind::Subscribe => return Err(NativeError::from_code(NativeError::ENOTSUP)),
        }
        Ok(())
    }

    fn recv(&mut self) -> Result<Message, NativeError> {
        self.check_open()?;

        match (&self.kind, &self.cycle) {
            (SocketKind::Publish, _) => return Err(NativeError::from_code(NativeError::ENOTSUP)),
            (SocketKind::Request, Cycle::Idle) => {
                return Err(NativeError::from_code(NativeError::EFSM))
            }
            (SocketKind::Reply, Cycle::Replying(_)) => {
                return Err(NativeError::from_code(NativeError::EFSM))
            }
            _ => {}
        }
        let delivery = self.wait()?;

        match self.kind {
            SocketKind::Request => self.cycle = Cycle::Idle,
            SocketKind::Reply => {
                if let Some(reply) = delivery.reply {
                    self.cycle = Cycle::Replying(reply);
                }
            }
            _ => {}
        }
        Ok(delivery.message)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        let mut registry = self.hub.lock();

        for addr in self.binds.drain(..) {
            if registry.endpoints.get(&addr).map(|e| e.socket) == Some(self.id) {
                registry.endpoints.remove(&addr);
            }
        }
        for peer in self.peers.drain(..) {
            if let Some(endpoint) = registry.endpoints.get_mut(&peer.addr) {
                endpoint.subscribers.retain(|s| s.socket != self.id);
            }
        }
        drop(registry);

        self.inbox = None;
        self.cycle = Cycle::Idle;
        self.closed = true;
    }
}

impl Drop for InprocSocket {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn message(frames: &[&str]) -> Message {
        frames.iter().map(|f| f.as_bytes().to_vec()).collect()
    }

    fn socket(hub: &Hub, kind: SocketKind) -> InprocSocket {
        let mut socket = hub.socket(kind).unwrap();
        socket.set_option(SocketOption::ReceiveTimeout(50)).unwrap();
        socket
    }

    #[test]
    fn test_request_reply() {
        let hub = Hub::new();
        let mut rep = socket(&hub, SocketKind::Reply);
        let mut req = socket(&hub, SocketKind::Request);

        rep.bind("inproc://echo").unwrap();
        req.connect("inproc://echo").unwrap();
        req.send(message(&["ping"])).unwrap();

        assert_eq!(rep.recv().unwrap(), message(&["ping"]));
        rep.send(message(&["pong"])).unwrap();
        assert_eq!(req.recv().unwrap(), message(&["pong"]));
    }

    #[test]
    fn test_request_state_machine() {
        let hub = Hub::new();
        let mut rep = socket(&hub, SocketKind::Reply);
        let mut req = socket(&hub, SocketKind::Request);

        rep.bind("inproc://fsm").unwrap();
        req.connect("inproc://fsm").unwrap();

        assert_eq!(req.recv().unwrap_err().code, NativeError::EFSM);
        assert_eq!(rep.send(message(&["x"])).unwrap_err().code, NativeError::EFSM);

        req.send(message(&["one"])).unwrap();
        assert_eq!(req.send(message(&["two"])).unwrap_err().code, NativeError::EFSM);
        // Still waiting for the reply after a timeout.
        assert_eq!(req.recv().unwrap_err().code, NativeError::EAGAIN);

        rep.recv().unwrap();
        assert_eq!(rep.recv().unwrap_err().code, NativeError::EFSM);
        rep.send(message(&["reply"])).unwrap();
        assert_eq!(req.recv().unwrap(), message(&["reply"]));
    }

    #[test]
    fn test_publish_filters() {
        let hub = Hub::new();
        let mut publisher = socket(&hub, SocketKind::Publish);
        let mut all = socket(&hub, SocketKind::Subscribe);
        let mut orders = socket(&hub, SocketKind::Subscribe);
        let mut none = socket(&hub, SocketKind::Subscribe);

        publisher.bind("inproc://pub").unwrap();
        all.set_option(SocketOption::Subscribe(vec![])).unwrap();
        orders
            .set_option(SocketOption::Subscribe(b"orders.".to_vec()))
            .unwrap();
        for sub in [&mut all, &mut orders, &mut none] {
            sub.connect("inproc://pub").unwrap();
        }
        publisher.send(message(&["orders.created", "1"])).unwrap();
        publisher.send(message(&["users.created", "2"])).unwrap();

        assert_eq!(all.recv().unwrap(), message(&["orders.created", "1"]));
        assert_eq!(all.recv().unwrap(), message(&["users.created", "2"]));
        assert_eq!(orders.recv().unwrap(), message(&["orders.created", "1"]));
        assert_eq!(orders.recv().unwrap_err().code, NativeError::EAGAIN);
        assert_eq!(none.recv().unwrap_err().code, NativeError::EAGAIN);
    }

    #[test]
    fn test_publish_to_bound_subscriber() {
        let hub = Hub::new();
        let mut sub = socket(&hub, SocketKind::Subscribe);
        let mut first = socket(&hub, SocketKind::Publish);
        let mut second = socket(&hub, SocketKind::Publish);

        sub.bind("inproc://collector").unwrap();
        // Filters set after binding apply as well.
        sub.set_option(SocketOption::Subscribe(b"orders.".to_vec()))
            .unwrap();
        first.connect("inproc://collector").unwrap();
        second.connect("inproc://collector").unwrap();

        first.send(message(&["orders.created", "1"])).unwrap();
        second.send(message(&["users.created", "2"])).unwrap();
        second.send(message(&["orders.deleted", "3"])).unwrap();

        assert_eq!(sub.recv().unwrap(), message(&["orders.created", "1"]));
        assert_eq!(sub.recv().unwrap(), message(&["orders.deleted", "3"]));
        assert_eq!(sub.recv().unwrap_err().code, NativeError::EAGAIN);
    }

    #[test]
    fn test_endpoint_errors() {
        let hub = Hub::new();
        let mut rep = socket(&hub, SocketKind::Reply);
        let mut other = socket(&hub, SocketKind::Reply);
        let mut sub = socket(&hub, SocketKind::Subscribe);

        assert_eq!(
            sub.connect("inproc://nowhere").unwrap_err().code,
            NativeError::ECONNREFUSED
        );
        rep.bind("inproc://taken").unwrap();
        assert_eq!(
            other.bind("inproc://taken").unwrap_err().code,
            NativeError::EADDRINUSE
        );
        assert_eq!(
            sub.connect("inproc://taken").unwrap_err().code,
            NativeError::EINVAL
        );
        assert_eq!(
            rep.unbind("inproc://other").unwrap_err().code,
            NativeError::ENOENT
        );
    }

    #[test]
    fn test_close_releases_endpoints() {
        let hub = Hub::new();
        let mut rep = socket(&hub, SocketKind::Reply);

        rep.bind("inproc://closing").unwrap();
        assert!(hub.is_bound("inproc://closing"));

        rep.close();
        rep.close();

        assert!(rep.is_closed());
        assert!(!hub.is_bound("inproc://closing"));
        assert_eq!(rep.recv().unwrap_err().code, NativeError::ETERM);
    }

    #[test]
    fn test_send_without_peers_times_out() {
        let hub = Hub::new();
        let mut dealer = socket(&hub, SocketKind::Dealer);

        assert_eq!(
            dealer.send(message(&["lost"])).unwrap_err().code,
            NativeError::EAGAIN
        );
    }
}
