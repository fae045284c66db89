//! Publish/subscribe.
//!
//! Stations publish to a relay over a request socket and wait for its
//! acknowledgement. The relay forwards every valid publish request on its
//! publisher socket, topic first, so that subscribers can filter on the
//! title. See [`crate::wire::publish`] for the message layouts.
use serde::Serialize;

use crate::call::{self, Retry};
use crate::context::Context;
use crate::transport::Socket;
use crate::wire::publish::{self, PUB_DESCRIPTION};
use crate::wire::{Description, PublishData, PublishItem, State};

/// Publish a broadcast and wait for the relay's acknowledgement.
///
/// Returns `true` if the relay acknowledged with [`State::Ok`]. If the
/// request can't be sent, no acknowledgement is awaited.
pub fn publish<S: Socket + ?Sized>(
    socket: &mut S,
    ctx: &Context,
    title: &str,
    sub_title: &str,
    content: &str,
) -> bool {
    publish_with(socket, ctx, title, sub_title, content, &Retry::default())
}

/// Like [`publish`], waiting for the acknowledgement with the given policy.
pub fn publish_with<S: Socket + ?Sized>(
    socket: &mut S,
    ctx: &Context,
    title: &str,
    sub_title: &str,
    content: &str,
    retry: &Retry,
) -> bool {
    let message = publish::encode(title, &ctx.request_id, &ctx.station, sub_title, content);
    let sent = call::transmit(socket, message, true);
    if !sent.interactive_success {
        return false;
    }
    let ack = call::receive_string(socket, retry);

    ack.interactive_success && ack.state == State::Ok
}

/// Publish a value serialized as JSON.
pub fn publish_json<S, T>(
    socket: &mut S,
    ctx: &Context,
    title: &str,
    sub_title: &str,
    content: &T,
) -> bool
where
    S: Socket + ?Sized,
    T: Serialize + ?Sized,
{
    match serde_json::to_string(content) {
        Ok(json) => publish(socket, ctx, title, sub_title, &json),
        Err(err) => {
            log::error!(target: "pubsub", "Publish: {title}: {err}!");
            false
        }
    }
}

/// Publish a payload under its own title, serialized as JSON.
pub fn publish_data<S, T>(socket: &mut S, ctx: &Context, data: &T) -> bool
where
    S: Socket + ?Sized,
    T: PublishData + Serialize,
{
    publish_json(socket, ctx, data.title(), "", data)
}

/// Publish an item. The publishing station is taken from the context, not
/// from the item.
pub fn publish_item<S: Socket + ?Sized>(socket: &mut S, ctx: &Context, item: &PublishItem) -> bool {
    publish(socket, ctx, &item.title, &item.sub_title, &item.content)
}

/// Receive one broadcast.
///
/// Returns `None` on timeout, transport failure or malformed input. Timeouts
/// are never logged; other failures are logged if `show_error` is set.
pub fn subscribe<S: Socket + ?Sized>(socket: &mut S, show_error: bool) -> Option<PublishItem> {
    let message = match call::recv(socket, &Retry::once().quiet(), "Subscribe") {
        Ok(message) => message,
        Err(call::RecvError::Native(err)) => {
            if show_error && !err.is_again() {
                log::error!(
                    target: "pubsub",
                    "Subscribe: {}! Address: {}.", err.text, socket.endpoints()
                );
            }
            return None;
        }
        Err(call::RecvError::Fault(_)) => return None,
    };

    match publish::decode(&message) {
        Ok(item) => Some(item),
        Err(err) => {
            if show_error {
                let description = message.get(1).map(Vec::as_slice).unwrap_or_default();
                log::error!(
                    target: "pubsub",
                    "Subscribe: LayoutError: {err}. Description: {}. Address: {}.",
                    call::hex(description),
                    socket.endpoints()
                );
            }
            None
        }
    }
}

/// Serve one publish request: acknowledge it on `inbound` and forward it as
/// a broadcast on `outbound`.
///
/// Malformed requests are acknowledged with [`State::Invalid`] and dropped.
/// Returns whether a broadcast was forwarded.
pub fn relay<I, O>(inbound: &mut I, outbound: &mut O) -> bool
where
    I: Socket + ?Sized,
    O: Socket + ?Sized,
{
    let Ok(message) = call::recv(inbound, &Retry::once().quiet(), "Relay") else {
        return false;
    };
    let is_publish = message.first().map(Vec::as_slice) == Some(&PUB_DESCRIPTION[..]);
    let broadcast = if is_publish {
        publish::broadcast(message)
    } else {
        Err(crate::wire::Error::MissingHeader {
            len: message.first().map(Vec::len).unwrap_or_default(),
        })
    };

    match broadcast {
        Ok(broadcast) => {
            let ack = Description::header(State::Ok);
            if !call::send(inbound, &ack, std::iter::empty::<&str>()).interactive_success {
                return false;
            }
            let title = String::from_utf8_lossy(&broadcast[0]).into_owned();
            let forwarded = call::transmit(outbound, broadcast, true).interactive_success;
            if forwarded {
                log::debug!(target: "pubsub", "Relayed broadcast {title:?}");
            }
            forwarded
        }
        Err(err) => {
            log::warn!(
                target: "pubsub",
                "Relay: dropping malformed publish request: {err}. Address: {}.",
                inbound.endpoints()
            );
            let ack = Description::header(State::Invalid);
            call::send(inbound, &ack, std::iter::empty::<&str>());

            false
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use qcheck_macros::quickcheck;

    use super::*;
    use crate::call::test::Scripted;
    use crate::wire::{Message, NativeError};

    fn ack(state: State) -> Message {
        Message::new().with(Description::header(state))
    }

    fn ctx() -> Context {
        Context::new("alice").with_request_id("req-1")
    }

    #[derive(Serialize)]
    struct Order {
        id: u32,
    }

    impl PublishData for Order {
        fn title(&self) -> &str {
            "orders.created"
        }
    }

    #[test]
    fn test_publish() {
        let mut socket = Scripted::replying([Ok(ack(State::Ok))]);

        assert!(publish(&mut socket, &ctx(), "orders.created", "", "{\"id\":1}"));
        assert_eq!(
            socket.sent[0],
            publish::encode("orders.created", "req-1", "alice", "", "{\"id\":1}")
        );
    }

    #[test]
    fn test_publish_not_acknowledged() {
        let mut socket = Scripted::replying([Ok(ack(State::Failed))]);
        assert!(!publish(&mut socket, &ctx(), "t", "", "c"));

        let mut socket = Scripted::replying([Ok(Message::new().with(vec![1]))]);
        assert!(!publish(&mut socket, &ctx(), "t", "", "c"));
    }

    #[test]
    fn test_publish_send_failure() {
        let mut socket = Scripted {
            sends: [Err(NativeError::from_code(NativeError::EAGAIN))].into(),
            recvs: [Ok(ack(State::Ok))].into(),
            ..Scripted::default()
        };

        assert!(!publish(&mut socket, &ctx(), "t", "", "c"));
        assert_eq!(socket.received, 0);
    }

    #[test]
    fn test_publish_with_retry() {
        let mut socket = Scripted::default();
        assert!(!publish_with(&mut socket, &ctx(), "t", "", "c", &Retry::once()));
        assert_eq!(socket.received, 1);

        let mut socket = Scripted::replying([
            Err(NativeError::from_code(NativeError::EAGAIN)),
            Ok(ack(State::Ok)),
        ]);
        assert!(publish_with(&mut socket, &ctx(), "t", "", "c", &Retry::unknown()));
        assert_eq!(socket.received, 2);
    }

    #[test]
    fn test_publish_data() {
        let mut socket = Scripted::replying([Ok(ack(State::Ok))]);

        assert!(publish_data(&mut socket, &ctx(), &Order { id: 7 }));
        assert_eq!(socket.sent[0][1], b"orders.created".to_vec());
        assert!(socket.sent[0][4].is_empty());
        assert_eq!(socket.sent[0][5], b"{\"id\":7}".to_vec());
    }

    #[test]
    fn test_subscribe() {
        let broadcast =
            publish::broadcast(publish::encode("orders.created", "req-1", "alice", "eu", "{}"))
                .unwrap();
        let mut socket = Scripted::replying([Ok(broadcast)]);

        assert_eq!(
            subscribe(&mut socket, true),
            Some(PublishItem {
                title: "orders.created".to_owned(),
                sub_title: "eu".to_owned(),
                station: "alice".to_owned(),
                content: "{}".to_owned(),
            })
        );
        assert_eq!(socket.received, 1);
    }

    #[test]
    fn test_subscribe_malformed() {
        let mut socket = Scripted::replying([
            Ok(Message::new().with(b"t".to_vec()).with(vec![0, 0])),
            Ok(Message::new()),
        ]);

        assert_eq!(subscribe(&mut socket, true), None);
        assert_eq!(subscribe(&mut socket, true), None);
        // Timeout.
        assert_eq!(subscribe(&mut socket, true), None);
        assert_eq!(socket.received, 3);
    }

    #[test]
    fn test_subscribe_panic() {
        let mut socket = Scripted {
            panic_on_recv: true,
            ..Scripted::default()
        };
        assert_eq!(subscribe(&mut socket, false), None);
    }

    #[test]
    fn test_relay() {
        let request = publish::encode("orders.created", "req-1", "alice", "", "{}");
        let mut inbound = Scripted::replying([Ok(request.clone())]);
        let mut outbound = Scripted::default();

        assert!(relay(&mut inbound, &mut outbound));
        assert_eq!(inbound.sent, vec![ack(State::Ok)]);
        assert_eq!(outbound.sent, vec![publish::broadcast(request).unwrap()]);
    }

    #[test]
    fn test_relay_malformed() {
        let request = Message::new().with(vec![1, 1, b'*', 0]).with(b"t".to_vec());
        let mut inbound = Scripted::replying([Ok(request)]);
        let mut outbound = Scripted::default();

        assert!(!relay(&mut inbound, &mut outbound));
        assert_eq!(inbound.sent, vec![ack(State::Invalid)]);
        assert!(outbound.sent.is_empty());
    }

    #[test]
    fn test_relay_timeout() {
        let mut inbound = Scripted::default();
        let mut outbound = Scripted::default();

        assert!(!relay(&mut inbound, &mut outbound));
        assert!(inbound.sent.is_empty());
    }

    #[quickcheck]
    fn prop_relay_preserves_item(item: PublishItem) {
        let ctx = Context::new(&item.station);
        let mut publisher = Scripted::replying([Ok(ack(State::Ok))]);
        assert!(publish_item(&mut publisher, &ctx, &item));

        let mut inbound = Scripted::replying(publisher.sent.drain(..).map(Ok));
        let mut outbound = Scripted::default();
        assert!(relay(&mut inbound, &mut outbound));

        let mut subscriber = Scripted::replying(outbound.sent.drain(..).map(Ok));
        assert_eq!(subscribe(&mut subscriber, true), Some(item));
    }
}
