//! Call engine.
//!
//! Sends and receives self-describing messages over a [`Socket`]. None of
//! these functions fail or panic: every outcome, including a panic inside
//! the transport, is reported through the returned [`ResultData`].
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::transport::Socket;
use crate::wire::envelope;
use crate::wire::{Arg, Fault, Message, NativeError, ResultData, State};

/// Receive attempts made by string and binary receives.
pub const DEFAULT_ATTEMPTS: usize = 10;
/// Receive attempts made when the message schema is unknown.
pub const UNKNOWN_ATTEMPTS: usize = 3;

/// Receive retry policy.
///
/// A receive that times out is attempted again, up to `attempts` attempts
/// in total. Any other transport error fails immediately.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Retry {
    /// Total number of receive attempts. Zero is treated as one.
    pub attempts: usize,
    /// Whether to log failures and slow responses.
    pub show_error: bool,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            show_error: true,
        }
    }
}

impl Retry {
    /// Policy for receives of unknown schema.
    pub fn unknown() -> Self {
        Self {
            attempts: UNKNOWN_ATTEMPTS,
            ..Self::default()
        }
    }

    /// A single attempt, bounded by the socket's receive timeout.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// The same policy, without logging.
    pub fn quiet(self) -> Self {
        Self {
            show_error: false,
            ..self
        }
    }
}

/// Send a message, logging failures.
pub fn send<S, A>(
    socket: &mut S,
    description: &[u8],
    args: impl IntoIterator<Item = A>,
) -> ResultData<String>
where
    S: Socket + ?Sized,
    A: Arg,
{
    transmit(socket, envelope::encode(description, args), true)
}

/// Send a message without logging transport failures.
pub fn quiet_send<S, A>(
    socket: &mut S,
    description: &[u8],
    args: impl IntoIterator<Item = A>,
) -> ResultData<String>
where
    S: Socket + ?Sized,
    A: Arg,
{
    transmit(socket, envelope::encode(description, args), false)
}

/// Send a request and receive its response.
///
/// If the request couldn't be sent, its failure is returned and nothing is
/// received.
pub fn call<S, A>(
    socket: &mut S,
    description: &[u8],
    args: impl IntoIterator<Item = A>,
) -> ResultData<String>
where
    S: Socket + ?Sized,
    A: Arg,
{
    call_with(socket, description, args, &Retry::default())
}

/// Like [`call`], with the given receive policy.
pub fn call_with<S, A>(
    socket: &mut S,
    description: &[u8],
    args: impl IntoIterator<Item = A>,
    retry: &Retry,
) -> ResultData<String>
where
    S: Socket + ?Sized,
    A: Arg,
{
    let sent = send(socket, description, args);
    if !sent.interactive_success {
        return sent;
    }
    receive_string(socket, retry)
}

/// Send an already encoded message.
pub(crate) fn transmit<S: Socket + ?Sized>(
    socket: &mut S,
    message: Message,
    show_error: bool,
) -> ResultData<String> {
    match panic::catch_unwind(AssertUnwindSafe(|| socket.send(message))) {
        Ok(Ok(())) => ResultData::success(State::Ok),
        Ok(Err(err)) => {
            if show_error {
                log::error!(
                    target: "call",
                    "Send: {}! Address: {}.", err.text, socket.endpoints()
                );
            }
            ResultData::transport_error(err)
        }
        Err(payload) => {
            let fault = Fault::Panic(panic_message(payload));
            if show_error {
                log::error!(target: "call", "Send: {fault}! Address: {}.", socket.endpoints());
            } else {
                log::debug!(target: "call", "Send: {fault}! Address: {}.", socket.endpoints());
            }
            ResultData::exception(fault)
        }
    }
}

/// Receive a response whose data frames are UTF-8 strings.
pub fn receive_string<S: Socket + ?Sized>(socket: &mut S, retry: &Retry) -> ResultData<String> {
    match recv(socket, retry, "ReceiveString") {
        Ok(message) => {
            let result = envelope::decode_string(&message);
            report(socket, &message, &result, "ReceiveString", retry.show_error);
            result
        }
        Err(err) => err.into_result(),
    }
}

/// Receive a response whose data frames are raw bytes.
pub fn receive<S: Socket + ?Sized>(socket: &mut S, retry: &Retry) -> ResultData<Vec<u8>> {
    match recv(socket, retry, "Receive") {
        Ok(message) => {
            let result = envelope::decode_binary(&message);
            report(socket, &message, &result, "Receive", retry.show_error);
            result
        }
        Err(err) => err.into_result(),
    }
}

/// Receive a message of unknown layout. Every frame is returned as a binary
/// value, in order.
pub fn receive_unknown<S: Socket + ?Sized>(socket: &mut S, retry: &Retry) -> ResultData<Vec<u8>> {
    match recv(socket, retry, "ReceiveUnknown") {
        Ok(message) => envelope::decode_unknown(message),
        Err(err) => err.into_result(),
    }
}

/// Receive failure.
#[derive(Debug)]
pub(crate) enum RecvError {
    Native(NativeError),
    Fault(Fault),
}

impl RecvError {
    pub(crate) fn into_result<T>(self) -> ResultData<T> {
        match self {
            Self::Native(err) => ResultData::transport_error(err),
            Self::Fault(fault) => ResultData::exception(fault),
        }
    }
}

/// Receive one message, retrying on timeouts.
pub(crate) fn recv<S: Socket + ?Sized>(
    socket: &mut S,
    retry: &Retry,
    op: &str,
) -> Result<Message, RecvError> {
    let attempts = retry.attempts.max(1);
    let mut retries = 0;

    loop {
        match panic::catch_unwind(AssertUnwindSafe(|| socket.recv())) {
            Ok(Ok(message)) => {
                if retries > 0 && retry.show_error {
                    log::info!(
                        target: "call",
                        "{op}: slow response after {retries} retries. Address: {}.",
                        socket.endpoints()
                    );
                }
                return Ok(message);
            }
            Ok(Err(err)) if err.is_again() && retries + 1 < attempts => {
                retries += 1;
            }
            Ok(Err(err)) => {
                if retry.show_error {
                    log::error!(
                        target: "call",
                        "{op}: {}! Address: {}.", err.text, socket.endpoints()
                    );
                }
                return Err(RecvError::Native(err));
            }
            Err(payload) => {
                let fault = Fault::Panic(panic_message(payload));
                log::error!(target: "call", "{op}: {fault}! Address: {}.", socket.endpoints());

                return Err(RecvError::Fault(fault));
            }
        }
    }
}

/// Log decoding failures if `show_error` is set. Returns whether anything
/// was logged.
fn report<S: Socket + ?Sized, T>(
    socket: &S,
    message: &Message,
    result: &ResultData<T>,
    op: &str,
    show_error: bool,
) -> bool {
    if !show_error {
        return false;
    }
    match result.state {
        State::Invalid => {
            let text = result.error.as_ref().map(|e| e.text.as_str()).unwrap_or_default();
            log::error!(
                target: "call",
                "LayoutError: {op}: {text}. Description: {}. Address: {}.",
                hex(message.first().map(Vec::as_slice).unwrap_or_default()),
                socket.endpoints()
            );
            true
        }
        State::Exception => match &result.fault {
            Some(fault) => {
                log::error!(
                    target: "call",
                    "{op}: {fault}! Address: {}.", socket.endpoints()
                );
                true
            }
            None => false,
        },
        _ => false,
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic")
    }
}
