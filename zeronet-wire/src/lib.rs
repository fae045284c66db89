//! Zeronet wire protocol.
//!
//! Every message exchanged between stations carries its own layout: a
//! leading description frame declares how many data frames follow, the
//! status of the operation, and the [`Tag`] of each data frame. This crate
//! encodes and decodes those messages. It does no I/O.
#![cfg_attr(not(test), warn(clippy::unwrap_used))]

pub mod envelope;
pub mod error;
pub mod message;
pub mod publish;
pub mod result;
pub mod state;
pub mod tag;

pub use envelope::{Description, Header};
pub use error::{Error, Fault, NativeError};
pub use message::{Arg, Frame, Message};
pub use publish::{PublishData, PublishItem, PUB_DESCRIPTION};
pub use result::ResultData;
pub use state::State;
pub use tag::{Command, Tag};
