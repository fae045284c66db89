//! Broadcast envelope.
//!
//! A publisher sends a request-shaped message with a fixed description and
//! five data frames:
//!
//! ```text
//! [PUB_DESCRIPTION][title][request id][station][sub-title][content]
//! ```
//!
//! The relay station prepends the title as a topic frame, so that
//! subscribers can filter on it, and forwards:
//!
//! ```text
//! [title][PUB_DESCRIPTION][title][request id][station][sub-title][content]
//! ```
use serde::{Deserialize, Serialize};

use crate::envelope::{self, Header};
use crate::error::Error;
use crate::message::{Arg, Message};
use crate::tag::{Command, Tag};

/// Number of data frames in a broadcast.
pub const PUB_FRAMES: u8 = 5;

/// Description frame of every broadcast.
pub const PUB_DESCRIPTION: [u8; 8] = [
    PUB_FRAMES,
    Command::GENERAL.byte(),
    Tag::PUB_TITLE.byte(),
    Tag::REQUEST_ID.byte(),
    Tag::PUBLISHER.byte(),
    Tag::SUB_TITLE.byte(),
    Tag::ARGUMENT.byte(),
    Tag::END.byte(),
];

/// A decoded broadcast.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishItem {
    /// Topic.
    pub title: String,
    /// Optional sub-topic; empty if absent.
    #[serde(default)]
    pub sub_title: String,
    /// Name of the originating station.
    #[serde(default)]
    pub station: String,
    /// Opaque payload.
    #[serde(default)]
    pub content: String,
}

/// A structured payload that knows its own broadcast title.
pub trait PublishData {
    /// The title to broadcast this payload under.
    fn title(&self) -> &str;
}

/// Encode a publish request.
pub fn encode(
    title: impl Arg,
    request_id: impl Arg,
    station: impl Arg,
    sub_title: impl Arg,
    content: impl Arg,
) -> Message {
    Message::new()
        .with(PUB_DESCRIPTION)
        .with(title.to_frame())
        .with(request_id.to_frame())
        .with(station.to_frame())
        .with(sub_title.to_frame())
        .with(content.to_frame())
}

/// Reframe a received publish request into the subscriber layout by
/// prepending its title frame.
pub fn broadcast(mut message: Message) -> Result<Message, Error> {
    envelope::validate(&message, Header::Response)?;

    let title = message.get(1).cloned().unwrap_or_default();
    message.prepend(title);

    Ok(message)
}

/// Decode a broadcast as received by a subscriber.
///
/// Empty frames and frames with tags other than sub-title, publisher and
/// argument are skipped. Fields are decoded lossily: invalid UTF-8 is
/// replaced rather than failing the whole broadcast.
pub fn decode(message: &Message) -> Result<PublishItem, Error> {
    let description = envelope::validate(message, Header::Broadcast)?;
    let mut item = PublishItem {
        title: String::from_utf8_lossy(&message[0]).into_owned(),
        ..PublishItem::default()
    };

    for (idx, frame) in message.iter().enumerate().skip(Header::Broadcast.len()) {
        if frame.is_empty() {
            continue;
        }
        let Some(tag) = description.get(idx).copied().map(Tag::from) else {
            continue;
        };
        let field = match tag {
            Tag::SUB_TITLE => &mut item.sub_title,
            Tag::PUBLISHER => &mut item.station,
            Tag::ARGUMENT => &mut item.content,
            _ => continue,
        };
        *field = String::from_utf8_lossy(frame).into_owned();
    }
    Ok(item)
}
