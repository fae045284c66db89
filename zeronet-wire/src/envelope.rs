//! Description frames and the request/response envelope.
//!
//! ```text
//! +---------------------------------------------+
//! | N | status | tag 1 | tag 2 | .. | tag N | 0 |  description frame
//! +---------------------------------------------+
//! | data frame 1                                |  tagged by `tag 1`
//! +---------------------------------------------+
//! | ..                                          |
//! +---------------------------------------------+
//! | data frame N                                |  tagged by `tag N`
//! +---------------------------------------------+
//! ```
//!
//! Only the frame count is validated against the message; the trailing
//! [`Tag::END`] is a convention of senders and isn't required on receipt.
use crate::error::Error;
use crate::message::{Arg, Frame, Message};
use crate::result::ResultData;
use crate::state::State;
use crate::tag::Tag;

/// Minimum length of a description: the frame count and the status byte.
pub const HEADER_LEN: usize = 2;

/// Number of frames preceding the data frames, per kind of message.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Header {
    /// `[description][data]*`
    Response,
    /// `[title][description][data]*`
    Broadcast,
}

impl Header {
    /// Index of the description frame.
    pub fn description_index(&self) -> usize {
        match self {
            Self::Response => 0,
            Self::Broadcast => 1,
        }
    }

    /// Number of frames up to and including the description.
    pub fn len(&self) -> usize {
        self.description_index() + 1
    }
}

/// Builds description frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    status: u8,
    tags: Vec<Tag>,
}

impl Description {
    /// A description with the given status (or command) byte.
    pub fn new(status: impl Into<u8>) -> Self {
        Self {
            status: status.into(),
            tags: Vec::new(),
        }
    }

    /// Add the tag of the next data frame.
    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Add the tags of the next data frames.
    pub fn tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Serialize a description without data frames: `[0, status, End]`.
    pub fn header(status: impl Into<u8>) -> Frame {
        vec![0, status.into(), Tag::END.byte()]
    }

    /// Serialize as `[N, status, tags.., End]`. Fails if more than 255 tags
    /// were added, since the count must fit in one byte.
    pub fn to_bytes(&self) -> Result<Frame, Error> {
        let count = u8::try_from(self.tags.len()).map_err(|_| Error::TooManyTags {
            count: self.tags.len(),
        })?;
        let mut bytes = Vec::with_capacity(self.tags.len() + HEADER_LEN + 1);
        bytes.push(count);
        bytes.push(self.status);
        bytes.extend(self.tags.iter().map(Tag::byte));
        bytes.push(Tag::END.byte());

        Ok(bytes)
    }
}

impl TryFrom<Description> for Frame {
    type Error = Error;

    fn try_from(desc: Description) -> Result<Self, Self::Error> {
        desc.to_bytes()
    }
}

/// Encode a description and its arguments as `[description, args..]`.
pub fn encode<A: Arg>(description: &[u8], args: impl IntoIterator<Item = A>) -> Message {
    let mut message = Message::new().with(description);
    for arg in args {
        message.push(arg.to_frame());
    }
    message
}

/// Check a message's layout against its description.
///
/// Returns the description frame on success.
pub fn validate(message: &Message, header: Header) -> Result<&[u8], Error> {
    if message.len() < header.len() + 1 && header == Header::Broadcast {
        return Err(Error::TooFewFrames {
            min: header.len() + 1,
            actual: message.len(),
        });
    }
    let description = message
        .get(header.description_index())
        .map(Vec::as_slice)
        .unwrap_or_default();

    if description.len() < HEADER_LEN {
        return Err(Error::MissingHeader {
            len: description.len(),
        });
    }
    let expected = description[0] as usize + header.len();
    if expected != message.len() {
        return Err(Error::FrameCountMismatch {
            expected,
            actual: message.len(),
        });
    }
    Ok(description)
}

/// Decode a response whose data frames are UTF-8 strings.
pub fn decode_string(message: &Message) -> ResultData<String> {
    decode_with(message, |frame| {
        String::from_utf8(frame.to_vec()).map_err(Error::from)
    })
}

/// Decode a response whose data frames are raw bytes.
pub fn decode_binary(message: &Message) -> ResultData<Vec<u8>> {
    decode_with(message, |frame| Ok(frame.to_vec()))
}

/// Decode a message without knowing its schema: every frame, including the
/// first one, is tagged [`Tag::BINARY_VALUE`].
pub fn decode_unknown(message: Message) -> ResultData<Vec<u8>> {
    let mut result = ResultData::success(State::Ok);
    for frame in message {
        result.add(Tag::BINARY_VALUE, frame);
    }
    result
}

fn decode_with<T, F>(message: &Message, mut f: F) -> ResultData<T>
where
    F: FnMut(&[u8]) -> Result<T, Error>,
{
    match try_decode(message, &mut f) {
        Ok(result) => result,
        Err(err) => ResultData::from_error(err),
    }
}

fn try_decode<T, F>(message: &Message, f: &mut F) -> Result<ResultData<T>, Error>
where
    F: FnMut(&[u8]) -> Result<T, Error>,
{
    let description = validate(message, Header::Response)?;
    let mut result = ResultData::success(State::from(description[1]));

    for (i, frame) in message.iter().enumerate().skip(1) {
        let tag = description
            .get(i + 1)
            .copied()
            .ok_or(Error::MissingTag { index: i })?;

        result.add(Tag::from(tag), f(frame)?);
    }
    Ok(result)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use qcheck_macros::quickcheck;

    use super::*;
    use crate::error::{FRAME_COUNT_MISMATCH, MISSING_HEADER};
    use crate::test::arbitrary::Call;

    #[test]
    fn test_description_bytes() {
        let desc = Description::new(State::Ok)
            .tag(Tag::ARGUMENT)
            .tag(Tag::REQUEST_ID);

        assert_eq!(desc.to_bytes(), Ok(vec![2, 0, b'A', b'I', 0]));
        assert_eq!(Description::new(State::Ok).to_bytes(), Ok(vec![0, 0, 0]));
        assert_eq!(Description::header(State::Invalid), vec![0, 0x85, 0]);
    }

    #[test]
    fn test_too_many_tags() {
        let desc = Description::new(0).tags(std::iter::repeat(Tag::ARGUMENT).take(256));

        assert_eq!(desc.to_bytes(), Err(Error::TooManyTags { count: 256 }));
        assert!(Frame::try_from(desc).is_err());
    }

    #[test]
    fn test_absent_args_are_empty_frames() {
        let desc = Description::new(0).tag(Tag::ARGUMENT).tag(Tag::CONTEXT);
        let message = encode(&desc.to_bytes().unwrap(), [Some("a"), None]);

        assert_eq!(message.len(), 3);
        assert_eq!(message[1], b"a".to_vec());
        assert!(message[2].is_empty());
    }

    #[test]
    fn test_ping_pong() {
        let desc = [1, 0, Tag::ARGUMENT.byte(), Tag::END.byte()];
        let message = encode(&desc, ["pong"]);
        let result = decode_string(&message);

        assert!(result.is_ok());
        assert_eq!(result.state, State::Ok);
        assert_eq!(result.get(Tag::ARGUMENT).map(String::as_str), Some("pong"));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_missing_header() {
        for message in [
            Message::new(),
            Message::new().with(vec![]),
            Message::new().with(vec![0]),
        ] {
            let result = decode_string(&message);

            assert_eq!(result.state, State::Invalid);
            assert_eq!(result.error.as_ref().unwrap().code, MISSING_HEADER);
            assert!(result.is_empty());
        }
    }

    #[test]
    fn test_frame_count_mismatch() {
        let desc = [2, 0, b'A', b'A', 0];
        let message = encode(&desc, ["only one"]);
        let result = decode_binary(&message);

        assert_eq!(result.state, State::Invalid);
        assert_eq!(result.error.as_ref().unwrap().code, FRAME_COUNT_MISMATCH);
        assert!(result.is_empty());
        assert!(result.fault.is_none());
    }

    #[test]
    fn test_max_frame_count() {
        let desc = Description::new(0).tags(std::iter::repeat(Tag::ARGUMENT).take(255));
        let message = encode(&desc.to_bytes().unwrap(), (0..255).map(|i| i.to_string()));
        let result = decode_string(&message);

        assert!(result.is_ok());
        assert_eq!(result.len(), 255);
        assert_eq!(result.last(Tag::ARGUMENT).map(String::as_str), Some("254"));
    }

    #[test]
    fn test_missing_tag_is_exception() {
        // Declares two frames, but only carries one tag.
        let message = encode(&[2, 0, b'A'], ["a", "b"]);
        let result = decode_string(&message);

        assert_eq!(result.state, State::Exception);
        assert!(result.is_empty());
        assert_eq!(
            result.fault,
            Some(crate::Fault::Wire(Error::MissingTag { index: 2 }))
        );
    }

    #[test]
    fn test_invalid_utf8_is_exception() {
        let message = Message::new().with(vec![1, 0, b'A']).with(vec![0xff, 0xfe]);

        assert_eq!(decode_string(&message).state, State::Exception);
        assert!(decode_binary(&message).is_ok());
    }

    #[test]
    fn test_decode_unknown() {
        let message = Message::new().with(b"x".to_vec()).with(b"yz".to_vec());
        let result = decode_unknown(message);

        assert!(result.is_ok());
        assert_eq!(
            result.iter().collect::<Vec<_>>(),
            vec![
                (Tag::BINARY_VALUE, &b"x".to_vec()),
                (Tag::BINARY_VALUE, &b"yz".to_vec())
            ]
        );
    }

    #[quickcheck]
    fn prop_encode_decode(call: Call) {
        let message = encode(&call.description(), &call.args);
        let result = decode_string(&message);

        assert!(result.interactive_success);
        assert_eq!(u8::from(result.state), call.status);
        assert_eq!(
            result.into_iter().collect::<Vec<_>>(),
            call.tags.into_iter().zip(call.args).collect::<Vec<_>>()
        );
    }

    #[quickcheck]
    fn prop_extra_frames_are_invalid(call: Call, extra: u8) {
        let extra = extra as usize % 4 + 1;
        let mut message = encode(&call.description(), &call.args);
        for _ in 0..extra {
            message.push(Frame::new());
        }
        let result = decode_string(&message);

        assert_eq!(result.state, State::Invalid);
        assert_eq!(result.error.as_ref().map(|e| e.code), Some(FRAME_COUNT_MISMATCH));
        assert!(result.is_empty());
    }
}
