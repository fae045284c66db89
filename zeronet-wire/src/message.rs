use std::ops::Deref;

/// One discrete binary segment of a message.
pub type Frame = Vec<u8>;

/// A multi-part message, delivered atomically by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message(Vec<Frame>);

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame.
    pub fn push(&mut self, frame: impl Into<Frame>) {
        self.0.push(frame.into());
    }

    /// Builder variant of [`Message::push`].
    pub fn with(mut self, frame: impl Into<Frame>) -> Self {
        self.push(frame);
        self
    }

    /// Insert a frame at the front of the message.
    pub fn prepend(&mut self, frame: impl Into<Frame>) {
        self.0.insert(0, frame.into());
    }

    pub fn frames(&self) -> &[Frame] {
        &self.0
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.0
    }
}

impl Deref for Message {
    type Target = [Frame];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Frame>> for Message {
    fn from(frames: Vec<Frame>) -> Self {
        Self(frames)
    }
}

impl<F: Into<Frame>> FromIterator<F> for Message {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for Message {
    type Item = Frame;
    type IntoIter = std::vec::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Something that can be sent as a UTF-8 argument frame.
///
/// Absent values encode as empty frames: they are never omitted, since that
/// would change the frame count of the message.
pub trait Arg {
    fn to_frame(&self) -> Frame;
}

impl Arg for str {
    fn to_frame(&self) -> Frame {
        self.as_bytes().to_vec()
    }
}

impl Arg for String {
    fn to_frame(&self) -> Frame {
        self.as_str().to_frame()
    }
}

impl<T: Arg + ?Sized> Arg for &T {
    fn to_frame(&self) -> Frame {
        (**self).to_frame()
    }
}

impl<T: Arg> Arg for Option<T> {
    fn to_frame(&self) -> Frame {
        match self {
            Some(arg) => arg.to_frame(),
            None => Frame::new(),
        }
    }
}
