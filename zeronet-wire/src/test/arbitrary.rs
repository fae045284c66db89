use qcheck::Arbitrary;

use crate::envelope::Description;
use crate::message::Frame;
use crate::publish::PublishItem;
use crate::state::State;
use crate::tag::Tag;

/// A well-formed call: a status byte and one tag per argument.
#[derive(Debug, Clone)]
pub struct Call {
    pub status: u8,
    pub tags: Vec<Tag>,
    pub args: Vec<String>,
}

impl Call {
    pub fn description(&self) -> Frame {
        Description::new(self.status)
            .tags(self.tags.iter().copied())
            .to_bytes()
            .unwrap()
    }
}

impl Arbitrary for Call {
    fn arbitrary(g: &mut qcheck::Gen) -> Self {
        let len = usize::arbitrary(g) % (u8::MAX as usize + 1);
        let tags = (0..len).map(|_| Tag::arbitrary(g)).collect();
        let args = (0..len).map(|_| String::arbitrary(g)).collect();

        Self {
            status: u8::arbitrary(g),
            tags,
            args,
        }
    }
}

impl Arbitrary for Tag {
    fn arbitrary(g: &mut qcheck::Gen) -> Self {
        let known = [
            Tag::END,
            Tag::GLOBAL_ID,
            Tag::SUB_TITLE,
            Tag::PUB_TITLE,
            Tag::PLAN,
            Tag::ARGUMENT,
            Tag::REQUEST_ID,
            Tag::REQUESTER,
            Tag::RESPONDER,
            Tag::CONTEXT,
            Tag::BINARY_VALUE,
            Tag::new(u8::arbitrary(g)),
        ];
        *g.choose(&known).unwrap()
    }
}

impl Arbitrary for State {
    fn arbitrary(g: &mut qcheck::Gen) -> Self {
        State::from(u8::arbitrary(g))
    }
}

impl Arbitrary for PublishItem {
    fn arbitrary(g: &mut qcheck::Gen) -> Self {
        Self {
            title: String::arbitrary(g),
            sub_title: String::arbitrary(g),
            station: String::arbitrary(g),
            content: String::arbitrary(g),
        }
    }
}
