use crate::error::{Error, Fault, NativeError};
use crate::state::State;
use crate::tag::Tag;

/// Decoded outcome of a send, receive or call.
///
/// `interactive_success` tells whether the transport interaction itself went
/// through, independently of the application status in `state`. Values are
/// kept in frame order; tags may repeat within one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultData<T> {
    /// Outcome of the operation.
    pub state: State,
    /// Whether the transport interaction succeeded.
    pub interactive_success: bool,
    /// Native transport error, or layout sub-code for [`State::Invalid`].
    pub error: Option<NativeError>,
    /// Unexpected fault captured during the operation.
    pub fault: Option<Fault>,
    values: Vec<(Tag, T)>,
}

impl<T> ResultData<T> {
    /// An interaction that went through, with the given status.
    pub fn success(state: State) -> Self {
        Self {
            state,
            interactive_success: true,
            error: None,
            fault: None,
            values: Vec::new(),
        }
    }

    /// The transport failed to send or receive.
    pub fn transport_error(error: NativeError) -> Self {
        Self {
            state: State::LocalRecvError,
            interactive_success: false,
            error: Some(error),
            fault: None,
            values: Vec::new(),
        }
    }

    /// The message didn't match its own description.
    pub fn invalid(error: &Error) -> Self {
        Self {
            state: State::Invalid,
            interactive_success: false,
            error: Some(NativeError::new(error.code(), error)),
            fault: None,
            values: Vec::new(),
        }
    }

    /// An unexpected fault occured.
    pub fn exception(fault: impl Into<Fault>) -> Self {
        Self {
            state: State::Exception,
            interactive_success: false,
            error: None,
            fault: Some(fault.into()),
            values: Vec::new(),
        }
    }

    /// Build a failed result from a decoding error, classifying it as either
    /// a layout violation or an unexpected fault.
    pub fn from_error(error: Error) -> Self {
        if error.is_layout() {
            Self::invalid(&error)
        } else {
            Self::exception(error)
        }
    }

    /// Whether the interaction went through and the peer reported success.
    pub fn is_ok(&self) -> bool {
        self.interactive_success && self.state.is_ok()
    }

    /// Append a value.
    pub fn add(&mut self, tag: Tag, value: T) {
        self.values.push((tag, value));
    }

    /// First value with the given tag.
    pub fn get(&self, tag: Tag) -> Option<&T> {
        self.values.iter().find(|(t, _)| *t == tag).map(|(_, v)| v)
    }

    /// Last value with the given tag.
    pub fn last(&self, tag: Tag) -> Option<&T> {
        self.values.iter().rev().find(|(t, _)| *t == tag).map(|(_, v)| v)
    }

    /// All values with the given tag, in frame order.
    pub fn values(&self, tag: Tag) -> impl Iterator<Item = &T> + '_ {
        self.values
            .iter()
            .filter(move |(t, _)| *t == tag)
            .map(|(_, v)| v)
    }

    /// All tagged values, in frame order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &T)> + '_ {
        self.values.iter().map(|(t, v)| (*t, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Convert the values, keeping the outcome.
    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> ResultData<U> {
        ResultData {
            state: self.state,
            interactive_success: self.interactive_success,
            error: self.error,
            fault: self.fault,
            values: self.values.into_iter().map(|(t, v)| (t, f(v))).collect(),
        }
    }
}

impl<T> IntoIterator for ResultData<T> {
    type Item = (Tag, T);
    type IntoIter = std::vec::IntoIter<(Tag, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duplicate_tags() {
        let mut result = ResultData::success(State::Ok);
        result.add(Tag::ARGUMENT, "first");
        result.add(Tag::CONTEXT, "ctx");
        result.add(Tag::ARGUMENT, "second");

        assert_eq!(result.get(Tag::ARGUMENT), Some(&"first"));
        assert_eq!(result.last(Tag::ARGUMENT), Some(&"second"));
        assert_eq!(result.values(Tag::ARGUMENT).count(), 2);
        assert_eq!(result.get(Tag::PLAN), None);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_classification() {
        let invalid = ResultData::<String>::from_error(Error::MissingHeader { len: 0 });
        assert_eq!(invalid.state, State::Invalid);
        assert_eq!(invalid.error.as_ref().map(|e| e.code), Some(-1));

        let fault = ResultData::<String>::from_error(Error::MissingTag { index: 3 });
        assert_eq!(fault.state, State::Exception);
        assert!(fault.fault.is_some());
        assert!(!fault.is_ok());
    }
}
