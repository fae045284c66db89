use std::fmt;

/// Length of generated request ids.
pub const REQUEST_ID_LEN: usize = 16;

/// Identity of the current operation: the station performing it, and the
/// id of the request being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// Name of the originating station.
    pub station: String,
    /// Id correlating the messages of one request.
    pub request_id: String,
}

impl Context {
    /// A context with a fresh, random request id.
    pub fn new(station: impl ToString) -> Self {
        Self {
            station: station.to_string(),
            request_id: request_id(),
        }
    }

    /// Use the given request id.
    pub fn with_request_id(mut self, request_id: impl ToString) -> Self {
        self.request_id = request_id.to_string();
        self
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.station, self.request_id)
    }
}

/// Generate a random hexadecimal request id.
pub fn request_id() -> String {
    (0..REQUEST_ID_LEN / 2)
        .map(|_| format!("{:02x}", fastrand::u8(..)))
        .collect()
}
