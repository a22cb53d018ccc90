use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// HTTP status the cache is willing to persist.
pub const STATUS_OK: u16 = 200;

/// A complete response: status, headers and body.
///
/// Snapshots are immutable. The body is a reference-counted byte buffer,
/// so cloning a snapshot to hand one copy to the caller and persist the
/// other shares the same bytes without either side observing the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    status: u16,
    #[serde(default)]
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl ResponseSnapshot {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A 200 response with no headers.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(STATUS_OK, Vec::new(), body)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
