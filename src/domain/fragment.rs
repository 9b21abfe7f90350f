use std::fmt;

use bytes::Bytes;

/// One unit of serialized markup, in production order.
///
/// A fragment is not necessarily well-formed on its own: a tag may start in
/// one fragment and finish in the next.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment(String);

impl Fragment {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.0)
    }
}

impl From<String> for Fragment {
    fn from(html: String) -> Self {
        Self(html)
    }
}

impl From<&str> for Fragment {
    fn from(html: &str) -> Self {
        Self(html.to_string())
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
