use serde::{Deserialize, Serialize};

/// An HTTP header as a name-value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An ordered collection of HTTP headers.
///
/// Preserves insertion order and supports duplicate header names
/// (e.g., multiple `Set-Cookie` headers). Duplicates are never
/// comma-joined: flattening yields one pair per inserted header, with
/// names and values passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<Header>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a header, keeping any existing headers with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(Header::new(name, value));
    }

    /// Get the first header value matching `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Get all header values matching `name` (case-insensitive).
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Merge ambient default headers into this map, handler-wins.
    ///
    /// A default is appended only when no header of that name is already
    /// present. Defaults sharing a name are all appended, in order.
    pub fn merge_defaults(&mut self, defaults: &[Header]) {
        let present: Vec<bool> = defaults.iter().map(|d| self.contains(&d.name)).collect();
        for (default, present) in defaults.iter().zip(present) {
            if !present {
                self.entries.push(default.clone());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Header> {
        self.entries
    }

    /// Flatten into the wire pair list.
    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.entries
            .into_iter()
            .map(|h| (h.name, h.value))
            .collect()
    }
}

impl FromIterator<Header> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<(String, String)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| Header::new(n, v))
                .collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| Header::new(n, v))
                .collect(),
        }
    }
}
