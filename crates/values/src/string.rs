//! Sass strings
//!
//! Text plus a quoted flag. Sass considers `"sans-serif"` and
//! `sans-serif` the same value, so equality and hashing ignore the flag.

use std::hash::{Hash, Hasher};

/// A Sass string.
#[derive(Debug, Clone)]
pub struct SassString {
    text: String,
    quoted: bool,
}

impl SassString {
    /// A quoted string, the default for text produced by host functions.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: true,
        }
    }

    /// An unquoted string (identifiers, keywords).
    pub fn unquoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    /// The text content.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the string renders with quotes.
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }
}

impl PartialEq for SassString {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for SassString {}

impl Hash for SassString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl std::fmt::Display for SassString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.quoted {
            write!(f, "\"{}\"", self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}
