use std::fmt;

use ctlwire_frame::Tag;

/// A received control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The message tag.
    pub tag: Tag,
    /// Text that came with a `DONE` or `RUN`.
    pub text: Option<String>,
}

impl Message {
    /// A message without text.
    pub fn new(tag: Tag) -> Self {
        Self { tag, text: None }
    }

    /// A message carrying text.
    pub fn with_text(tag: Tag, text: impl Into<String>) -> Self {
        Self {
            tag,
            text: Some(text.into()),
        }
    }

    /// The text, or `""` when none came with the message.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{} {:?}", self.tag, text),
            None => write!(f, "{}", self.tag),
        }
    }
}
