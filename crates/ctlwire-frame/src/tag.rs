//! Control message tags.
//!
//! The numeric values are shared with every peer implementation and must
//! never change.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// One value of the closed control message enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Tag {
    /// Liveness probe. Never carries application meaning.
    Null = 0xabc0,
    /// The sender is tearing down its end of the connection.
    Exiting = 0xabc1,
    /// Are you there? Must be answered with `Ack`.
    Ping = 0xabc2,
    /// Acknowledgement of the preceding message.
    Ack = 0xabc3,
    /// Stop working and exit.
    Exit = 0xabc4,
    /// A task finished; carries a result text.
    Done = 0xabc5,
    /// A task failed.
    Error = 0xabc6,
    /// Run a task; carries the task text.
    Run = 0xabc7,
}

impl Tag {
    /// Every tag, in wire-value order.
    pub const ALL: [Tag; 8] = [
        Tag::Null,
        Tag::Exiting,
        Tag::Ping,
        Tag::Ack,
        Tag::Exit,
        Tag::Done,
        Tag::Error,
        Tag::Run,
    ];

    /// The wire value of this tag.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Whether a length-prefixed text follows this tag on the wire.
    pub fn carries_text(self) -> bool {
        matches!(self, Tag::Done | Tag::Run)
    }

    /// Whether sending this tag blocks for an `Ack` from the peer.
    pub fn requires_ack(self) -> bool {
        matches!(self, Tag::Exiting | Tag::Ping | Tag::Exit)
    }

    /// Upper-case protocol name.
    pub fn name(self) -> &'static str {
        match self {
            Tag::Null => "NULL",
            Tag::Exiting => "EXITING",
            Tag::Ping => "PING",
            Tag::Ack => "ACK",
            Tag::Exit => "EXIT",
            Tag::Done => "DONE",
            Tag::Error => "ERROR",
            Tag::Run => "RUN",
        }
    }
}

impl TryFrom<i32> for Tag {
    type Error = FrameError;

    fn try_from(value: i32) -> Result<Self, FrameError> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_i32() == value)
            .ok_or(FrameError::UnknownTag(value))
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown tag '{s}'"))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_are_stable() {
        assert_eq!(Tag::Null.as_i32(), 0xabc0);
        assert_eq!(Tag::Run.as_i32(), 0xabc7);
    }

    #[test]
    fn every_wire_value_decodes_to_its_tag() {
        for tag in Tag::ALL {
            assert_eq!(Tag::try_from(tag.as_i32()).unwrap(), tag);
        }
        assert_eq!(Tag::try_from(0xabc6).unwrap(), Tag::Error);
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = Tag::try_from(0x1234).unwrap_err();
        assert!(matches!(err, FrameError::UnknownTag(0x1234)));
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("run".parse::<Tag>().unwrap(), Tag::Run);
        assert_eq!("DONE".parse::<Tag>().unwrap(), Tag::Done);
        assert!("bogus".parse::<Tag>().is_err());
    }

    #[test]
    fn reply_and_payload_classes() {
        let needs_ack: Vec<Tag> = Tag::ALL.into_iter().filter(|t| t.requires_ack()).collect();
        assert_eq!(needs_ack, vec![Tag::Exiting, Tag::Ping, Tag::Exit]);

        let with_text: Vec<Tag> = Tag::ALL.into_iter().filter(|t| t.carries_text()).collect();
        assert_eq!(with_text, vec![Tag::Done, Tag::Run]);
    }
}
