// Error taxonomy shared by every mailbox operation

use std::fmt;
use std::io;

use thiserror::Error;

/// What a reader found at a cursor when the two sides disagree about ring state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesyncKind {
    /// Fewer bytes are published than one message header needs.
    Truncated { readable: u32 },
    /// The header magic is neither the valid nor the tombstone sentinel.
    BadMagic { magic: u32 },
    /// A header at the read cursor was already tombstoned.
    Tombstoned,
    /// The payload length differs from the fixed command-record size.
    BadLength { length: u32 },
    /// The message payload ends past the published write cursor.
    PayloadOverrun { end: u32, write: u32 },
    /// `write_cursor - read_cursor` exceeds the segment length.
    CursorOverrun { write: u32, read: u32 },
}

impl fmt::Display for DesyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesyncKind::Truncated { readable } => {
                write!(f, "only {readable} bytes readable, header needs more")
            }
            DesyncKind::BadMagic { magic } => write!(f, "bad header magic 0x{magic:08x}"),
            DesyncKind::Tombstoned => f.write_str("tombstoned header at read cursor"),
            DesyncKind::BadLength { length } => write!(f, "unexpected payload length {length}"),
            DesyncKind::PayloadOverrun { end, write } => {
                write!(f, "payload ends at {end}, past write cursor {write}")
            }
            DesyncKind::CursorOverrun { write, read } => {
                write!(f, "write cursor {write} is too far ahead of read cursor {read}")
            }
        }
    }
}

/// Errors produced by the mailbox transport.
#[derive(Debug, Error)]
pub enum MailboxError {
    /// Ill-formed argument, detected before any shared memory is touched.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The ring has no room for the message right now. Retry later.
    #[error("out of space: need {needed} bytes, {writable} writable")]
    OutOfSpace { needed: u32, writable: u32 },

    /// Host and firmware disagree about the ring contents.
    #[error("protocol desync at cursor {cursor}: {kind}")]
    ProtocolDesync { cursor: u32, kind: DesyncKind },

    /// The firmware never published its ready signature.
    #[error("boot handshake timed out after {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    /// Failure from the shared memory backend.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl MailboxError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        MailboxError::InvalidArgument(msg.into())
    }

    /// Transient errors the caller may retry in place.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MailboxError::OutOfSpace { .. })
    }

    /// Errors that require a channel or whole-mailbox reset.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MailboxError::ProtocolDesync { .. } | MailboxError::Timeout { .. }
        )
    }
}

impl From<MailboxError> for io::Error {
    fn from(err: MailboxError) -> Self {
        let kind = match &err {
            MailboxError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            MailboxError::OutOfSpace { .. } => io::ErrorKind::WouldBlock,
            MailboxError::ProtocolDesync { .. } => io::ErrorKind::InvalidData,
            MailboxError::Timeout { .. } => io::ErrorKind::TimedOut,
            MailboxError::Io(e) => e.kind(),
        };
        match err {
            MailboxError::Io(e) => e,
            other => io::Error::new(kind, other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MailboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(MailboxError::OutOfSpace { needed: 56, writable: 8 }.is_retryable());
        assert!(!MailboxError::invalid("x").is_retryable());
        assert!(MailboxError::Timeout { waited_ms: 5 }.is_fatal());
        let desync = MailboxError::ProtocolDesync {
            cursor: 0,
            kind: DesyncKind::BadMagic { magic: 0 },
        };
        assert!(desync.is_fatal());
        assert!(!desync.is_retryable());
    }

    #[test]
    fn maps_onto_io_kinds() {
        let err: io::Error = MailboxError::OutOfSpace { needed: 56, writable: 0 }.into();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        let err: io::Error = MailboxError::Timeout { waited_ms: 1 }.into();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        let err: io::Error = MailboxError::Io(io::Error::from(io::ErrorKind::NotFound)).into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
