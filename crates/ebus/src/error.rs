// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the ebusd client.

use std::io;

/// Errors returned by ebusd client operations.
///
/// Per-field decode failures are *not* represented here: a field whose
/// payload cannot be decoded keeps its place inside the [`Msg`] with an
/// error marker value, so one bad field never loses the rest of the
/// message. Likewise a payload that is unusable as a whole becomes a
/// [`BrokenMsg`] value rather than an error.
///
/// [`Msg`]: crate::Msg
/// [`BrokenMsg`]: crate::BrokenMsg
///
/// # Example
///
/// ```rust,no_run
/// use ebus::{Client, Error};
///
/// let mut client = Client::new("127.0.0.1", 8888);
/// match client.load_msgdefs() {
///     Err(Error::Io(e)) => eprintln!("daemon unreachable: {}", e),
///     Err(e) => eprintln!("other error: {}", e),
///     Ok(()) => {}
/// }
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Connection refused, broken or timed out.
    Io(io::Error),
    /// Peer closed the connection while a response was pending.
    Disconnected,
    /// I/O attempted without an established connection and autoconnect off.
    NotConnected,

    // ========================================================================
    // Daemon Errors
    // ========================================================================
    /// The daemon answered `ERR: <detail>` to a command.
    Command(String),

    // ========================================================================
    // Decode Errors
    // ========================================================================
    /// A received line does not match the event-line grammar.
    Format(String),
    /// A received event refers to a message absent from the catalog.
    UnknownMsg {
        /// Circuit of the unknown message.
        circuit: String,
        /// Name of the unknown message.
        name: String,
    },
    /// A catalog line is malformed.
    Parse(String),

    // ========================================================================
    // Usage Errors
    // ========================================================================
    /// A path pattern does not match the `circuit/name(#prio)?(/field)?` grammar.
    Pattern(String),
    /// Write attempted on a message that does not support it.
    NotWritable(String),
    /// A value cannot be rendered in the wire form of its field type.
    Encode(String),
}

impl Error {
    /// `true` if the error is a socket timeout.
    ///
    /// `get_state` uses this to degrade to a literal state string instead
    /// of failing.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Transport
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Disconnected => write!(f, "Connection closed by ebusd"),
            Error::NotConnected => write!(f, "Not connected"),
            // Daemon
            Error::Command(detail) => write!(f, "Command failed: {}", detail),
            // Decode
            Error::Format(line) => write!(f, "Unexpected line format: {:?}", line),
            Error::UnknownMsg { circuit, name } => {
                write!(f, "Unknown message: circuit={}, name={}", circuit, name)
            }
            Error::Parse(detail) => write!(f, "Invalid message definition: {}", detail),
            // Usage
            Error::Pattern(pattern) => write!(f, "Invalid pattern: {:?}", pattern),
            Error::NotWritable(ident) => write!(f, "Message is not writable: {}", ident),
            Error::Encode(detail) => write!(f, "Cannot encode value: {}", detail),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenient alias for API results using the public [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_detection() {
        let e = Error::Io(io::Error::new(io::ErrorKind::TimedOut, "t"));
        assert!(e.is_timeout());
        let e = Error::Io(io::Error::new(io::ErrorKind::WouldBlock, "t"));
        assert!(e.is_timeout());
        let e = Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "t"));
        assert!(!e.is_timeout());
        assert!(!Error::NotConnected.is_timeout());
    }

    #[test]
    fn display_carries_detail() {
        let e = Error::Command("element not found".into());
        assert_eq!(e.to_string(), "Command failed: element not found");
        let e = Error::UnknownMsg {
            circuit: "bai".into(),
            name: "Status01".into(),
        };
        assert_eq!(
            e.to_string(),
            "Unknown message: circuit=bai, name=Status01"
        );
    }
}
