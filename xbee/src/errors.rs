use std::fmt::{self, Display};
use std::io;

use crate::{AtStatus, FrameError, FrameType};

#[derive(Debug)]
pub enum ErrorKind {
    /// The byte link failed to read or write.
    Link(io::Error),
    ShortWrite {
        written: usize,
        expected: usize,
    },
    SerialPort(serialport::Error),
    /// No matching reply arrived before the retry budget ran out.
    Timeout {
        retries: usize,
    },
    Frame(FrameError),
    Truncated,
    CommandFailed(AtStatus),
    InvalidResponse(FrameType),
    NoReply(FrameType),
    ChannelError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Link(error) => write!(f, "link error: {}", error),
            ErrorKind::ShortWrite { written, expected } => {
                write!(f, "short write: {} of {} bytes", written, expected)
            }
            ErrorKind::SerialPort(error) => write!(f, "serial port error: {}", error),
            ErrorKind::Timeout { retries } => {
                write!(f, "no reply after {} retries", retries)
            }
            ErrorKind::Frame(error) => write!(f, "framing error: {}", error),
            ErrorKind::Truncated => write!(f, "payload truncated"),
            ErrorKind::CommandFailed(status) => write!(f, "command failed: {}", status),
            ErrorKind::InvalidResponse(frame_type) => {
                write!(f, "malformed response: {}", frame_type)
            }
            ErrorKind::NoReply(frame_type) => {
                write!(f, "frame type has no reply: {}", frame_type)
            }
            ErrorKind::ChannelError => write!(f, "channel error"),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
}

impl Error {
    pub(crate) fn truncated(_: io::Error) -> Self {
        ErrorKind::Truncated.into()
    }

    /// Whether the byte link itself failed, as opposed to ordinary protocol noise.
    ///
    /// The coordinator stays usable after any error; it is up to the caller to decide whether
    /// repeated link failures mean the port should be closed.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Link(_) | ErrorKind::ShortWrite { .. } | ErrorKind::SerialPort(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout { .. })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xbee error: {}", self.kind)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(other: io::Error) -> Self {
        Error {
            kind: ErrorKind::Link(other),
        }
    }
}

impl From<serialport::Error> for Error {
    fn from(other: serialport::Error) -> Self {
        Error {
            kind: ErrorKind::SerialPort(other),
        }
    }
}

impl From<FrameError> for Error {
    fn from(other: FrameError) -> Self {
        Error {
            kind: ErrorKind::Frame(other),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
