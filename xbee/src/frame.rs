//! API frame encoding and decoding.
//!
//! ```text
//! +------+--------+--------+------------+---------------+----------+
//! | 0x7E | len_hi | len_lo | frame type | payload (n)   | checksum |
//! +------+--------+--------+------------+---------------+----------+
//! ```
//!
//! The length counts the frame type and payload. The checksum is chosen so that the frame type,
//! payload and checksum bytes sum to `0xFF` modulo 256.

use std::fmt::{self, Display};

use crate::{ByteLink, ErrorKind, Result};

pub const START_DELIMITER: u8 = 0x7E;

/// Largest payload the 16-bit length field can describe, once the frame type byte is counted.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - 1;

/// Delimiter plus two length bytes.
const HEADER_LEN: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameError {
    PayloadTooLong(usize),
    ChecksumMismatch { expected: u8, actual: u8 },
    EmptyFrame,
}

impl Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::PayloadTooLong(len) => {
                write!(f, "payload of {} bytes exceeds {}", len, MAX_PAYLOAD_LEN)
            }
            FrameError::ChecksumMismatch { expected, actual } => write!(
                f,
                "mismatched checksum: expected {:#04x}, got {:#04x}",
                expected, actual
            ),
            FrameError::EmptyFrame => write!(f, "zero frame length"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Outcome of a single decode attempt over accumulated bytes.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    /// No complete frame yet. `skipped` leading bytes precede any start delimiter and may be
    /// dropped.
    Incomplete { skipped: usize },
    /// The candidate frame failed validation. Dropping `discard` bytes removes the leading
    /// garbage and the bad start delimiter, so scanning resumes at the next byte.
    Invalid { error: FrameError, discard: usize },
    Frame {
        frame_type: u8,
        payload: Vec<u8>,
        consumed: usize,
    },
}

pub fn checksum(data: &[u8]) -> u8 {
    0xFF - data.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

pub fn encode(frame_type: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(HEADER_LEN + payload.len() + 2);
    encode_into(frame_type, payload, &mut buffer)?;
    Ok(buffer)
}

/// Appends an encoded frame to `buffer`.
pub fn encode_into(frame_type: u8, payload: &[u8], buffer: &mut Vec<u8>) -> Result<()> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLong(payload.len()).into());
    }
    let len = (payload.len() + 1) as u16;

    buffer.push(START_DELIMITER);
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.push(frame_type);
    buffer.extend_from_slice(payload);
    let sum = payload
        .iter()
        .fold(frame_type, |sum, byte| sum.wrapping_add(*byte));
    buffer.push(0xFF - sum);

    Ok(())
}

/// A frame candidate beginning at a start delimiter.
enum Candidate {
    Short,
    Invalid(FrameError),
    Complete {
        frame_type: u8,
        payload: Vec<u8>,
        len: usize,
    },
}

fn decode_candidate(frame: &[u8]) -> Candidate {
    if frame.len() < HEADER_LEN {
        return Candidate::Short;
    }

    let len = usize::from(u16::from_be_bytes([frame[1], frame[2]]));
    if len == 0 {
        return Candidate::Invalid(FrameError::EmptyFrame);
    }

    let total = HEADER_LEN + len + 1;
    if frame.len() < total {
        return Candidate::Short;
    }

    let data = &frame[HEADER_LEN..HEADER_LEN + len];
    let provided = frame[total - 1];
    let sum = data.iter().fold(provided, |sum, byte| sum.wrapping_add(*byte));
    if sum != 0xFF {
        return Candidate::Invalid(FrameError::ChecksumMismatch {
            expected: checksum(data),
            actual: provided,
        });
    }

    Candidate::Complete {
        frame_type: data[0],
        payload: data[1..].to_vec(),
        len: total,
    }
}

/// Attempts to decode one frame from the front of `bytes`. Never blocks and never assumes the
/// frame arrived in one piece.
///
/// A stray delimiter in line noise reads as a frame with a bogus length. While that candidate
/// is still short, a complete checksum-valid frame starting at a later delimiter wins over it.
pub fn try_decode(bytes: &[u8]) -> Decoded {
    let start = match bytes.iter().position(|byte| *byte == START_DELIMITER) {
        Some(start) => start,
        None => {
            return Decoded::Incomplete {
                skipped: bytes.len(),
            }
        }
    };

    match decode_candidate(&bytes[start..]) {
        Candidate::Complete {
            frame_type,
            payload,
            len,
        } => Decoded::Frame {
            frame_type,
            payload,
            consumed: start + len,
        },
        Candidate::Invalid(error) => Decoded::Invalid {
            error,
            discard: start + 1,
        },
        Candidate::Short => {
            let later = bytes[start + 1..]
                .iter()
                .enumerate()
                .filter(|(_, byte)| **byte == START_DELIMITER)
                .map(|(offset, _)| start + 1 + offset)
                .find_map(|at| match decode_candidate(&bytes[at..]) {
                    Candidate::Complete {
                        frame_type,
                        payload,
                        len,
                    } => Some(Decoded::Frame {
                        frame_type,
                        payload,
                        consumed: at + len,
                    }),
                    _ => None,
                });
            later.unwrap_or(Decoded::Incomplete { skipped: start })
        }
    }
}

/// Accumulates bytes from the link and yields complete frames.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the next frame, a validation error for a corrupt candidate (which has already
    /// been skipped), or `None` when more bytes are needed.
    pub fn next_frame(&mut self) -> Option<std::result::Result<(u8, Vec<u8>), FrameError>> {
        match try_decode(&self.buffer) {
            Decoded::Incomplete { skipped } => {
                if skipped > 0 {
                    trace!("skipping {} bytes before start delimiter", skipped);
                    self.buffer.drain(..skipped);
                }
                None
            }
            Decoded::Invalid { error, discard } => {
                self.buffer.drain(..discard);
                Some(Err(error))
            }
            Decoded::Frame {
                frame_type,
                payload,
                consumed,
            } => {
                self.buffer.drain(..consumed);
                Some(Ok((frame_type, payload)))
            }
        }
    }

    /// Drops the start delimiter of a stalled partial frame, e.g. one with a corrupted length
    /// that would otherwise wait forever for bytes that never come.
    pub fn resync(&mut self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        self.buffer.remove(0);
        true
    }
}

/// Encodes frames into a reusable buffer and writes them to the link.
#[derive(Debug, Default)]
pub struct FrameWriter {
    buffer: Vec<u8>,
}

impl FrameWriter {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn write_frame<L>(&mut self, link: &mut L, frame_type: u8, payload: &[u8]) -> Result<()>
    where
        L: ByteLink + ?Sized,
    {
        self.buffer.clear();
        encode_into(frame_type, payload, &mut self.buffer)?;

        let written = link.write(&self.buffer)?;
        if written != self.buffer.len() {
            return Err(ErrorKind::ShortWrite {
                written,
                expected: self.buffer.len(),
            }
            .into());
        }

        Ok(())
    }
}
