//! Length-prefixed framing over a byte stream.
//!
//! Frames are: 4 bytes (u32 LE payload length) + payload. A reader never
//! relies on read-call boundaries; it reads exactly the declared length.

use crate::protocol::message::Envelope;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{self, ErrorKind, Read, Write};

/// Default upper bound for one frame in either direction (1 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Lower bound accepted for a configured maximum frame size.
pub const MIN_MAX_MESSAGE_SIZE: usize = 1024;

const LENGTH_PREFIX_LEN: usize = 4;

/// Transport-level framing failure.
#[derive(Debug)]
pub enum FrameError {
    Io(io::Error),
    /// Declared (or outgoing) frame length exceeds the allowed maximum.
    MessageTooLarge { size: usize, max: usize },
}

impl Display for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::MessageTooLarge { size, max } => {
                write!(f, "message too large: {size} bytes (max {max})")
            }
        }
    }
}

impl Error for FrameError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::MessageTooLarge { .. } => None,
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Writes one length-prefixed frame and flushes.
///
/// A payload longer than `max_size` is rejected before any byte is written,
/// so the stream stays aligned on a frame boundary.
pub fn write_frame<W: Write>(
    writer: &mut W,
    payload: &[u8],
    max_size: usize,
) -> Result<(), FrameError> {
    let max = max_size.min(u32::MAX as usize);
    if payload.len() > max {
        return Err(FrameError::MessageTooLarge {
            size: payload.len(),
            max,
        });
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame.
///
/// Returns `Ok(None)` when the peer closed the stream exactly at a frame
/// boundary. EOF inside a frame is an `UnexpectedEof` I/O error.
pub fn read_frame<R: Read>(
    reader: &mut R,
    max_size: usize,
) -> Result<Option<Vec<u8>>, FrameError> {
    let mut len_buf = [0u8; LENGTH_PREFIX_LEN];
    if !read_prefix(reader, &mut len_buf)? {
        return Ok(None);
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > max_size {
        return Err(FrameError::MessageTooLarge {
            size: len,
            max: max_size,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

/// Encodes and writes one envelope as a single frame of at most `max_size`.
pub fn write_envelope<W: Write>(
    writer: &mut W,
    envelope: &Envelope,
    max_size: usize,
) -> Result<(), FrameError> {
    write_frame(writer, &envelope.encode(), max_size)
}

/// Fills `buf` completely, or returns `false` if EOF arrives before any byte.
fn read_prefix<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "stream closed inside frame length prefix",
                ));
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::{read_frame, write_envelope, write_frame, FrameError, DEFAULT_MAX_MESSAGE_SIZE};
    use crate::protocol::message::{Envelope, MessageType};
    use std::io::{Cursor, ErrorKind, Read};

    /// Reader that hands out at most `chunk` bytes per call.
    struct Trickle {
        inner: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let limit = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..limit])
        }
    }

    #[test]
    fn frames_survive_split_reads() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"first", DEFAULT_MAX_MESSAGE_SIZE).unwrap();
        write_frame(&mut wire, &[7u8; 20_000], DEFAULT_MAX_MESSAGE_SIZE).unwrap();

        let mut reader = Trickle {
            inner: Cursor::new(wire),
            chunk: 3,
        };
        assert_eq!(read_frame(&mut reader, 1 << 20).unwrap().unwrap(), b"first");
        assert_eq!(read_frame(&mut reader, 1 << 20).unwrap().unwrap().len(), 20_000);
        assert!(read_frame(&mut reader, 1 << 20).unwrap().is_none());
    }

    #[test]
    fn coalesced_frames_are_read_one_at_a_time() {
        let mut wire = Vec::new();
        write_envelope(&mut wire, &Envelope::success(), 1024).unwrap();
        let request = Envelope::new(MessageType::GetAllNotes, Vec::new());
        write_envelope(&mut wire, &request, 1024).unwrap();

        let mut reader = Cursor::new(wire);
        let first = read_frame(&mut reader, 1024).unwrap().unwrap();
        let second = read_frame(&mut reader, 1024).unwrap().unwrap();
        assert_eq!(Envelope::decode(&first).unwrap(), Envelope::success());
        assert_eq!(
            Envelope::decode(&second).unwrap().kind(),
            Some(MessageType::GetAllNotes)
        );
    }

    #[test]
    fn oversized_declared_length_is_rejected_before_reading_body() {
        let mut wire = Vec::new();
        write_frame(&mut wire, &[0u8; 2048], DEFAULT_MAX_MESSAGE_SIZE).unwrap();

        let err = read_frame(&mut Cursor::new(wire), 1024).unwrap_err();
        assert!(matches!(
            err,
            FrameError::MessageTooLarge {
                size: 2048,
                max: 1024
            }
        ));
    }

    #[test]
    fn eof_inside_frame_is_an_io_error() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"truncated", 1024).unwrap();
        wire.truncate(wire.len() - 2);

        match read_frame(&mut Cursor::new(wire), 1024).unwrap_err() {
            FrameError::Io(err) => assert_eq!(err.kind(), ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other}"),
        }

        match read_frame(&mut Cursor::new(vec![5u8, 0]), 1024).unwrap_err() {
            FrameError::Io(err) => assert_eq!(err.kind(), ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn oversized_outgoing_frame_is_rejected_before_writing() {
        let mut wire = Vec::new();
        let err = write_frame(&mut wire, &[1u8; 2048], 1024).unwrap_err();
        assert!(matches!(
            err,
            FrameError::MessageTooLarge {
                size: 2048,
                max: 1024
            }
        ));
        assert!(wire.is_empty());

        write_frame(&mut wire, &[1u8; 1024], 1024).unwrap();
        assert_eq!(read_frame(&mut Cursor::new(wire), 1024).unwrap().unwrap().len(), 1024);
    }
}
