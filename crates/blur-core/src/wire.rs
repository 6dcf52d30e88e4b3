//! blurd wire format — the frame codec used on every connection.
//!
//! One frame is an 8-byte big-endian length prefix followed by exactly that
//! many payload bytes. The prefix is read as a signed 64-bit integer, so a
//! length with the top bit set is negative and rejected like zero.
//!
//! A connection carries exactly one frame in each direction: the client sends
//! a PNG, the server answers with the filtered PNG. There is no handshake,
//! versioning or multiplexing.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix.
pub const HEADER_LEN: usize = 8;

/// Largest payload accepted unless configured otherwise (100 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: u64 = 100 * 1024 * 1024;

/// Payload bytes requested from the stream per read call.
pub const DEFAULT_READ_CHUNK_BYTES: usize = 8 * 1024;

/// Upfront reservation for the payload buffer. Larger frames grow as bytes
/// actually arrive, so a lying prefix cannot force a 100 MiB allocation.
const INITIAL_RESERVE: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Declared length is zero or negative.
    #[error("invalid frame length {0}")]
    InvalidLength(i64),
    /// Declared length is above the configured maximum.
    #[error("frame length {declared} exceeds maximum {max}")]
    TooLarge { declared: u64, max: u64 },
    /// Stream closed before the declared number of bytes arrived.
    #[error("stream closed after {received} of {expected} bytes")]
    Incomplete { expected: u64, received: u64 },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True for errors caused by a malformed prefix rather than the transport.
    pub fn is_protocol(&self) -> bool {
        matches!(self, FrameError::InvalidLength(_) | FrameError::TooLarge { .. })
    }
}

/// Bounds applied when reading a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    pub max_payload: u64,
    pub chunk_size: usize,
}

impl FrameLimits {
    pub fn new(max_payload: u64, chunk_size: usize) -> Self {
        Self {
            max_payload,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES, DEFAULT_READ_CHUNK_BYTES)
    }
}

/// Encode a payload length as the 8-byte prefix.
pub fn encode_header(len: u64) -> [u8; HEADER_LEN] {
    len.to_be_bytes()
}

/// Validate a prefix and return the payload length it declares.
pub fn decode_header(header: [u8; HEADER_LEN], max_payload: u64) -> Result<u64, FrameError> {
    let declared = i64::from_be_bytes(header);
    if declared <= 0 {
        return Err(FrameError::InvalidLength(declared));
    }
    let len = declared as u64;
    if len > max_payload {
        return Err(FrameError::TooLarge {
            declared: len,
            max: max_payload,
        });
    }
    Ok(len)
}

/// Read one frame.
///
/// The prefix is validated before any payload byte is consumed. The payload
/// is then read in chunks of at most `limits.chunk_size` bytes, never past the
/// end of the frame.
pub async fn read_frame<R>(reader: &mut R, limits: &FrameLimits) -> Result<Bytes, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return Err(FrameError::Incomplete {
                expected: HEADER_LEN as u64,
                received: filled as u64,
            });
        }
        filled += n;
    }

    let len = decode_header(header, limits.max_payload)?;

    let mut payload = BytesMut::with_capacity(len.min(INITIAL_RESERVE) as usize);
    let mut chunk = vec![0u8; limits.chunk_size];
    let mut received = 0u64;

    while received < len {
        let want = (len - received).min(chunk.len() as u64) as usize;
        let n = reader.read(&mut chunk[..want]).await?;
        if n == 0 {
            return Err(FrameError::Incomplete {
                expected: len,
                received,
            });
        }
        payload.extend_from_slice(&chunk[..n]);
        received += n as u64;
    }

    Ok(payload.freeze())
}

/// Write one frame and flush.
///
/// Empty payloads are refused: no receiver would accept a zero-length frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    if payload.is_empty() {
        return Err(FrameError::InvalidLength(0));
    }
    writer.write_all(&encode_header(payload.len() as u64)).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn framed(len_prefix: i64, payload: &[u8]) -> Vec<u8> {
        let mut buf = len_prefix.to_be_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn header_is_big_endian() {
        assert_eq!(encode_header(0x0102), [0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!(decode_header(encode_header(300), 1000).unwrap(), 300);
    }

    #[test]
    fn negative_prefix_is_invalid() {
        let err = decode_header([0xFF; 8], DEFAULT_MAX_FRAME_BYTES).unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength(-1)));
        assert!(err.is_protocol());
    }

    #[tokio::test]
    async fn write_then_read_reproduces_payload() {
        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let mut wire = Vec::new();
        write_frame(&mut wire, &payload).await.unwrap();
        assert_eq!(wire.len(), HEADER_LEN + payload.len());

        let mut cursor = Cursor::new(wire);
        let got = read_frame(&mut cursor, &FrameLimits::default()).await.unwrap();
        assert_eq!(&got[..], &payload[..]);
    }

    #[tokio::test]
    async fn single_byte_payload_at_the_limit() {
        let limits = FrameLimits::new(1, 8);
        let mut cursor = Cursor::new(framed(1, &[42]));
        let got = read_frame(&mut cursor, &limits).await.unwrap();
        assert_eq!(&got[..], &[42]);
    }

    #[tokio::test]
    async fn zero_length_rejected_before_payload() {
        let mut cursor = Cursor::new(framed(0, b"trailing"));
        let err = read_frame(&mut cursor, &FrameLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength(0)));
        assert_eq!(cursor.position(), HEADER_LEN as u64);
    }

    #[tokio::test]
    async fn oversized_rejected_before_payload() {
        let limits = FrameLimits::new(4, 8);
        let mut cursor = Cursor::new(framed(5, b"12345"));
        let err = read_frame(&mut cursor, &limits).await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::TooLarge {
                declared: 5,
                max: 4
            }
        ));
        assert_eq!(cursor.position(), HEADER_LEN as u64);
    }

    #[tokio::test]
    async fn early_close_reports_progress() {
        let mut cursor = Cursor::new(framed(10, b"abcd"));
        let err = read_frame(&mut cursor, &FrameLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::Incomplete {
                expected: 10,
                received: 4
            }
        ));
        assert!(!err.is_protocol());
    }

    #[tokio::test]
    async fn close_inside_prefix_is_incomplete() {
        let mut cursor = Cursor::new(vec![0u8, 0, 0]);
        let err = read_frame(&mut cursor, &FrameLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::Incomplete {
                expected: 8,
                received: 3
            }
        ));
    }

    #[tokio::test]
    async fn does_not_read_past_the_frame() {
        let mut wire = framed(3, b"abc");
        wire.extend_from_slice(b"next");
        let mut cursor = Cursor::new(wire);
        let got = read_frame(&mut cursor, &FrameLimits::new(100, 2)).await.unwrap();
        assert_eq!(&got[..], b"abc");
        assert_eq!(cursor.position(), (HEADER_LEN + 3) as u64);
    }

    #[tokio::test]
    async fn tolerates_partial_reads() {
        // A 7-byte pipe forces every read and write to be split.
        let (mut client, mut server) = tokio::io::duplex(7);
        let payload: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 256) as u8).collect();
        let sent = payload.clone();

        let writer = tokio::spawn(async move {
            write_frame(&mut client, &sent).await.unwrap();
        });

        let got = read_frame(&mut server, &FrameLimits::new(4096, 64))
            .await
            .unwrap();
        writer.await.unwrap();
        assert_eq!(&got[..], &payload[..]);
    }

    #[tokio::test]
    async fn empty_payload_is_not_written() {
        let mut wire = Vec::new();
        let err = write_frame(&mut wire, &[]).await.unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength(0)));
        assert!(wire.is_empty());
    }
}
