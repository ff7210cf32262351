//! Length-prefixed framing over the compiler's stdio
//!
//! Each frame is `varint(compilation_id) || varint(body_len) || body`.
//! Compilation id 0 addresses the compiler process itself. The reader
//! distinguishes a clean EOF (stream ends exactly on a frame boundary)
//! from a truncated frame, because the latter means the child died
//! mid-message and the whole connection must be torn down.

use bytes::{Bytes, BytesMut};
use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Upper bound on a frame body. A stylesheet compilation result can be
/// large but a gigabyte body means the stream is corrupt.
pub const MAX_FRAME_LENGTH: u64 = 1 << 30;

/// Framing failure.
#[derive(Debug)]
pub enum FrameError {
    /// Underlying pipe error
    Io(std::io::Error),
    /// The stream ended in the middle of a frame
    Truncated,
    /// A varint ran past 10 bytes
    VarintOverflow,
    /// The compilation id does not fit in 32 bits
    IdOverflow(u64),
    /// The body length exceeds [`MAX_FRAME_LENGTH`]
    FrameTooLong(u64),
    /// The body was not a valid protobuf message
    Decode(prost::DecodeError),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Io(e) => write!(f, "I/O error on compiler stream: {}", e),
            FrameError::Truncated => {
                write!(f, "Compiler stream ended in the middle of a frame")
            }
            FrameError::VarintOverflow => write!(f, "Malformed varint in frame header"),
            FrameError::IdOverflow(id) => {
                write!(f, "Compilation id {} does not fit in 32 bits", id)
            }
            FrameError::FrameTooLong(len) => {
                write!(f, "Frame length {} exceeds {}", len, MAX_FRAME_LENGTH)
            }
            FrameError::Decode(e) => write!(f, "Malformed message body: {}", e),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::Io(e) => Some(e),
            FrameError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        FrameError::Io(e)
    }
}

impl From<prost::DecodeError> for FrameError {
    fn from(e: prost::DecodeError) -> Self {
        FrameError::Decode(e)
    }
}

/// Append one frame to `buf`.
pub fn encode_frame(
    compilation_id: u32,
    message: &impl Message,
    buf: &mut BytesMut,
) -> Result<(), FrameError> {
    let body_len = message.encoded_len();
    buf.reserve(body_len + 12);
    prost::encoding::encode_varint(u64::from(compilation_id), buf);
    prost::encoding::encode_varint(body_len as u64, buf);
    message
        .encode(buf)
        .map_err(|e| FrameError::Io(std::io::Error::other(e)))?;
    Ok(())
}

/// Encode a frame into a fresh buffer.
pub fn frame_to_bytes(
    compilation_id: u32,
    message: &impl Message,
) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::new();
    encode_frame(compilation_id, message, &mut buf)?;
    Ok(buf.freeze())
}

/// Read one frame.
///
/// Returns `None` on a clean EOF before the first header byte. EOF
/// anywhere inside a frame is [`FrameError::Truncated`].
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<(u32, Bytes)>, FrameError> {
    let compilation_id = match read_varint(reader, true).await? {
        Some(id) => id,
        None => return Ok(None),
    };
    let compilation_id =
        u32::try_from(compilation_id).map_err(|_| FrameError::IdOverflow(compilation_id))?;

    let body_len = read_varint(reader, false)
        .await?
        .ok_or(FrameError::Truncated)?;
    if body_len > MAX_FRAME_LENGTH {
        return Err(FrameError::FrameTooLong(body_len));
    }

    let mut body = vec![0u8; body_len as usize];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameError::Truncated
        } else {
            FrameError::Io(e)
        }
    })?;
    Ok(Some((compilation_id, Bytes::from(body))))
}

/// Read a varint byte-by-byte.
///
/// `eof_ok` permits EOF before the first byte, signalling a clean stream
/// end with `None`.
async fn read_varint<R: AsyncRead + Unpin>(
    reader: &mut R,
    eof_ok: bool,
) -> Result<Option<u64>, FrameError> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = match reader.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                if eof_ok && shift == 0 {
                    return Ok(None);
                }
                return Err(FrameError::Truncated);
            }
            Err(e) => return Err(FrameError::Io(e)),
        };
        if shift >= 64 {
            return Err(FrameError::VarintOverflow);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(Some(value));
        }
        shift += 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{InboundMessage, VersionRequest};
    use prost::Message;

    fn request_frame(id: u32) -> Bytes {
        frame_to_bytes(
            id,
            &InboundMessage::version_request(VersionRequest { id: 0 }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let frame = request_frame(42);
        let mut reader = frame.as_ref();
        let (id, body) = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(id, 42);
        let decoded = InboundMessage::decode(body).unwrap();
        assert_eq!(
            decoded,
            InboundMessage::version_request(VersionRequest { id: 0 })
        );
    }

    #[tokio::test]
    async fn test_multiple_frames_back_to_back() {
        let mut stream = BytesMut::new();
        stream.extend_from_slice(&request_frame(1));
        stream.extend_from_slice(&request_frame(300));
        let bytes = stream.freeze();
        let mut reader = bytes.as_ref();

        let (first, _) = read_frame(&mut reader).await.unwrap().unwrap();
        let (second, _) = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!((first, second), (1, 300));
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clean_eof() {
        let mut reader: &[u8] = &[];
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_body() {
        let frame = request_frame(7);
        let cut = &frame[..frame.len() - 1];
        let mut reader = cut;
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(FrameError::Truncated)
        ));
    }

    #[tokio::test]
    async fn test_truncated_header() {
        // A continuation bit with nothing after it
        let mut reader: &[u8] = &[0x80];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(FrameError::Truncated)
        ));
    }

    #[tokio::test]
    async fn test_varint_overflow() {
        let mut reader: &[u8] = &[0xff; 11];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(FrameError::VarintOverflow)
        ));
    }

    #[tokio::test]
    async fn test_id_overflow() {
        let mut buf = BytesMut::new();
        prost::encoding::encode_varint(u64::from(u32::MAX) + 1, &mut buf);
        prost::encoding::encode_varint(0, &mut buf);
        let bytes = buf.freeze();
        let mut reader = bytes.as_ref();
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(FrameError::IdOverflow(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut buf = BytesMut::new();
        prost::encoding::encode_varint(1, &mut buf);
        prost::encoding::encode_varint(MAX_FRAME_LENGTH + 1, &mut buf);
        let bytes = buf.freeze();
        let mut reader = bytes.as_ref();
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(FrameError::FrameTooLong(_))
        ));
    }

    #[tokio::test]
    async fn test_multibyte_varint_id() {
        let frame = request_frame(0x1234_5678);
        let mut reader = frame.as_ref();
        let (id, _) = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(id, 0x1234_5678);
    }
}
