use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::instrument;

use crate::capture::frame::{Frame, PixelFormat};
use crate::error::CodecError;

/// Length prefix size on the wire
pub const PREFIX_LEN: usize = 4;

/// Compress a frame to JPEG. Quality 0 is treated as 1, the encoder minimum.
#[instrument(skip(frame), fields(seq = frame.sequence()))]
pub fn encode(frame: &Frame, quality: u8) -> Result<Bytes, CodecError> {
    if frame.is_empty() {
        return Err(CodecError::Encode(format!(
            "zero-sized frame {}x{}",
            frame.width(),
            frame.height()
        )));
    }
    if frame.data.len() != frame.expected_len() {
        return Err(CodecError::Encode(format!(
            "buffer holds {} bytes, {}x{} {:?} needs {}",
            frame.data.len(),
            frame.width(),
            frame.height(),
            frame.meta.format,
            frame.expected_len()
        )));
    }

    let mut buffer = Vec::with_capacity(frame.data.len() / 8);
    let result = {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        match frame.meta.format {
            PixelFormat::Gray8 => encoder.encode(
                &frame.data,
                frame.width(),
                frame.height(),
                ExtendedColorType::L8,
            ),
            PixelFormat::Rgb24 => encoder.encode(
                &frame.data,
                frame.width(),
                frame.height(),
                ExtendedColorType::Rgb8,
            ),
            PixelFormat::Bgr24 | PixelFormat::Rgba32 => encoder.encode(
                &frame.to_rgb(),
                frame.width(),
                frame.height(),
                ExtendedColorType::Rgb8,
            ),
        }
    };
    result.map_err(|e| CodecError::Encode(e.to_string()))?;

    if buffer.is_empty() {
        return Err(CodecError::Encode("encoder produced no output".into()));
    }
    Ok(Bytes::from(buffer))
}

/// Prepend the 4-byte big-endian length prefix
pub fn frame_message(payload: &[u8]) -> Result<Bytes, CodecError> {
    frame_message_with_limit(payload, u32::MAX as usize)
}

/// Like [`frame_message`] with a tighter payload ceiling
pub fn frame_message_with_limit(payload: &[u8], limit: usize) -> Result<Bytes, CodecError> {
    let limit = limit.min(u32::MAX as usize);
    if payload.len() > limit {
        return Err(CodecError::PayloadTooLarge {
            len: payload.len(),
            limit,
        });
    }

    let mut message = BytesMut::with_capacity(PREFIX_LEN + payload.len());
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    Ok(message.freeze())
}

/// Split one complete message off the front of `buf`.
/// Returns the payload and the number of bytes consumed, or `None` if `buf`
/// does not yet hold the whole message.
pub fn decode_message(buf: &[u8]) -> Option<(Bytes, usize)> {
    let prefix: [u8; PREFIX_LEN] = buf.get(..PREFIX_LEN)?.try_into().ok()?;
    let len = u32::from_be_bytes(prefix) as usize;
    let payload = buf.get(PREFIX_LEN..PREFIX_LEN + len)?;
    Some((Bytes::copy_from_slice(payload), PREFIX_LEN + len))
}

/// Read one length-prefixed message. A stream that ends before the prefix or
/// payload is complete yields `UnexpectedEof`.
pub async fn read_message<R>(reader: &mut R, limit: usize) -> io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await? as usize;
    if len > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message of {} bytes exceeds limit of {}", len, limit),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Bytes::from(payload))
}
