//! Frame layout: `[ u32 big-endian length ][ length bytes of UTF-8 JSON ]`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, WireError};

pub const LENGTH_PREFIX_LEN: usize = 4;
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Serialize `value` into a complete frame (prefix included).
pub fn encode_frame<T: Serialize>(value: &T, max_len: usize) -> Result<Vec<u8>, WireError> {
    let payload = serde_json::to_vec(value).map_err(ProtocolError::Json)?;
    let len = checked_len(payload.len(), max_len)?;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode one complete frame; trailing or missing bytes are protocol errors.
pub fn decode_frame<T: DeserializeOwned>(frame: &[u8], max_len: usize) -> Result<T, WireError> {
    if frame.len() < LENGTH_PREFIX_LEN {
        return Err(ProtocolError::FrameLength {
            declared: LENGTH_PREFIX_LEN,
            actual: frame.len(),
        }
        .into());
    }
    let (prefix, payload) = frame.split_at(LENGTH_PREFIX_LEN);
    let declared = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    checked_len(declared, max_len)?;
    if declared != payload.len() {
        return Err(ProtocolError::FrameLength {
            declared,
            actual: payload.len(),
        }
        .into());
    }
    Ok(serde_json::from_slice(payload).map_err(ProtocolError::Json)?)
}

pub async fn write_frame<W, T>(writer: &mut W, value: &T, max_len: usize) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(value, max_len)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R, T>(reader: &mut R, max_len: usize) -> Result<T, WireError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    reader.read_exact(&mut prefix).await?;
    let len = u32::from_be_bytes(prefix) as usize;
    checked_len(len, max_len)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(serde_json::from_slice(&payload).map_err(ProtocolError::Json)?)
}

fn checked_len(len: usize, max_len: usize) -> Result<u32, ProtocolError> {
    let max = max_len.min(u32::MAX as usize);
    if len > max {
        return Err(ProtocolError::FrameTooLarge { len, max });
    }
    Ok(len as u32)
}
