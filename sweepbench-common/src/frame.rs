//! Length-prefixed echo framing: a 4-byte little-endian payload length
//! followed by the payload. Both directions use the same format.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{BenchError, Result, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};

/// Largest payload that fits in one frame.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - LENGTH_PREFIX_SIZE;

fn check_length(len: usize) -> Result<()> {
    if len == 0 || len > MAX_PAYLOAD_SIZE {
        return Err(BenchError::Protocol(format!(
            "payload length {len} outside 1..={MAX_PAYLOAD_SIZE}"
        )));
    }
    Ok(())
}

/// Encode `payload` as a complete frame.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    check_length(payload.len())?;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Read one frame and return its payload.
///
/// Returns `Ok(None)` when the stream ends before a full length prefix
/// arrives. A stream that ends inside the payload is an error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(prefix) as usize;
    check_length(len)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write one frame carrying `payload` and flush it.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
