//! # Length-Prefixed Framing
//!
//! `[len: u32 big-endian][len bytes]`, so one frame is one envelope whatever
//! the transport read boundaries are.

use crate::domain::RelayError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Length prefix size.
pub const FRAME_HEADER_LEN: usize = 4;

/// Read one frame.
///
/// Returns `Ok(None)` on a clean end of stream at a frame boundary. The
/// length is checked against `max_len` before the payload is allocated.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<Vec<u8>>, RelayError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(RelayError::Transport(
                "stream ended inside frame header".to_string(),
            ));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_len {
        return Err(RelayError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| RelayError::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
