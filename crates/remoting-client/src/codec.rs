//! Frame codec.
//!
//! ```text
//! ┌────────────┬──────────────────────────────┬─────────────┬──────┐
//! │ length i32 │ type u8 │ header length u24  │ JSON header │ body │
//! └────────────┴──────────────────────────────┴─────────────┴──────┘
//! ```
//!
//! All integers are big-endian. `length` counts everything after itself.

use crate::command::RemotingCommand;
use crate::error::RemotingError;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Largest frame accepted in either direction.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const SERIALIZE_TYPE_JSON: u32 = 0;
const HEADER_LEN_MASK: u32 = 0x00FF_FFFF;

/// Encode a command into a complete frame, length prefix included.
pub fn encode_frame(cmd: &RemotingCommand) -> Result<Vec<u8>, RemotingError> {
    let header = serde_json::to_vec(cmd)?;
    if header.len() as u32 > HEADER_LEN_MASK {
        return Err(RemotingError::FrameTooLarge(header.len()));
    }

    let length = 4 + header.len() + cmd.body.len();
    if length > MAX_FRAME_LEN {
        return Err(RemotingError::FrameTooLarge(length));
    }

    let header_word = (SERIALIZE_TYPE_JSON << 24) | header.len() as u32;

    let mut frame = Vec::with_capacity(4 + length);
    frame.extend_from_slice(&(length as u32).to_be_bytes());
    frame.extend_from_slice(&header_word.to_be_bytes());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&cmd.body);
    Ok(frame)
}

/// Decode a frame whose length prefix has already been consumed.
pub fn decode_frame(frame: &[u8]) -> Result<RemotingCommand, RemotingError> {
    let word: [u8; 4] = frame
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| RemotingError::MalformedFrame(format!("{} byte frame", frame.len())))?;
    let header_word = u32::from_be_bytes(word);

    let serialize_type = header_word >> 24;
    if serialize_type != SERIALIZE_TYPE_JSON {
        return Err(RemotingError::MalformedFrame(format!(
            "unsupported serialize type {serialize_type}"
        )));
    }

    let header_len = (header_word & HEADER_LEN_MASK) as usize;
    let header_end = 4 + header_len;
    if header_end > frame.len() {
        return Err(RemotingError::MalformedFrame(format!(
            "header length {header_len} exceeds frame length {}",
            frame.len()
        )));
    }

    let mut cmd: RemotingCommand = serde_json::from_slice(&frame[4..header_end])?;
    cmd.body = frame[header_end..].to_vec();
    Ok(cmd)
}

/// Read the next frame. Returns `None` when the stream ends between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<RemotingCommand>, RemotingError>
where
    R: AsyncRead + Unpin,
{
    let mut length_buf = [0u8; 4];
    match reader.read_exact(&mut length_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let length = u32::from_be_bytes(length_buf) as usize;
    if length > MAX_FRAME_LEN {
        return Err(RemotingError::FrameTooLarge(length));
    }

    let mut frame = vec![0u8; length];
    reader.read_exact(&mut frame).await?;
    decode_frame(&frame).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{request_code, response_code};
    use std::collections::BTreeMap;

    #[test]
    fn test_frame_layout() {
        let cmd = RemotingCommand::request(request_code::SEND_MESSAGE, BTreeMap::new())
            .with_body(b"hello".to_vec());
        let frame = encode_frame(&cmd).unwrap();
        let header_len = serde_json::to_vec(&cmd).unwrap().len();

        let length = u32::from_be_bytes(frame[0..4].try_into().unwrap()) as usize;
        assert_eq!(length, frame.len() - 4);
        assert_eq!(length, 4 + header_len + 5);

        let word = u32::from_be_bytes(frame[4..8].try_into().unwrap());
        assert_eq!(word >> 24, 0);
        assert_eq!((word & 0x00FF_FFFF) as usize, header_len);
        assert_eq!(&frame[frame.len() - 5..], b"hello");

        let decoded = decode_frame(&frame[4..]).unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        assert!(matches!(
            decode_frame(&[0, 0]),
            Err(RemotingError::MalformedFrame(_))
        ));
        // ROCKETMQ serialize type
        assert!(matches!(
            decode_frame(&[1, 0, 0, 0]),
            Err(RemotingError::MalformedFrame(_))
        ));
        // header longer than the frame
        assert!(matches!(
            decode_frame(&[0, 0, 0, 10, b'{']),
            Err(RemotingError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_oversized_body_rejected() {
        let cmd = RemotingCommand::request(request_code::SEND_MESSAGE, BTreeMap::new())
            .with_body(vec![0u8; MAX_FRAME_LEN]);
        assert!(matches!(
            encode_frame(&cmd),
            Err(RemotingError::FrameTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_read_frames_from_stream() {
        let first = RemotingCommand::response(response_code::SUCCESS, 1, None);
        let second = RemotingCommand::response(response_code::SYSTEM_BUSY, 2, Some("busy".into()))
            .with_body(vec![1, 2, 3]);

        let mut bytes = encode_frame(&first).unwrap();
        bytes.extend(encode_frame(&second).unwrap());
        let mut reader = bytes.as_slice();

        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(first));
        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(second));
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }
}
