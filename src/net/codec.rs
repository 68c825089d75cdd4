//! Endpoint frame codec.
//!
//! Every partition endpoint speaks a small length-prefixed protocol:
//!
//! ```text
//! request:  kind(u8) | partition_id(u32 BE) | len(u32 BE) | payload
//! response: kind(u8) | len(u32 BE) | payload
//! ```
//!
//! Request kinds are the operation tags (1 = command, 2 = query). A request
//! is answered by zero or more `Chunk` frames followed by exactly one of
//! `Complete`, `Error` (state machine failure) or `Rejected` (the engine did
//! not accept the request).

use crate::core::error::{LocalError, LocalResult, StatusCode};
use crate::partition::request::OperationType;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted payload.
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

const REQUEST_HEADER_LEN: usize = 9;
const RESPONSE_HEADER_LEN: usize = 5;

const RESPONSE_CHUNK: u8 = 1;
const RESPONSE_COMPLETE: u8 = 2;
const RESPONSE_ERROR: u8 = 3;
const RESPONSE_REJECTED: u8 = 4;

/// Result of decoding a frame from the wire.
#[derive(Debug)]
pub enum DecodeResult<T> {
    /// A complete frame was decoded.
    Complete(T),
    /// More data is needed to complete the frame.
    Incomplete,
    /// The input is invalid.
    Invalid(String),
}

/// Command or query addressed to a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub op: OperationType,
    pub partition_id: u32,
    pub payload: Bytes,
}

/// Output of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFrame {
    Chunk(Bytes),
    Complete,
    Error(String),
    Rejected { code: u8, message: String },
}

impl ResponseFrame {
    /// Build a rejection from a submission error.
    ///
    /// The message carries only the variant's detail; the client rebuilds
    /// the same error from the status code with [`rejection_error`].
    pub fn rejected(error: &LocalError) -> Self {
        let message = match error {
            LocalError::PartitionUnavailable { partition }
            | LocalError::DeadlineExceeded { partition } => partition.clone(),
            LocalError::Protocol { message } => message.clone(),
            other => other.to_string(),
        };
        Self::Rejected {
            code: error.status_code() as u8,
            message,
        }
    }
}

/// Codec for one side of an endpoint connection.
pub trait FrameCodec: Send + Sync {
    /// Frame type read from the peer.
    type Inbound;
    /// Frame type written to the peer.
    type Outbound;

    /// Attempt to decode a frame, consuming its bytes on success.
    fn decode(&self, buffer: &mut BytesMut) -> DecodeResult<Self::Inbound>;

    /// Append an encoded frame to the buffer.
    ///
    /// Fails without touching the buffer when the payload exceeds
    /// [`MAX_PAYLOAD_LEN`].
    fn encode(&self, frame: &Self::Outbound, buffer: &mut BytesMut) -> LocalResult<()>;
}

/// Endpoint side: reads requests, writes responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerCodec;

/// Client side: reads responses, writes requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCodec;

impl FrameCodec for ServerCodec {
    type Inbound = RequestFrame;
    type Outbound = ResponseFrame;

    fn decode(&self, buffer: &mut BytesMut) -> DecodeResult<RequestFrame> {
        if buffer.len() < REQUEST_HEADER_LEN {
            return DecodeResult::Incomplete;
        }
        let Some(op) = OperationType::from_u8(buffer[0]) else {
            return DecodeResult::Invalid(format!("unknown request kind {}", buffer[0]));
        };
        let partition_id = u32::from_be_bytes([buffer[1], buffer[2], buffer[3], buffer[4]]);
        let len = u32::from_be_bytes([buffer[5], buffer[6], buffer[7], buffer[8]]) as usize;
        if len > MAX_PAYLOAD_LEN {
            return DecodeResult::Invalid(format!("payload of {} bytes exceeds limit", len));
        }
        if buffer.len() < REQUEST_HEADER_LEN + len {
            return DecodeResult::Incomplete;
        }

        buffer.advance(REQUEST_HEADER_LEN);
        let payload = buffer.split_to(len).freeze();
        DecodeResult::Complete(RequestFrame {
            op,
            partition_id,
            payload,
        })
    }

    fn encode(&self, frame: &ResponseFrame, buffer: &mut BytesMut) -> LocalResult<()> {
        match frame {
            ResponseFrame::Chunk(chunk) => put_response(buffer, RESPONSE_CHUNK, chunk),
            ResponseFrame::Complete => put_response(buffer, RESPONSE_COMPLETE, &[]),
            ResponseFrame::Error(message) => {
                put_response(buffer, RESPONSE_ERROR, message.as_bytes())
            }
            ResponseFrame::Rejected { code, message } => {
                check_payload_len(1 + message.len())?;
                buffer.reserve(RESPONSE_HEADER_LEN + 1 + message.len());
                buffer.put_u8(RESPONSE_REJECTED);
                buffer.put_u32((1 + message.len()) as u32);
                buffer.put_u8(*code);
                buffer.put_slice(message.as_bytes());
                Ok(())
            }
        }
    }
}

impl FrameCodec for ClientCodec {
    type Inbound = ResponseFrame;
    type Outbound = RequestFrame;

    fn decode(&self, buffer: &mut BytesMut) -> DecodeResult<ResponseFrame> {
        if buffer.len() < RESPONSE_HEADER_LEN {
            return DecodeResult::Incomplete;
        }
        let kind = buffer[0];
        let len = u32::from_be_bytes([buffer[1], buffer[2], buffer[3], buffer[4]]) as usize;
        if len > MAX_PAYLOAD_LEN {
            return DecodeResult::Invalid(format!("payload of {} bytes exceeds limit", len));
        }
        if buffer.len() < RESPONSE_HEADER_LEN + len {
            return DecodeResult::Incomplete;
        }

        buffer.advance(RESPONSE_HEADER_LEN);
        let payload = buffer.split_to(len).freeze();
        let frame = match kind {
            RESPONSE_CHUNK => ResponseFrame::Chunk(payload),
            RESPONSE_COMPLETE => ResponseFrame::Complete,
            RESPONSE_ERROR => ResponseFrame::Error(String::from_utf8_lossy(&payload).into_owned()),
            RESPONSE_REJECTED => {
                if payload.is_empty() {
                    return DecodeResult::Invalid("rejection without status code".to_string());
                }
                ResponseFrame::Rejected {
                    code: payload[0],
                    message: String::from_utf8_lossy(&payload[1..]).into_owned(),
                }
            }
            other => return DecodeResult::Invalid(format!("unknown response kind {}", other)),
        };
        DecodeResult::Complete(frame)
    }

    fn encode(&self, frame: &RequestFrame, buffer: &mut BytesMut) -> LocalResult<()> {
        check_payload_len(frame.payload.len())?;
        buffer.reserve(REQUEST_HEADER_LEN + frame.payload.len());
        buffer.put_u8(frame.op.as_u8());
        buffer.put_u32(frame.partition_id);
        buffer.put_u32(frame.payload.len() as u32);
        buffer.put_slice(&frame.payload);
        Ok(())
    }
}

fn put_response(buffer: &mut BytesMut, kind: u8, payload: &[u8]) -> LocalResult<()> {
    check_payload_len(payload.len())?;
    buffer.reserve(RESPONSE_HEADER_LEN + payload.len());
    buffer.put_u8(kind);
    buffer.put_u32(payload.len() as u32);
    buffer.put_slice(payload);
    Ok(())
}

fn check_payload_len(len: usize) -> LocalResult<()> {
    if len > MAX_PAYLOAD_LEN {
        return Err(LocalError::protocol(format!(
            "payload of {} bytes exceeds limit of {}",
            len, MAX_PAYLOAD_LEN
        )));
    }
    Ok(())
}

/// Split output into chunks that each fit in one frame.
pub fn split_chunk(mut chunk: Bytes) -> Vec<Bytes> {
    let mut parts = Vec::with_capacity(chunk.len() / MAX_PAYLOAD_LEN + 1);
    while chunk.len() > MAX_PAYLOAD_LEN {
        parts.push(chunk.split_to(MAX_PAYLOAD_LEN));
    }
    parts.push(chunk);
    parts
}

/// Convert a rejection frame back into the error the endpoint reported.
pub fn rejection_error(code: u8, message: String) -> LocalError {
    if code == StatusCode::Unavailable as u8 {
        LocalError::unavailable(message)
    } else if code == StatusCode::DeadlineExceeded as u8 {
        LocalError::DeadlineExceeded { partition: message }
    } else {
        LocalError::protocol(message)
    }
}

/// Read one frame, buffering partial reads.
///
/// Returns `Ok(None)` when the peer closes the connection between frames.
pub async fn read_frame<C, R>(
    codec: &C,
    reader: &mut R,
    buffer: &mut BytesMut,
) -> LocalResult<Option<C::Inbound>>
where
    C: FrameCodec,
    R: AsyncRead + Unpin,
{
    loop {
        match codec.decode(buffer) {
            DecodeResult::Complete(frame) => return Ok(Some(frame)),
            DecodeResult::Invalid(message) => return Err(LocalError::protocol(message)),
            DecodeResult::Incomplete => {}
        }

        let n = reader
            .read_buf(buffer)
            .await
            .map_err(|e| LocalError::transport(format!("read error: {}", e)))?;
        if n == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Err(LocalError::transport("connection closed mid-frame"));
        }
    }
}

/// Encode and write one frame.
pub async fn write_frame<C, W>(codec: &C, writer: &mut W, frame: &C::Outbound) -> LocalResult<()>
where
    C: FrameCodec,
    W: AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::new();
    codec.encode(frame, &mut buffer)?;
    writer
        .write_all(&buffer)
        .await
        .map_err(|e| LocalError::transport(format!("write error: {}", e)))
}
