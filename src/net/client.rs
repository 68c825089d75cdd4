//! Client for a partition endpoint.

use super::codec::{
    read_frame, rejection_error, write_frame, ClientCodec, RequestFrame, ResponseFrame,
};
use crate::control::group::PartitionEndpoint;
use crate::core::error::{LocalError, LocalResult};
use crate::partition::request::OperationType;
use crate::partition::sink::OutputError;
use bytes::{Bytes, BytesMut};
use tokio::net::TcpStream;

/// Outcome of a request executed over the wire.
pub type Output = Result<Vec<Bytes>, OutputError>;

/// Connection to one partition endpoint.
///
/// Requests are sent one at a time; each call waits for the full response.
#[derive(Debug)]
pub struct EndpointClient {
    partition_id: u32,
    stream: TcpStream,
    buffer: BytesMut,
    codec: ClientCodec,
}

impl EndpointClient {
    /// Connect to `addr`, addressing requests to `partition_id`.
    pub async fn connect(addr: &str, partition_id: u32) -> LocalResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| LocalError::transport(format!("failed to connect to {}: {}", addr, e)))?;
        let _ = stream.set_nodelay(true);
        Ok(Self {
            partition_id,
            stream,
            buffer: BytesMut::with_capacity(8 * 1024),
            codec: ClientCodec,
        })
    }

    /// Connect to an endpoint descriptor.
    pub async fn connect_endpoint(endpoint: &PartitionEndpoint, partition_id: u32) -> LocalResult<Self> {
        Self::connect(&endpoint.address(), partition_id).await
    }

    /// Partition requests are addressed to.
    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    /// Execute a command and collect its output.
    ///
    /// The outer error reports transport or submission failures; the inner
    /// one an error raised by the state machine.
    pub async fn execute_command(&mut self, input: impl Into<Bytes>) -> LocalResult<Output> {
        self.execute(OperationType::Command, input.into()).await
    }

    /// Execute a query and collect its output.
    pub async fn execute_query(&mut self, input: impl Into<Bytes>) -> LocalResult<Output> {
        self.execute(OperationType::Query, input.into()).await
    }

    async fn execute(&mut self, op: OperationType, payload: Bytes) -> LocalResult<Output> {
        let request = RequestFrame {
            op,
            partition_id: self.partition_id,
            payload,
        };
        write_frame(&self.codec, &mut self.stream, &request).await?;

        let mut chunks = Vec::new();
        loop {
            let frame = read_frame(&self.codec, &mut self.stream, &mut self.buffer)
                .await?
                .ok_or_else(|| LocalError::transport("endpoint closed the connection"))?;
            match frame {
                ResponseFrame::Chunk(chunk) => chunks.push(chunk),
                ResponseFrame::Complete => return Ok(Ok(chunks)),
                ResponseFrame::Error(message) => return Ok(Err(OutputError(message))),
                ResponseFrame::Rejected { code, message } => {
                    return Err(rejection_error(code, message))
                }
            }
        }
    }
}
