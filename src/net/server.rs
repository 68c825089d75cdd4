//! Endpoint server.
//!
//! Serves one partition endpoint: accepts connections on the bound listener
//! and routes each request frame into the endpoint's engine. Requests on a
//! connection are handled one at a time, so a connection observes its own
//! responses in submission order.

use super::codec::{
    read_frame, split_chunk, write_frame, RequestFrame, ResponseFrame, ServerCodec,
};
use super::tcp::{ConnectionId, ListenerMetrics, ListenerState, StateCell};
use crate::core::error::{LocalError, LocalResult};
use crate::partition::engine::LocalPartition;
use crate::partition::request::RequestContext;
use crate::partition::sink::{ResultSink, SinkEvent};
use bytes::BytesMut;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Running listener for one partition endpoint.
pub struct EndpointServer {
    local_addr: SocketAddr,
    state: Arc<StateCell>,
    metrics: Arc<ListenerMetrics>,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl EndpointServer {
    /// Start serving `engine` on an already bound listener.
    pub fn start(listener: TokioTcpListener, engine: Arc<LocalPartition>) -> LocalResult<Self> {
        let local_addr = listener.local_addr().map_err(|e| LocalError::Provisioning {
            addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            message: format!("failed to read local address: {}", e),
        })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::new(StateCell::new(ListenerState::Listening));
        let metrics = Arc::new(ListenerMetrics::default());

        let accept_task = tokio::spawn(accept_loop(
            listener,
            engine,
            state.clone(),
            metrics.clone(),
            shutdown_rx,
        ));

        Ok(Self {
            local_addr,
            state,
            metrics,
            shutdown_tx,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// Bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        self.state.get()
    }

    /// Listener counters.
    pub fn metrics(&self) -> &Arc<ListenerMetrics> {
        &self.metrics
    }

    /// Signal the accept loop and open connections to stop.
    pub fn stop(&self) {
        if self.state.get() == ListenerState::Listening {
            self.state.set(ListenerState::ShuttingDown);
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop and wait until the listening socket is released.
    pub async fn shutdown(&self) {
        self.stop();
        let task = self.accept_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(addr = %self.local_addr, error = %e, "accept task failed");
            }
        }
        self.state.set(ListenerState::Stopped);
    }
}

impl Drop for EndpointServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl std::fmt::Debug for EndpointServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointServer")
            .field("local_addr", &self.local_addr)
            .field("state", &self.state.get())
            .finish()
    }
}

async fn accept_loop(
    listener: TokioTcpListener,
    engine: Arc<LocalPartition>,
    state: Arc<StateCell>,
    metrics: Arc<ListenerMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::debug!(engine = %engine.name(), addr = %engine.address(), "endpoint listening");
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    let _ = stream.set_nodelay(true);
                    let id = metrics.connection_accepted();
                    tracing::debug!(engine = %engine.name(), conn = %id, %remote, "connection accepted");
                    tokio::spawn(serve_connection(
                        id,
                        stream,
                        engine.clone(),
                        metrics.clone(),
                        shutdown_rx.clone(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(engine = %engine.name(), error = %e, "accept failed");
                }
            },
        }
    }
    drop(listener);
    state.set(ListenerState::Stopped);
    tracing::debug!(engine = %engine.name(), "endpoint listener closed");
}

async fn serve_connection(
    id: ConnectionId,
    mut stream: TcpStream,
    engine: Arc<LocalPartition>,
    metrics: Arc<ListenerMetrics>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let codec = ServerCodec;
    let mut buffer = BytesMut::with_capacity(8 * 1024);

    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            frame = read_frame(&codec, &mut stream, &mut buffer) => frame,
        };

        let request = match frame {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(e) => {
                metrics.protocol_error();
                tracing::debug!(conn = %id, error = %e, "dropping connection");
                let _ = write_frame(&codec, &mut stream, &ResponseFrame::rejected(&e)).await;
                break;
            }
        };

        if let Err(e) = handle_request(&codec, &mut stream, &engine, request).await {
            tracing::debug!(conn = %id, error = %e, "connection write failed");
            break;
        }
        metrics.request_served();
    }

    metrics.connection_closed();
    tracing::debug!(engine = %engine.name(), conn = %id, "connection closed");
}

/// Submit one request and stream its output back.
async fn handle_request(
    codec: &ServerCodec,
    stream: &mut TcpStream,
    engine: &LocalPartition,
    request: RequestFrame,
) -> LocalResult<()> {
    if request.partition_id != engine.partition_id() {
        let error = LocalError::protocol(format!(
            "endpoint serves partition {}, request addressed partition {}",
            engine.partition_id(),
            request.partition_id
        ));
        return write_frame(codec, stream, &ResponseFrame::rejected(&error)).await;
    }

    let (sink, mut results) = ResultSink::channel();
    if let Err(e) = engine
        .submit(RequestContext::background(), request.op, request.payload, sink)
        .await
    {
        return write_frame(codec, stream, &ResponseFrame::rejected(&e)).await;
    }

    while let Some(event) = results.recv().await {
        let frame = match event {
            SinkEvent::Chunk(chunk) => {
                for part in split_chunk(chunk) {
                    write_frame(codec, stream, &ResponseFrame::Chunk(part)).await?;
                }
                continue;
            }
            SinkEvent::Complete => ResponseFrame::Complete,
            SinkEvent::Error(message) => ResponseFrame::Error(message),
        };
        write_frame(codec, stream, &frame).await?;
        break;
    }
    Ok(())
}
