//! Endpoint protocol tests.

mod common;

use bytes::{BufMut, Bytes, BytesMut};
use common::controller;
use lattice_local::net::codec::MAX_PAYLOAD_LEN;
use lattice_local::net::tcp::{bind_with_probe, ListenerState};
use lattice_local::net::EndpointServer;
use lattice_local::partition::builtin::{decode_counter, EchoStateMachine};
use lattice_local::partition::engine::EngineConfig;
use lattice_local::{
    ApplyContext, EndpointClient, LocalError, LocalPartition, PartitionGroupId,
    PartitionGroupSpec, ResultSink, StateMachine,
};
use std::net::{IpAddr, Ipv4Addr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

async fn echo_server(partition_id: u32) -> (EndpointServer, std::sync::Arc<LocalPartition>) {
    serve(partition_id, Box::new(EchoStateMachine)).await
}

async fn serve(
    partition_id: u32,
    machine: Box<dyn StateMachine>,
) -> (EndpointServer, std::sync::Arc<LocalPartition>) {
    let listener = bind_with_probe(LOOPBACK, 0, 1).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let engine = LocalPartition::start(
        EngineConfig::new("net-test", partition_id, addr.to_string()),
        machine,
    );
    let server = EndpointServer::start(listener, engine.clone()).unwrap();
    (server, engine)
}

/// Replies with a single chunk of the requested length.
struct FillStateMachine;

impl FillStateMachine {
    fn fill(input: &[u8], sink: ResultSink) {
        let raw: [u8; 8] = input.try_into().expect("8-byte length");
        sink.reply(Bytes::from(vec![0xab; u64::from_be_bytes(raw) as usize]));
    }
}

impl StateMachine for FillStateMachine {
    fn command(&mut self, _ctx: &ApplyContext, input: Bytes, sink: ResultSink) {
        Self::fill(&input, sink);
    }

    fn query(&self, _ctx: &ApplyContext, input: Bytes, sink: ResultSink) {
        Self::fill(&input, sink);
    }
}

// ============================================================================
// Client round trips
// ============================================================================

#[tokio::test]
async fn counter_over_the_wire() {
    let controller = controller();
    let id = PartitionGroupId::new("net", "counter");
    let group = controller
        .create_group(
            id.clone(),
            PartitionGroupSpec::new(2, 1).with_state_machine("counter"),
        )
        .await
        .unwrap();

    let partition = &group.partitions[1];
    let mut client = EndpointClient::connect_endpoint(&partition.endpoints[0], partition.partition_id)
        .await
        .unwrap();
    assert_eq!(client.partition_id(), 2);

    for expected in 1..=3 {
        let output = client.execute_command(Vec::new()).await.unwrap().unwrap();
        assert_eq!(decode_counter(&output[0]), Some(expected));
    }

    let delta = 10i64.to_be_bytes().to_vec();
    let output = client.execute_command(delta).await.unwrap().unwrap();
    assert_eq!(decode_counter(&output[0]), Some(13));

    let output = client.execute_query(Vec::new()).await.unwrap().unwrap();
    assert_eq!(decode_counter(&output[0]), Some(13));

    // application errors come back as output errors, not transport errors
    let output = client.execute_command(b"bad".to_vec()).await.unwrap();
    assert!(output.is_err());

    // the other partition has its own state
    let other = &group.partitions[0];
    let mut other_client = EndpointClient::connect_endpoint(&other.endpoints[0], other.partition_id)
        .await
        .unwrap();
    let output = other_client.execute_query(Vec::new()).await.unwrap().unwrap();
    assert_eq!(decode_counter(&output[0]), Some(0));

    controller.shutdown().await;
}

#[tokio::test]
async fn wrong_partition_is_rejected() {
    let (server, engine) = echo_server(1).await;
    let addr = server.local_addr().to_string();

    let mut client = EndpointClient::connect(&addr, 7).await.unwrap();
    let err = client.execute_command("hello").await.unwrap_err();
    assert!(matches!(err, LocalError::Protocol { .. }));

    // the endpoint keeps serving correctly addressed requests
    let mut client = EndpointClient::connect(&addr, 1).await.unwrap();
    let output = client.execute_query("hello").await.unwrap().unwrap();
    assert_eq!(output, vec![Bytes::from_static(b"hello")]);

    engine.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn stopped_engine_rejects_over_the_wire() {
    let (server, engine) = echo_server(1).await;
    let addr = server.local_addr().to_string();
    let mut client = EndpointClient::connect(&addr, 1).await.unwrap();

    engine.shutdown().await;
    let err = client.execute_command("late").await.unwrap_err();
    assert_eq!(err, LocalError::unavailable("net-test"));
    assert_eq!(err.to_string(), "partition unavailable: net-test");

    server.shutdown().await;
}

#[tokio::test]
async fn oversized_request_fails_before_sending() {
    let (server, engine) = echo_server(1).await;
    let mut client = EndpointClient::connect(&server.local_addr().to_string(), 1)
        .await
        .unwrap();

    let err = client
        .execute_command(vec![0u8; MAX_PAYLOAD_LEN + 1])
        .await
        .unwrap_err();
    assert!(matches!(err, LocalError::Protocol { .. }));

    // nothing reached the endpoint, so the connection is still in sync
    let output = client.execute_command("after").await.unwrap().unwrap();
    assert_eq!(output, vec![Bytes::from_static(b"after")]);
    assert_eq!(server.metrics().protocol_errors(), 0);

    engine.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn oversized_output_is_split_across_chunks() {
    let (server, engine) = serve(1, Box::new(FillStateMachine)).await;
    let mut client = EndpointClient::connect(&server.local_addr().to_string(), 1)
        .await
        .unwrap();

    let len = MAX_PAYLOAD_LEN + 10;
    let output = client
        .execute_query((len as u64).to_be_bytes().to_vec())
        .await
        .unwrap()
        .unwrap();
    let lens: Vec<usize> = output.iter().map(Bytes::len).collect();
    assert_eq!(lens, vec![MAX_PAYLOAD_LEN, 10]);
    assert!(output.iter().all(|chunk| chunk.iter().all(|b| *b == 0xab)));

    engine.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn malformed_frame_closes_connection() {
    let (server, engine) = echo_server(1).await;

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    let mut frame = BytesMut::new();
    frame.put_u8(42);
    frame.put_u32(1);
    frame.put_u32(0);
    stream.write_all(&frame).await.unwrap();

    // a rejection frame, then EOF
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    assert_eq!(response[0], 4);
    assert_eq!(server.metrics().protocol_errors(), 1);

    engine.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn server_shutdown_releases_listener() {
    let (server, engine) = echo_server(1).await;
    let addr = server.local_addr();
    assert_eq!(server.state(), ListenerState::Listening);

    let mut client = EndpointClient::connect(&addr.to_string(), 1).await.unwrap();
    client.execute_command("x").await.unwrap().unwrap();
    assert_eq!(server.metrics().connections_total(), 1);

    drop(client);

    engine.shutdown().await;
    server.shutdown().await;
    assert_eq!(server.state(), ListenerState::Stopped);
    assert!(tokio::net::TcpListener::bind(addr).await.is_ok());
}
