//! End-to-end sessions over TCP with the default handler

mod common;

use common::socks5_mock::*;
use common::*;
use sockrelay::handler::DirectHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn direct() -> Arc<DirectHandler> {
    Arc::new(DirectHandler::with_defaults().with_connect_timeout(Duration::from_secs(2)))
}

async fn read_to_close(client: &mut TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut data))
        .await
        .expect("connection was not closed")
        .unwrap();
    data
}

#[tokio::test]
async fn test_connect_ipv4_and_relay() {
    let echo = start_echo_server().await;
    let server = start_server(direct()).await;

    let mut client = connect_and_greet(server.addr).await;
    client
        .write_all(&create_connect_ipv4([127, 0, 0, 1], echo.port()))
        .await
        .unwrap();

    let reply = read_ipv4_reply(&mut client).await;
    assert_eq!(&reply[..4], &[0x05, 0x00, 0x00, 0x01]);
    assert_eq!(&reply[4..8], &[127, 0, 0, 1]);
    assert_ne!(u16::from_be_bytes([reply[8], reply[9]]), 0);

    client.write_all(b"hello through the relay").await.unwrap();
    let mut echoed = [0u8; 23];
    client.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"hello through the relay");

    // Half-close reaches the target, whose own close comes back
    client.shutdown().await.unwrap();
    assert!(read_to_close(&mut client).await.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_connect_domain() {
    let echo = start_echo_server().await;
    let server = start_server(direct()).await;

    let mut client = connect_and_greet(server.addr).await;
    client
        .write_all(&create_connect_domain("localhost", echo.port()))
        .await
        .unwrap();

    let mut header = [0u8; 4];
    client.read_exact(&mut header).await.unwrap();
    assert_eq!(&header[..2], &[0x05, 0x00]);

    server.stop().await;
}

#[tokio::test]
async fn test_pipelined_greeting_and_request() {
    let echo = start_echo_server().await;
    let server = start_server(direct()).await;

    let mut frame = create_auth_request_no_auth();
    frame.extend(create_connect_ipv4([127, 0, 0, 1], echo.port()));

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client.write_all(&frame).await.unwrap();

    let mut replies = [0u8; 12];
    client.read_exact(&mut replies).await.unwrap();
    assert_eq!(&replies[..2], &[0x05, 0x00]);
    assert_eq!(&replies[2..4], &[0x05, 0x00]);

    server.stop().await;
}

#[tokio::test]
async fn test_socks4_greeting_rejected() {
    let server = start_server(direct()).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client.write_all(&create_socks4_greeting()).await.unwrap();

    assert_eq!(
        read_to_close(&mut client).await,
        [0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_no_acceptable_method() {
    let server = start_server(direct()).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client
        .write_all(&create_auth_request_password())
        .await
        .unwrap();

    // One error frame, then close, without waiting for a request
    assert_eq!(
        read_to_close(&mut client).await,
        [0x05, 0xFF, 0x00, 0x01, 0, 0, 0, 0, 0, 0]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_bind_command_not_supported() {
    let server = start_server(direct()).await;

    let mut client = connect_and_greet(server.addr).await;
    client
        .write_all(&create_command_ipv4(0x02, [127, 0, 0, 1], 80))
        .await
        .unwrap();

    assert_eq!(
        read_to_close(&mut client).await,
        [0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_address_type() {
    let server = start_server(direct()).await;

    let mut client = connect_and_greet(server.addr).await;
    client
        .write_all(&[0x05, 0x01, 0x00, 0x09, 0x00, 0x50])
        .await
        .unwrap();

    let reply = read_to_close(&mut client).await;
    assert_eq!(reply[1], 0x07);

    server.stop().await;
}

#[tokio::test]
async fn test_connection_refused() {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    let server = start_server(direct()).await;

    let mut client = connect_and_greet(server.addr).await;
    client
        .write_all(&create_connect_ipv4([127, 0, 0, 1], addr.port()))
        .await
        .unwrap();

    assert_eq!(
        read_to_close(&mut client).await,
        [0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_ends_open_relay() {
    let echo = start_echo_server().await;
    let server = start_server(direct()).await;

    let mut client = connect_and_greet(server.addr).await;
    client
        .write_all(&create_connect_ipv4([127, 0, 0, 1], echo.port()))
        .await
        .unwrap();
    let reply = read_ipv4_reply(&mut client).await;
    assert_eq!(reply[1], 0x00);

    // The accept loop waits for this session, which ends on cancellation
    server.stop().await;
    assert!(read_to_close(&mut client).await.is_empty());
}
