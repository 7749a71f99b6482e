//! Integration tests for the SOCKS5 front end

mod common;

use common::*;
use relayproxy::config::Protocol;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const CONSTANT_REPLY: [u8; 10] = [0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];

fn ipv4_connect(target: SocketAddr) -> Vec<u8> {
    let SocketAddr::V4(v4) = target else {
        panic!("expected an IPv4 target");
    };
    let mut request = vec![0x05, 0x01, 0x00, 0x01];
    request.extend_from_slice(&v4.ip().octets());
    request.extend_from_slice(&v4.port().to_be_bytes());
    request
}

async fn greet(client: &mut TcpStream) {
    client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
    assert_eq!(read_exactly(client, 2).await, [0x05, 0x00]);
}

#[tokio::test]
async fn test_ipv4_connect_relays_bytes() {
    let origin = start_echo_origin().await;
    let mut proxy = start_proxy(test_config(Protocol::Socks5)).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    greet(&mut client).await;
    client.write_all(&ipv4_connect(origin)).await.unwrap();
    assert_eq!(read_exactly(&mut client, 10).await, CONSTANT_REPLY);

    echo_round_trip(&mut client, b"through socks").await;

    drop(client);
    let counts = proxy.counts_after(4).await;
    assert_eq!(counts.total(), 0);
}

#[tokio::test]
async fn test_ipv4_connect_relays_a_megabyte() {
    let origin = start_echo_origin().await;
    let mut proxy = start_proxy(test_config(Protocol::Socks5)).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    greet(&mut client).await;
    client.write_all(&ipv4_connect(origin)).await.unwrap();
    assert_eq!(read_exactly(&mut client, 10).await, CONSTANT_REPLY);

    bulk_echo(&mut client, 1024 * 1024).await;

    drop(client);
    let counts = proxy.counts_after(4).await;
    assert_eq!(counts.total(), 0);
    assert!(counts.pool_misses > 0);
}

#[tokio::test]
async fn test_domain_connect() {
    let origin = start_echo_origin().await;
    let proxy = start_proxy(test_config(Protocol::Socks5)).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    greet(&mut client).await;

    let mut request = vec![0x05, 0x01, 0x00, 0x03, 9];
    request.extend_from_slice(b"localhost");
    request.extend_from_slice(&origin.port().to_be_bytes());
    client.write_all(&request).await.unwrap();

    assert_eq!(read_exactly(&mut client, 10).await, CONSTANT_REPLY);
    echo_round_trip(&mut client, b"by name").await;
}

#[tokio::test]
async fn test_bound_address_reply() {
    let origin = start_echo_origin().await;
    let mut config = test_config(Protocol::Socks5);
    config.socks5.report_bound_addr = true;
    let proxy = start_proxy(config).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    greet(&mut client).await;
    client.write_all(&ipv4_connect(origin)).await.unwrap();

    let reply = read_exactly(&mut client, 10).await;
    assert_eq!(&reply[..8], &[0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1]);
    assert_ne!(&reply[8..], &[0, 0]);
}

#[tokio::test]
async fn test_bind_command_closes_without_reply() {
    let origin = start_echo_origin().await;
    let mut proxy = start_proxy(test_config(Protocol::Socks5)).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    greet(&mut client).await;

    let mut request = ipv4_connect(origin);
    request[1] = 0x02;
    client.write_all(&request).await.unwrap();

    assert!(read_until_closed(&mut client).await.is_empty());
    let counts = proxy.counts_after(2).await;
    assert_eq!(counts.events_processed, 2);
}

#[tokio::test]
async fn test_unreachable_origin_closes_silently() {
    let unreachable = closed_port().await;
    let proxy = start_proxy(test_config(Protocol::Socks5)).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    greet(&mut client).await;
    client.write_all(&ipv4_connect(unreachable)).await.unwrap();

    assert!(read_until_closed(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_wrong_version_closes_silently() {
    let proxy = start_proxy(test_config(Protocol::Socks5)).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    client.write_all(&[0x04, 0x01, 0x00]).await.unwrap();

    assert!(read_until_closed(&mut client).await.is_empty());
}
