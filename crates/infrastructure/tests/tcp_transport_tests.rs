use std::time::Duration;

use domain::{ConnectError, Device, PrinterTransport, TransportKind, WriteError};
use infrastructure::transports::TcpTransport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn transport() -> TcpTransport {
    TcpTransport::new(9100, Duration::from_secs(2), Duration::from_secs(2))
}

#[tokio::test]
async fn test_raw_socket_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    // Printer side: expect a status query and answer with one byte
    let printer = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 3];
        socket.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"\x1b!?");
        socket.write_all(&[0x04]).await.unwrap();
        socket
    });

    let mut t = transport();
    let device = Device::tcp("Loopback", "127.0.0.1", port);
    t.connect(&device).await.unwrap();
    assert!(t.is_live());
    assert!(t.can_read());

    t.write(b"\x1b!?").await.unwrap();
    let reply = t.read(Duration::from_secs(1)).await.unwrap();
    assert_eq!(reply, Some(vec![0x04]));

    // Peer hangs up: EOF reads as no data and marks the handle dead
    drop(printer.await.unwrap());
    assert_eq!(t.read(Duration::from_secs(1)).await.unwrap(), None);
    assert!(!t.is_live());
    assert!(t.write(b"x").await.is_err());

    t.disconnect().await;
    t.disconnect().await;
    assert_eq!(t.write(b"x").await, Err(WriteError::NotConnected));
}

#[tokio::test]
async fn test_refused_connection_is_open_failure() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut t = transport();
    let result = t.connect(&Device::tcp("Gone", "127.0.0.1", port)).await;
    assert!(matches!(result, Err(ConnectError::TransportOpenFailed(_))));
    assert!(!t.is_live());
}

#[tokio::test]
async fn test_invalid_address_is_rejected() {
    let mut t = transport();
    let result = t
        .connect(&Device::new("Bad", "10.0.0.5:not-a-port", TransportKind::TcpSocket))
        .await;
    assert_eq!(
        result,
        Err(ConnectError::InvalidAddress("10.0.0.5:not-a-port".into()))
    );
}

#[tokio::test]
async fn test_reconnect_replaces_previous_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accept = tokio::spawn(async move {
        let (first, _) = listener.accept().await.unwrap();
        let (mut second, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        second.read_to_end(&mut buf).await.unwrap();
        drop(first);
        buf
    });

    let mut t = transport();
    let device = Device::tcp("Loopback", "127.0.0.1", port);
    t.connect(&device).await.unwrap();
    t.connect(&device).await.unwrap();
    t.write(b"^XA^XZ").await.unwrap();
    t.disconnect().await;

    assert_eq!(accept.await.unwrap(), b"^XA^XZ");
}
