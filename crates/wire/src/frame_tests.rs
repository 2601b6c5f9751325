// SPDX-License-Identifier: MIT

use super::*;
use tokio::io::BufReader;

#[tokio::test]
async fn round_trips_a_frame() {
    let mut wire = Vec::new();
    write_frame(&mut wire, br#"{"a":1}"#).await.unwrap();
    assert_eq!(wire, b"{\"a\":1}\n");

    let mut reader = BufReader::new(&wire[..]);
    let frame = read_frame(&mut reader).await.unwrap().unwrap();
    assert_eq!(frame, br#"{"a":1}"#);
}

#[tokio::test]
async fn batched_frames_read_one_at_a_time() {
    let wire = b"{\"a\":1}\n{\"b\":2}\n";
    let mut reader = BufReader::new(&wire[..]);

    assert_eq!(read_frame(&mut reader).await.unwrap().unwrap(), br#"{"a":1}"#);
    assert_eq!(read_frame(&mut reader).await.unwrap().unwrap(), br#"{"b":2}"#);
    assert!(read_frame(&mut reader).await.unwrap().is_none());
}

#[tokio::test]
async fn split_frame_is_buffered_across_reads() {
    // A duplex pipe delivers the line in two chunks
    let (client, server) = tokio::io::duplex(64);
    let (server_read, _server_write) = tokio::io::split(server);
    let mut reader = BufReader::new(server_read);

    let write_task = tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        let mut client = client;
        client.write_all(b"{\"half").await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        client.write_all(b"\":true}\n").await.unwrap();
        client.flush().await.unwrap();
    });

    let frame = read_frame(&mut reader).await.unwrap().unwrap();
    assert_eq!(frame, br#"{"half":true}"#);
    write_task.await.unwrap();
}

#[tokio::test]
async fn eof_mid_frame_is_connection_closed() {
    let wire = b"{\"unterminated\":1";
    let mut reader = BufReader::new(&wire[..]);
    assert!(matches!(
        read_frame(&mut reader).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn clean_eof_is_none() {
    let mut reader = BufReader::new(&b""[..]);
    assert!(read_frame(&mut reader).await.unwrap().is_none());
}

#[tokio::test]
async fn oversized_write_is_rejected() {
    let huge = vec![b'x'; MAX_FRAME_SIZE + 1];
    let mut wire = Vec::new();
    assert!(matches!(
        write_frame(&mut wire, &huge).await,
        Err(ProtocolError::MessageTooLarge { .. })
    ));
}
