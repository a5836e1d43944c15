// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn frame_round_trip() {
    let mut buf = Vec::new();
    write_frame(&mut buf, b"hello").await.unwrap();

    let mut reader = buf.as_slice();
    assert_eq!(read_frame(&mut reader).await.unwrap(), b"hello");
}

#[tokio::test]
async fn empty_frame_round_trip() {
    let mut buf = Vec::new();
    write_frame(&mut buf, b"").await.unwrap();
    let mut reader = buf.as_slice();
    assert!(read_frame(&mut reader).await.unwrap().is_empty());
}

#[tokio::test]
async fn message_round_trip() {
    let mut buf = Vec::new();
    write_message(&mut buf, b"identity-bytes", b"{\"ok\":true}").await.unwrap();

    let mut reader = buf.as_slice();
    let (identity, body) = read_message(&mut reader).await.unwrap();
    assert_eq!(identity, b"identity-bytes");
    assert_eq!(body, b"{\"ok\":true}");
}

#[tokio::test]
async fn missing_delimiter_is_malformed() {
    let mut buf = Vec::new();
    write_frame(&mut buf, b"identity").await.unwrap();
    write_frame(&mut buf, b"not-empty").await.unwrap();
    write_frame(&mut buf, b"body").await.unwrap();

    let mut reader = buf.as_slice();
    assert!(matches!(
        read_message(&mut reader).await.unwrap_err(),
        ProtocolError::Malformed(_)
    ));
}

#[tokio::test]
async fn eof_mid_frame_is_connection_closed() {
    let mut buf = Vec::new();
    write_frame(&mut buf, b"hello").await.unwrap();
    buf.truncate(buf.len() - 2);

    let mut reader = buf.as_slice();
    assert!(matches!(
        read_frame(&mut reader).await.unwrap_err(),
        ProtocolError::ConnectionClosed
    ));
}

#[tokio::test]
async fn clean_eof_is_connection_closed() {
    let mut reader: &[u8] = &[];
    assert!(matches!(
        read_frame(&mut reader).await.unwrap_err(),
        ProtocolError::ConnectionClosed
    ));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected_without_allocation() {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(u32::MAX).to_be_bytes());

    let mut reader = buf.as_slice();
    assert!(matches!(
        read_frame(&mut reader).await.unwrap_err(),
        ProtocolError::FrameTooLarge(_)
    ));
}

#[tokio::test]
async fn oversized_write_is_rejected() {
    let big = vec![0u8; MAX_FRAME_SIZE + 1];
    let mut buf = Vec::new();
    assert!(matches!(
        write_frame(&mut buf, &big).await.unwrap_err(),
        ProtocolError::FrameTooLarge(_)
    ));
}
