//! Framing and JSON codec for the one-request-per-connection protocol
//!
//! There is no length prefix on the wire: a request is whatever arrives in
//! one bounded read, with NUL padding and surrounding whitespace stripped
//! before decoding. Responses are written and the write side shut down, so
//! the peer reads to EOF.

use std::net::SocketAddr;

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::Result;

/// Upper bound on a request frame; bytes past this are never read
pub const MAX_REQUEST_BYTES: usize = 1024;

/// Read one request frame: a single read call into a fixed 1024-byte buffer.
pub async fn read_frame(stream: &mut TcpStream) -> Result<BytesMut> {
    let mut buf = BytesMut::zeroed(MAX_REQUEST_BYTES);
    let n = stream.read(&mut buf[..]).await?;
    buf.truncate(n);
    Ok(buf)
}

/// Strip NUL padding and surrounding ASCII whitespace from a raw frame.
pub fn trim_frame(buf: &[u8]) -> &[u8] {
    let is_padding = |b: &u8| *b == 0 || b.is_ascii_whitespace();
    let start = buf.iter().position(|b| !is_padding(b)).unwrap_or(buf.len());
    let end = buf
        .iter()
        .rposition(|b| !is_padding(b))
        .map_or(start, |p| p + 1);
    &buf[start..end]
}

/// Decode a JSON payload into a typed message.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(payload)?)
}

/// Write a JSON response and shut down the write side of the connection.
pub async fn write_response<T: Serialize>(stream: &mut TcpStream, response: &T) -> Result<()> {
    let encoded = serde_json::to_vec(response)?;
    stream.write_all(&encoded).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Dial a callback address and deliver one encoded request.
pub async fn relay_request<T: Serialize>(addr: SocketAddr, request: &T) -> Result<()> {
    let mut stream = TcpStream::connect(addr).await?;
    let encoded = serde_json::to_vec(request)?;
    stream.write_all(&encoded).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{BaseRequest, RequestKind, SendRequest, StatusResponse};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use uuid::Uuid;

    #[test]
    fn test_trim_frame_strips_nul_padding_and_whitespace() {
        assert_eq!(trim_frame(b"{\"a\":1}\0\0\0\0"), b"{\"a\":1}");
        assert_eq!(trim_frame(b"  {\"a\":1}\n"), b"{\"a\":1}");
        assert_eq!(trim_frame(b"{\"a\":1}\r\n\0\0"), b"{\"a\":1}");
        assert_eq!(trim_frame(b"{\"a\":1}"), b"{\"a\":1}");
    }

    #[test]
    fn test_trim_frame_empty_and_padding_only() {
        assert_eq!(trim_frame(b""), b"");
        assert_eq!(trim_frame(b"\0\0\0"), b"");
        assert_eq!(trim_frame(b"  \n\0 "), b"");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode::<BaseRequest>(b"not json at all").is_err());
        assert!(decode::<BaseRequest>(b"").is_err());
    }

    #[tokio::test]
    async fn test_request_response_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let id = Uuid::new_v4();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let mut payload =
                serde_json::to_vec(&BaseRequest::new(RequestKind::Create, id)).unwrap();
            payload.extend_from_slice(b"\n\0\0\0");
            stream.write_all(&payload).await.unwrap();

            let mut response = Vec::new();
            stream.read_to_end(&mut response).await.unwrap();
            response
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let frame = read_frame(&mut stream).await.unwrap();
        let request: BaseRequest = decode(trim_frame(&frame)).unwrap();
        assert_eq!(request.kind, RequestKind::Create);
        assert_eq!(request.id, id);

        write_response(&mut stream, &StatusResponse::ok())
            .await
            .unwrap();
        drop(stream);

        let response = client.await.unwrap();
        let status: StatusResponse = serde_json::from_slice(&response).unwrap();
        assert!(status.is_ok());
    }

    #[tokio::test]
    async fn test_relay_request_delivers_and_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let id = Uuid::new_v4();

        let request = SendRequest::new(id, "127.0.0.1:9000", "hello", "2024-01-01");
        relay_request(addr, &request).await.unwrap();

        let (mut stream, _) = listener.accept().await.unwrap();
        let frame = read_frame(&mut stream).await.unwrap();
        let received: SendRequest = decode(trim_frame(&frame)).unwrap();
        assert_eq!(received.id, id);
        assert_eq!(received.message, "hello");

        // Sender shut its write side down, so the next read is EOF.
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_read_frame_caps_at_buffer_size() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(&[b'a'; 1500]).await.unwrap();
            // Keep the connection open so the read result reflects the cap,
            // not EOF.
            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        // Let the whole burst land in the socket buffer first.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let frame = read_frame(&mut stream).await.unwrap();
        assert_eq!(frame.len(), MAX_REQUEST_BYTES);

        client.await.unwrap();
    }
}
