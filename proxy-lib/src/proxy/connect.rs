//! Hand-rolled detection and parsing of the CONNECT request line on the
//! raw (post-TLS-handshake) byte stream (spec section 9: "if the chosen
//! HTTP stack does not support detaching the byte stream after
//! responding to the tunnel setup, the tunnel must bypass the HTTP stack
//! entirely by accepting raw TLS sessions and parsing the initial CONNECT
//! line by hand"). This lets `tunnel::handler::run_tunnel` own the raw
//! socket from the first byte, so the exact `HTTP/1.0 200 Connection
//! established` line it writes is never preceded by a second,
//! hyper-generated status line.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};

const CONNECT_PREFIX: &[u8] = b"CONNECT ";
const MAX_REQUEST_BYTES: usize = 8192;

pub enum Peeked<S> {
    /// The stream opened with a CONNECT request; the full request (line
    /// and headers) has already been consumed.
    Connect { target: String, stream: S },
    /// Some other method. `prefix` holds the bytes already read off
    /// `stream` that must be replayed before anything else reads from it.
    Other { prefix: Vec<u8>, stream: S },
    /// The peer closed the connection before sending a full method word.
    Eof,
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Reads just enough of `stream` to tell a CONNECT request from any
/// other method.
pub async fn peek_request<S: AsyncRead + Unpin>(mut stream: S) -> std::io::Result<Peeked<S>> {
    let mut prefix = vec![0u8; CONNECT_PREFIX.len()];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = stream.read(&mut prefix[filled..]).await?;
        if n == 0 {
            prefix.truncate(filled);
            return Ok(if filled == 0 { Peeked::Eof } else { Peeked::Other { prefix, stream } });
        }
        filled += n;
    }

    if prefix != CONNECT_PREFIX {
        return Ok(Peeked::Other { prefix, stream });
    }

    let mut request = prefix;
    let mut chunk = [0u8; 512];
    loop {
        if let Some(pos) = find_double_crlf(&request) {
            request.truncate(pos + 4);
            break;
        }
        if request.len() > MAX_REQUEST_BYTES {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "CONNECT request too large"));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed mid-CONNECT request"));
        }
        request.extend_from_slice(&chunk[..n]);
    }

    let line_end = request.iter().position(|&b| b == b'\r').unwrap_or(request.len());
    let line = String::from_utf8_lossy(&request[..line_end]);
    let target = line.strip_prefix("CONNECT ").and_then(|rest| rest.split(' ').next()).unwrap_or("").to_string();

    Ok(Peeked::Connect { target, stream })
}

/// Replays a prefix of bytes already consumed off `inner` before handing
/// reads through to it, so a stream that was peeked for CONNECT detection
/// can still be parsed as a normal HTTP request by hyper.
pub struct PrefixedStream<S> {
    prefix: Vec<u8>,
    offset: usize,
    inner: S,
}

impl<S> PrefixedStream<S> {
    pub fn new(prefix: Vec<u8>, inner: S) -> Self {
        Self { prefix, offset: 0, inner }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PrefixedStream<S> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        if self.offset < self.prefix.len() {
            let remaining = &self.prefix[self.offset..];
            let to_copy = remaining.len().min(buf.remaining());
            buf.put_slice(&remaining[..to_copy]);
            self.offset += to_copy;
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PrefixedStream<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recognizes_connect_and_consumes_headers() {
        let input = b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n".to_vec();
        let peeked = peek_request(&input[..]).await.unwrap();
        match peeked {
            Peeked::Connect { target, .. } => assert_eq!(target, "example.com:443"),
            _ => panic!("expected Connect"),
        }
    }

    #[tokio::test]
    async fn non_connect_method_is_returned_as_prefix() {
        let input = b"GET / HTTP/1.1\r\n\r\n".to_vec();
        let peeked = peek_request(&input[..]).await.unwrap();
        match peeked {
            Peeked::Other { prefix, .. } => assert_eq!(&prefix, b"GET / HT"),
            _ => panic!("expected Other"),
        }
    }

    #[tokio::test]
    async fn empty_stream_is_eof() {
        let input: &[u8] = b"";
        let peeked = peek_request(input).await.unwrap();
        assert!(matches!(peeked, Peeked::Eof));
    }

    #[tokio::test]
    async fn prefixed_stream_replays_bytes_before_delegating() {
        let mut combined = b"CONNECT ".to_vec();
        combined.extend_from_slice(b"rest of request");
        let (prefix, rest) = combined.split_at(8);
        let mut stream = PrefixedStream::new(prefix.to_vec(), rest);
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut out).await.unwrap();
        assert_eq!(out, combined);
    }
}
