use std::net::SocketAddr;

use tokio::net::{lookup_host, TcpStream};

/// Parses a CONNECT target of the form `host:port` or `[ipv6]:port`. The
/// port defaults to 443 when omitted, per spec section 4.3 step 1.
pub fn parse_host_port(target: &str) -> (String, u16) {
    if let Some(rest) = target.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let host = rest[..end].to_string();
            let port = rest[end + 1..]
                .strip_prefix(':')
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(443);
            return (host, port);
        }
    }

    match target.rsplit_once(':') {
        Some((host, port_str)) => match port_str.parse::<u16>() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (target.to_string(), 443),
        },
        None => (target.to_string(), 443),
    }
}

/// Resolves `host:port` using the platform resolver (dual-stack preferred
/// in whatever order the resolver returns addresses) and connects to the
/// first address that accepts a TCP connection.
pub async fn resolve_and_connect(host: &str, port: u16) -> std::io::Result<(TcpStream, SocketAddr)> {
    let mut addrs = lookup_host((host, port)).await?;
    let mut last_err = None;
    for addr in addrs.by_ref() {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok((stream, addr)),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved for target host")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_port_443_when_omitted() {
        assert_eq!(parse_host_port("example.com"), ("example.com".to_string(), 443));
    }

    #[test]
    fn parses_explicit_port() {
        assert_eq!(parse_host_port("example.com:8443"), ("example.com".to_string(), 8443));
    }

    #[test]
    fn parses_bracketed_ipv6_with_port() {
        assert_eq!(parse_host_port("[::1]:443"), ("::1".to_string(), 443));
    }

    #[test]
    fn parses_bracketed_ipv6_without_port() {
        assert_eq!(parse_host_port("[::1]"), ("::1".to_string(), 443));
    }

    #[test]
    fn falls_back_to_443_on_unparsable_port() {
        assert_eq!(parse_host_port("example.com:notaport"), ("example.com:notaport".to_string(), 443));
    }
}
