use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use url_encoder::url_encoder::encode;

use crate::peer_id::PeerId;

use super::response::TrackerResponse;
use super::url::{TrackerUrl, TrackerUrlError};

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Announce events the tracker distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Started,
    Completed,
    Stopped,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Started => "started",
            Event::Completed => "completed",
            Event::Stopped => "stopped",
        }
    }
}

/// Download accounting reported with every announce.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub downloaded: u64,
    pub left: u64,
}

/// Posible announce errors. All of them are soft: the announcer logs and
/// retries on its next tick.
#[derive(Debug)]
pub enum AnnounceError {
    UrlError(TrackerUrlError),
    UnresolvableHost,
    Io(std::io::Error),
    BadStatus(String),
    MalformedResponse(serde_json::Error),
}

/// Announces over plain HTTP/1.1 on a fresh connection each time.
#[derive(Debug)]
pub struct AnnounceClient {
    url: TrackerUrl,
    info_hash: [u8; 20],
    peer_id: PeerId,
    listen_port: u16,
}

impl AnnounceClient {
    pub fn new(
        announce_url: &str,
        info_hash: [u8; 20],
        peer_id: PeerId,
        listen_port: u16,
    ) -> Result<Self, AnnounceError> {
        let url = TrackerUrl::parse(announce_url).map_err(AnnounceError::UrlError)?;
        Ok(Self {
            url,
            info_hash,
            peer_id,
            listen_port,
        })
    }

    /// One GET to the announce endpoint.
    ///
    /// # Errors
    /// - `AnnounceError::Io` when the tracker is unreachable or the
    ///   connection dies mid-request.
    /// - `AnnounceError::BadStatus` when the tracker answers non-200.
    /// - `AnnounceError::MalformedResponse` when the body is not the
    ///   expected JSON.
    pub fn announce(
        &self,
        progress: Progress,
        event: Option<Event>,
    ) -> Result<TrackerResponse, AnnounceError> {
        let request = self.build_request(progress, event);

        let address = (self.url.host.as_str(), self.url.port)
            .to_socket_addrs()
            .map_err(AnnounceError::Io)?
            .next()
            .ok_or(AnnounceError::UnresolvableHost)?;
        let mut stream =
            TcpStream::connect_timeout(&address, HTTP_TIMEOUT).map_err(AnnounceError::Io)?;
        stream
            .set_read_timeout(Some(HTTP_TIMEOUT))
            .map_err(AnnounceError::Io)?;
        stream
            .set_write_timeout(Some(HTTP_TIMEOUT))
            .map_err(AnnounceError::Io)?;

        stream
            .write_all(request.as_bytes())
            .map_err(AnnounceError::Io)?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).map_err(AnnounceError::Io)?;

        let body = parse_http_response(&raw)?;
        serde_json::from_slice(body).map_err(AnnounceError::MalformedResponse)
    }

    fn build_request(&self, progress: Progress, event: Option<Event>) -> String {
        let mut query = format!(
            "info_hash={}&peer_id={}&port={}&uploaded=0&downloaded={}&left={}",
            encode(&self.info_hash),
            encode(self.peer_id.as_bytes()),
            self.listen_port,
            progress.downloaded,
            progress.left,
        );
        if let Some(event) = event {
            query.push_str("&event=");
            query.push_str(event.as_str());
        }

        format!(
            "GET {}?{} HTTP/1.1\r\nHost: {}\r\nUser-Agent: speer/0.1\r\nConnection: close\r\n\r\n",
            self.url.path, query, self.url.host
        )
    }
}

/// Splits status line from body and requires a 200.
fn parse_http_response(raw: &[u8]) -> Result<&[u8], AnnounceError> {
    let head_end = raw
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .ok_or_else(|| AnnounceError::BadStatus("truncated response".to_string()))?;
    let head = String::from_utf8_lossy(&raw[..head_end]);
    let status_line = head.lines().next().unwrap_or_default();
    if !status_line.contains(" 200 ") {
        return Err(AnnounceError::BadStatus(status_line.to_string()));
    }
    Ok(&raw[head_end + 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_query() {
        let client = AnnounceClient::new(
            "http://127.0.0.1:8000/announce",
            [0xAB; 20],
            PeerId::from_bytes(*b"-SP0100-000000000001"),
            6881,
        )
        .unwrap();

        let request = client.build_request(
            Progress {
                downloaded: 8,
                left: 2,
            },
            Some(Event::Started),
        );

        let encoded_hash = "%AB".repeat(20);
        assert!(request.starts_with(&format!(
            "GET /announce?info_hash={}&peer_id=-SP0100-000000000001&port=6881&uploaded=0&downloaded=8&left=2&event=started HTTP/1.1\r\n",
            encoded_hash
        )));
        assert!(request.contains("Host: 127.0.0.1\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_build_request_periodic_has_no_event() {
        let client = AnnounceClient::new(
            "http://127.0.0.1:8000/announce",
            [0u8; 20],
            PeerId::from_bytes(*b"-SP0100-000000000001"),
            6881,
        )
        .unwrap();

        let request = client.build_request(
            Progress {
                downloaded: 0,
                left: 10,
            },
            None,
        );

        assert!(!request.contains("event="));
    }

    #[test]
    fn test_parse_http_response_ok() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}";
        assert_eq!(parse_http_response(raw).unwrap(), b"{}");
    }

    #[test]
    fn test_parse_http_response_bad_status() {
        let raw = b"HTTP/1.1 400 Bad Request\r\n\r\n";
        assert!(matches!(
            parse_http_response(raw),
            Err(AnnounceError::BadStatus(_))
        ));
    }

    #[test]
    fn test_bad_url_is_rejected_up_front() {
        let result = AnnounceClient::new(
            "udp://tracker:8000/announce",
            [0u8; 20],
            PeerId::from_bytes(*b"-SP0100-000000000001"),
            6881,
        );
        assert!(matches!(
            result,
            Err(AnnounceError::UrlError(TrackerUrlError::UnsupportedScheme))
        ));
    }
}
