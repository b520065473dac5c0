use std::{
    io::{Read, Write},
    net::TcpStream,
    sync::Arc,
};

use tracing::{debug, info};

use crate::{
    announce::{announce_request::AnnounceRequest, announce_response::AnnounceResponse},
    http::{http_method::HttpMethod, http_parser::Http, http_status::HttpStatus},
    tracker_status::status::{AnnounceRejection, TrackerStatus},
};

const MAX_REQUEST_HEAD: usize = 4096;

/// Handles one HTTP connection: read the request head, route it, answer,
/// close.
pub struct RequestHandler {
    stream: TcpStream,
}

/// Posible request handling errors.
#[derive(Debug)]
pub enum RequestHandlerError {
    Io(std::io::Error),
    EmptyRequest,
    MalformedRequest,
    PeerAddrUnavailable,
}

impl RequestHandler {
    pub fn new(stream: TcpStream) -> RequestHandler {
        RequestHandler { stream }
    }

    /// Serves the request. Protocol-level problems are answered with a 400
    /// or 404 before the error is returned for logging.
    pub fn handle(&mut self, status: Arc<TrackerStatus>) -> Result<(), RequestHandlerError> {
        let head = self.read_request_head()?;

        let http = match Http::parse(&head) {
            Ok(http) => http,
            Err(_) => {
                self.respond(HttpStatus::BadRequest, b"")?;
                return Err(RequestHandlerError::MalformedRequest);
            }
        };

        if http.method != HttpMethod::Get {
            return self.respond(HttpStatus::NotFound, b"");
        }

        match http.endpoint.as_str() {
            "/announce" => self.handle_announce(&http, status),
            _ => self.respond(HttpStatus::NotFound, b""),
        }
    }

    fn handle_announce(
        &mut self,
        http: &Http,
        status: Arc<TrackerStatus>,
    ) -> Result<(), RequestHandlerError> {
        let request = match AnnounceRequest::from_params(&http.params) {
            Ok(request) => request,
            Err(err) => {
                debug!("Rejecting malformed announce: {:?}", err);
                return self.respond(HttpStatus::BadRequest, b"malformed announce");
            }
        };

        let observed_ip = self
            .stream
            .peer_addr()
            .map_err(|_| RequestHandlerError::PeerAddrUnavailable)?
            .ip()
            .to_string();

        match status.announce(&request, observed_ip) {
            Ok(peers) => {
                let event = request
                    .event
                    .map(|event| format!("{:?}", event).to_lowercase())
                    .unwrap_or_else(|| "periodic".to_string());
                info!(
                    "Processed '{}' announce from {} ({} peers returned)",
                    event,
                    request.peer_id,
                    peers.len()
                );
                self.respond(HttpStatus::Ok, &AnnounceResponse::new(peers).to_json())
            }
            Err(AnnounceRejection::WrongInfoHash) => self.respond(
                HttpStatus::BadRequest,
                b"this tracker does not serve the requested torrent",
            ),
        }
    }

    /// Reads until the blank line ending the request head, bounded so a
    /// hostile client cannot feed us forever.
    fn read_request_head(&mut self) -> Result<Vec<u8>, RequestHandlerError> {
        let mut head = Vec::new();
        let mut buffer = [0u8; 1024];
        loop {
            let read = self
                .stream
                .read(&mut buffer)
                .map_err(RequestHandlerError::Io)?;
            if read == 0 {
                break;
            }
            head.extend_from_slice(&buffer[..read]);
            if head.windows(4).any(|window| window == b"\r\n\r\n") || head.len() >= MAX_REQUEST_HEAD
            {
                break;
            }
        }
        if head.is_empty() {
            return Err(RequestHandlerError::EmptyRequest);
        }
        Ok(head)
    }

    fn respond(&mut self, status: HttpStatus, body: &[u8]) -> Result<(), RequestHandlerError> {
        let head = format!(
            "HTTP/1.1 {}\r\nAccess-Control-Allow-Origin: *\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            body.len(),
        );
        let mut response = head.into_bytes();
        response.extend_from_slice(body);

        self.stream
            .write_all(&response)
            .and_then(|_| self.stream.flush())
            .map_err(RequestHandlerError::Io)
    }
}
