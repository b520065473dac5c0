use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use metainfo::info::Info;
use metainfo::torrent::Torrent;

use stracker::http_server::server::Server;
use stracker::tracker_status::status::TrackerStatus;
use url_encoder::url_encoder::encode;

#[test]
fn announce_flow_over_real_http() {
    let torrent = test_torrent();
    let info_hash = torrent.info_hash;
    let status = Arc::new(TrackerStatus::new(&torrent, ChronoDuration::seconds(60)));
    let server = Server::init(status, 0).unwrap();
    let port = server.port();
    thread::spawn(move || {
        let _ = server.serve();
    });

    // First peer announces: 200 with an empty peer list.
    let body = get(
        port,
        &format!(
            "/announce?info_hash={}&peer_id=peer-one-000000000001&port=7001&uploaded=0&downloaded=0&left=10&event=started",
            encode(&info_hash)
        ),
    );
    assert!(body.0.contains("200 OK"));
    let json: serde_json::Value = serde_json::from_str(&body.1).unwrap();
    assert_eq!(json["interval"], 30);
    assert_eq!(json["peers"].as_array().unwrap().len(), 0);

    // Second peer sees the first, not itself.
    let body = get(
        port,
        &format!(
            "/announce?info_hash={}&peer_id=peer-two-000000000002&port=7002&uploaded=0&downloaded=0&left=10&event=started",
            encode(&info_hash)
        ),
    );
    let json: serde_json::Value = serde_json::from_str(&body.1).unwrap();
    let peers = json["peers"].as_array().unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0]["port"], 7001);
    assert_eq!(peers[0]["id"], "peer-one-000000000001");
    assert_eq!(peers[0]["ip"], "127.0.0.1");

    // A stopped announce removes the peer.
    get(
        port,
        &format!(
            "/announce?info_hash={}&peer_id=peer-one-000000000001&port=7001&event=stopped",
            encode(&info_hash)
        ),
    );
    let body = get(
        port,
        &format!(
            "/announce?info_hash={}&peer_id=peer-two-000000000002&port=7002&left=10",
            encode(&info_hash)
        ),
    );
    let json: serde_json::Value = serde_json::from_str(&body.1).unwrap();
    assert_eq!(json["peers"].as_array().unwrap().len(), 0);
}

#[test]
fn foreign_info_hash_is_a_bad_request() {
    let torrent = test_torrent();
    let status = Arc::new(TrackerStatus::new(&torrent, ChronoDuration::seconds(60)));
    let server = Server::init(status, 0).unwrap();
    let port = server.port();
    thread::spawn(move || {
        let _ = server.serve();
    });

    let body = get(
        port,
        &format!(
            "/announce?info_hash={}&peer_id=peer-one-000000000001&port=7001&left=10",
            encode(&[0xEE; 20])
        ),
    );
    assert!(body.0.contains("400 Bad Request"));
}

#[test]
fn unknown_endpoint_is_not_found() {
    let torrent = test_torrent();
    let status = Arc::new(TrackerStatus::new(&torrent, ChronoDuration::seconds(60)));
    let server = Server::init(status, 0).unwrap();
    let port = server.port();
    thread::spawn(move || {
        let _ = server.serve();
    });

    let body = get(port, "/stats");
    assert!(body.0.contains("404 Not Found"));
}

// Auxiliary functions

fn test_torrent() -> Torrent {
    let info = Info {
        length: 10,
        name: "shared.bin".to_string(),
        piece_length: 4,
        pieces: vec![0x11; 60],
    };
    let info_hash = Torrent::hash_info(&info);
    Torrent {
        announce_url: "http://127.0.0.1:8000/announce".to_string(),
        info,
        info_hash,
    }
}

/// Issues one GET and returns `(head, body)`.
fn get(port: u16, target: &str) -> (String, String) {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
        .write_all(
            format!(
                "GET {} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n",
                target
            )
            .as_bytes(),
        )
        .unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();
    let text = String::from_utf8_lossy(&raw).into_owned();
    match text.find("\r\n\r\n") {
        Some(split) => (text[..split].to_string(), text[split + 4..].to_string()),
        None => (text, String::new()),
    }
}
