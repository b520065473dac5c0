use serde::Deserialize;

/// The tracker's JSON answer to an announce.
///
/// `interval` is part of the interface but this client announces on its own
/// fixed cadence.
#[derive(Debug, Deserialize)]
pub struct TrackerResponse {
    pub interval: u32,
    pub peers: Vec<TrackerPeer>,
}

/// One peer endpoint as advertised by the tracker.
#[derive(Debug, Deserialize)]
pub struct TrackerPeer {
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = r#"{"interval": 30, "peers": [{"ip": "127.0.0.1", "port": 6881, "id": "-SP0100-123456789012"}]}"#;
        let response: TrackerResponse = serde_json::from_str(body).unwrap();

        assert_eq!(response.interval, 30);
        assert_eq!(response.peers.len(), 1);
        assert_eq!(response.peers[0].ip, "127.0.0.1");
        assert_eq!(response.peers[0].port, 6881);
        assert_eq!(response.peers[0].id, "-SP0100-123456789012");
    }

    #[test]
    fn test_parse_response_without_peer_ids() {
        let body = r#"{"interval": 30, "peers": [{"ip": "10.0.0.9", "port": 6882}]}"#;
        let response: TrackerResponse = serde_json::from_str(body).unwrap();

        assert_eq!(response.peers[0].id, "");
    }

    #[test]
    fn test_parse_empty_peer_list() {
        let body = r#"{"interval": 30, "peers": []}"#;
        let response: TrackerResponse = serde_json::from_str(body).unwrap();
        assert!(response.peers.is_empty());
    }
}
