use serde::Serialize;

use crate::tracker_peer::peer::TrackedPeer;

/// Seconds a well-behaved peer should wait between announces.
pub const ANNOUNCE_INTERVAL_SECS: u32 = 30;

/// JSON body of a successful announce.
#[derive(Debug, Serialize)]
pub struct AnnounceResponse {
    pub interval: u32,
    pub peers: Vec<PeerSummary>,
}

/// One peer endpoint as advertised to other peers.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PeerSummary {
    pub ip: String,
    pub port: u16,
    pub id: String,
}

impl AnnounceResponse {
    pub fn new(peers: Vec<TrackedPeer>) -> Self {
        Self {
            interval: ANNOUNCE_INTERVAL_SECS,
            peers: peers.iter().map(PeerSummary::from).collect(),
        }
    }

    pub fn to_json(&self) -> Vec<u8> {
        // Serialization of these plain fields cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

impl From<&TrackedPeer> for PeerSummary {
    fn from(peer: &TrackedPeer) -> Self {
        Self {
            ip: peer.ip.clone(),
            port: peer.port,
            id: peer.id.clone(),
        }
    }
}
