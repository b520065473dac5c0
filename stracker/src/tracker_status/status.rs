use std::sync::{Mutex, MutexGuard};

use chrono::Duration;

use metainfo::torrent::Torrent;

use crate::announce::announce_request::AnnounceRequest;
use crate::swarm::swarm::Swarm;
use crate::tracker_peer::peer::TrackedPeer;

/// Shared state of the tracker: the single torrent it serves and that
/// torrent's swarm, behind one mutex. Request handler threads and the
/// monitor all go through here.
#[derive(Debug)]
pub struct TrackerStatus {
    torrent_name: String,
    info_hash: [u8; 20],
    info_hash_hex: String,
    swarm: Mutex<Swarm>,
}

/// Why an announce was turned away.
#[derive(Debug, PartialEq, Eq)]
pub enum AnnounceRejection {
    WrongInfoHash,
}

/// Monitor view of the swarm.
#[derive(Debug)]
pub struct SwarmSnapshot {
    pub torrent_name: String,
    pub info_hash_hex: String,
    pub peers: Vec<TrackedPeer>,
    pub seeders: u32,
    pub leechers: u32,
}

impl TrackerStatus {
    pub fn new(torrent: &Torrent, peer_timeout: Duration) -> Self {
        Self {
            torrent_name: torrent.name(),
            info_hash: torrent.info_hash,
            info_hash_hex: torrent.info_hash_hex(),
            swarm: Mutex::new(Swarm::new(peer_timeout)),
        }
    }

    /// Applies one announce and returns the peer list for the requester.
    ///
    /// The reported IP is always the one the connection came from; peers
    /// cannot announce on behalf of another address.
    pub fn announce(
        &self,
        request: &AnnounceRequest,
        observed_ip: String,
    ) -> Result<Vec<TrackedPeer>, AnnounceRejection> {
        if request.info_hash != self.info_hash {
            return Err(AnnounceRejection::WrongInfoHash);
        }

        let peer = TrackedPeer::new(
            request.peer_id.clone(),
            observed_ip,
            request.port,
            request.left,
            request.event,
        );

        let mut swarm = self.lock();
        swarm.announce(peer, request.event);
        Ok(swarm.active_peers_excluding(&request.peer_id))
    }

    /// Prunes idle peers and snapshots the swarm for the monitor.
    pub fn snapshot(&self) -> SwarmSnapshot {
        let mut swarm = self.lock();
        swarm.remove_inactive_peers();
        let (seeders, leechers) = swarm.counts();
        SwarmSnapshot {
            torrent_name: self.torrent_name.clone(),
            info_hash_hex: self.info_hash_hex.clone(),
            peers: swarm.peers(),
            seeders,
            leechers,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Swarm> {
        match self.swarm.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use metainfo::info::Info;
    use url_encoder::url_encoder::encode;

    use super::*;

    #[test]
    fn test_announce_for_served_torrent() {
        let status = test_status();
        let request = test_request(&status.info_hash, "a");

        let peers = status
            .announce(&request, "127.0.0.1".to_string())
            .unwrap();

        assert!(peers.is_empty());
        assert_eq!(status.snapshot().peers.len(), 1);
    }

    #[test]
    fn test_announce_for_foreign_torrent_rejected() {
        let status = test_status();
        let request = test_request(&[0xEE; 20], "a");

        assert_eq!(
            status.announce(&request, "127.0.0.1".to_string()),
            Err(AnnounceRejection::WrongInfoHash)
        );
        assert!(status.snapshot().peers.is_empty());
    }

    #[test]
    fn test_second_peer_sees_the_first() {
        let status = test_status();
        status
            .announce(&test_request(&status.info_hash, "a"), "10.0.0.1".to_string())
            .unwrap();

        let peers = status
            .announce(&test_request(&status.info_hash, "b"), "10.0.0.2".to_string())
            .unwrap();

        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].ip, "10.0.0.1");
    }

    #[test]
    fn test_reported_ip_is_the_observed_one() {
        let status = test_status();
        status
            .announce(&test_request(&status.info_hash, "a"), "192.168.1.5".to_string())
            .unwrap();

        let snapshot = status.snapshot();
        assert_eq!(snapshot.peers[0].ip, "192.168.1.5");
    }

    // Auxiliary functions

    fn test_status() -> TrackerStatus {
        let info = Info {
            length: 10,
            name: "shared.bin".to_string(),
            piece_length: 4,
            pieces: vec![0x11; 60],
        };
        let info_hash = Torrent::hash_info(&info);
        let torrent = Torrent {
            announce_url: "http://127.0.0.1:8000/announce".to_string(),
            info,
            info_hash,
        };
        TrackerStatus::new(&torrent, Duration::seconds(60))
    }

    fn test_request(info_hash: &[u8; 20], peer_id: &str) -> AnnounceRequest {
        let mut params = HashMap::new();
        params.insert("info_hash".to_string(), encode(info_hash));
        params.insert("peer_id".to_string(), format!("-SP0100-00000000000{}", peer_id));
        params.insert("port".to_string(), "6881".to_string());
        params.insert("left".to_string(), "10".to_string());
        AnnounceRequest::from_params(&params).unwrap()
    }
}
