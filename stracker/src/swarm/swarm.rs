use std::collections::HashMap;

use chrono::{Duration, Local};

use crate::tracker_peer::{event::AnnounceEvent, peer::TrackedPeer};

/// The peer table of the one torrent this tracker serves.
///
/// Keyed by peer id. A `stopped` announce removes the entry, any other
/// announce refreshes it, and entries that stay silent longer than
/// `peer_timeout` are pruned on every announce and monitor tick.
#[derive(Debug)]
pub struct Swarm {
    peers: HashMap<String, TrackedPeer>,
    peer_timeout: Duration,
}

impl Swarm {
    pub fn new(peer_timeout: Duration) -> Self {
        Self {
            peers: HashMap::new(),
            peer_timeout,
        }
    }

    /// Applies one announce to the table, then prunes.
    pub fn announce(&mut self, incoming: TrackedPeer, event: Option<AnnounceEvent>) {
        if event == Some(AnnounceEvent::Stopped) {
            self.peers.remove(&incoming.id);
        } else {
            match self.peers.get_mut(&incoming.id) {
                Some(existing) => {
                    existing.touch();
                    existing.left = incoming.left;
                    existing.ip = incoming.ip;
                    existing.port = incoming.port;
                    // Status only moves on an explicit event; a periodic
                    // announce keeps whatever the peer last declared.
                    if matches!(
                        event,
                        Some(AnnounceEvent::Started) | Some(AnnounceEvent::Completed)
                    ) {
                        existing.status = incoming.status;
                    }
                }
                None => {
                    self.peers.insert(incoming.id.clone(), incoming);
                }
            }
        }
        self.remove_inactive_peers();
    }

    /// The peers to hand back to a requester, excluding the requester.
    pub fn active_peers_excluding(&self, requester_id: &str) -> Vec<TrackedPeer> {
        self.peers
            .values()
            .filter(|peer| peer.id != requester_id)
            .cloned()
            .collect()
    }

    /// Snapshot of every tracked peer, for the monitor.
    pub fn peers(&self) -> Vec<TrackedPeer> {
        self.peers.values().cloned().collect()
    }

    /// `(seeders, leechers)` among the tracked peers.
    pub fn counts(&self) -> (u32, u32) {
        let seeders = self.peers.values().filter(|peer| peer.is_seeder()).count() as u32;
        (seeders, self.peers.len() as u32 - seeders)
    }

    pub fn remove_inactive_peers(&mut self) {
        let timeout = self.peer_timeout;
        let now = Local::now();
        self.peers
            .retain(|_, peer| now.signed_duration_since(peer.last_seen) < timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announce_inserts_new_peer() {
        let mut swarm = Swarm::new(Duration::seconds(60));
        swarm.announce(test_peer("a", 10), Some(AnnounceEvent::Started));

        assert_eq!(swarm.peers().len(), 1);
        assert_eq!(swarm.counts(), (0, 1));
    }

    #[test]
    fn test_stopped_removes_peer() {
        let mut swarm = Swarm::new(Duration::seconds(60));
        swarm.announce(test_peer("a", 10), Some(AnnounceEvent::Started));
        swarm.announce(test_peer("a", 10), Some(AnnounceEvent::Stopped));

        assert!(swarm.peers().is_empty());
    }

    #[test]
    fn test_completed_flips_status() {
        let mut swarm = Swarm::new(Duration::seconds(60));
        swarm.announce(test_peer("a", 10), Some(AnnounceEvent::Started));
        swarm.announce(test_peer("a", 0), Some(AnnounceEvent::Completed));

        assert_eq!(swarm.counts(), (1, 0));
    }

    #[test]
    fn test_periodic_announce_keeps_status() {
        let mut swarm = Swarm::new(Duration::seconds(60));
        swarm.announce(test_peer("a", 0), Some(AnnounceEvent::Completed));
        swarm.announce(test_peer("a", 0), None);

        assert_eq!(swarm.counts(), (1, 0));
    }

    #[test]
    fn test_response_excludes_requester() {
        let mut swarm = Swarm::new(Duration::seconds(60));
        swarm.announce(test_peer("a", 10), Some(AnnounceEvent::Started));
        swarm.announce(test_peer("b", 10), Some(AnnounceEvent::Started));

        let peers = swarm.active_peers_excluding("a");
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].id, "b");
    }

    #[test]
    fn test_idle_peers_are_pruned() {
        let mut swarm = Swarm::new(Duration::seconds(60));
        let mut stale = test_peer("a", 10);
        stale.last_seen = Local::now() - Duration::seconds(120);
        swarm.peers.insert(stale.id.clone(), stale);

        swarm.announce(test_peer("b", 10), Some(AnnounceEvent::Started));

        assert_eq!(swarm.peers().len(), 1);
        assert!(swarm.active_peers_excluding("b").is_empty());
    }

    // Auxiliary functions

    fn test_peer(id: &str, left: u64) -> TrackedPeer {
        TrackedPeer::new(id.to_string(), "127.0.0.1".to_string(), 6881, left, None)
    }
}
