use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::info;

use crate::tracker_status::status::TrackerStatus;

/// Periodically logs the state of the swarm, pruning idle peers as a side
/// effect of every snapshot.
pub fn spawn(status: Arc<TrackerStatus>, interval: Duration) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("tracker monitor".to_string())
        .spawn(move || loop {
            thread::sleep(interval);
            let snapshot = status.snapshot();
            info!(
                "Tracker monitor: torrent {} ({})",
                snapshot.torrent_name, snapshot.info_hash_hex
            );
            info!(
                "Active peers: {} ({} seeders, {} leechers)",
                snapshot.peers.len(),
                snapshot.seeders,
                snapshot.leechers
            );
            for peer in &snapshot.peers {
                info!(
                    "  - {} at {}:{} [{}] last seen {}s ago",
                    peer.id,
                    peer.ip,
                    peer.port,
                    peer.status,
                    peer.seconds_since_seen()
                );
            }
        })
}
