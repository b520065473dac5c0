use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tracing::info;

use metainfo::torrent::Torrent;

use crate::http_server::server::Server;
use crate::monitor;
use crate::tracker_status::status::TrackerStatus;

/// Port the tracker binds by default.
pub const TRACKER_PORT: u16 = 8000;

/// A peer silent for longer than this is dropped from the swarm.
const PEER_TIMEOUT_SECS: i64 = 60;

const MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Posible tracker startup errors.
#[derive(Debug)]
pub enum TrackerError {
    Io(std::io::Error),
}

/// The tracker service for one torrent: shared status, HTTP server and the
/// periodic monitor.
pub struct Tracker {
    status: Arc<TrackerStatus>,
    server: Server,
}

impl Tracker {
    /// Builds the status, binds the server and starts the monitor.
    ///
    /// # Errors
    /// - `TrackerError::Io` if the port could not be bound or the monitor
    ///   thread could not be spawned.
    pub fn init(torrent: &Torrent, port: u16) -> Result<Self, TrackerError> {
        let status = Arc::new(TrackerStatus::new(
            torrent,
            ChronoDuration::seconds(PEER_TIMEOUT_SECS),
        ));
        let server = Server::init(status.clone(), port).map_err(TrackerError::Io)?;
        monitor::spawn(status.clone(), MONITOR_INTERVAL).map_err(TrackerError::Io)?;

        info!(
            "Tracker configured to serve torrent: {} (info hash {})",
            torrent.name(),
            torrent.info_hash_hex()
        );

        Ok(Self { status, server })
    }

    pub fn port(&self) -> u16 {
        self.server.port()
    }

    pub fn status(&self) -> Arc<TrackerStatus> {
        self.status.clone()
    }

    /// Serves announces until the listener fails.
    pub fn run(self) -> std::io::Result<()> {
        self.server.serve()
    }
}
