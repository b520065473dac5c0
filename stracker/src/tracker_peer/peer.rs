use std::fmt;

use chrono::{DateTime, Local};

use super::event::AnnounceEvent;

/// One peer as the tracker remembers it between announces.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPeer {
    pub id: String,
    pub ip: String,
    pub port: u16,
    pub status: PeerState,
    pub left: u64,
    pub last_seen: DateTime<Local>,
}

/// What the peer last told us about its download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Started,
    Completed,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerState::Started => write!(f, "started"),
            PeerState::Completed => write!(f, "completed"),
        }
    }
}

impl TrackedPeer {
    pub fn new(id: String, ip: String, port: u16, left: u64, event: Option<AnnounceEvent>) -> Self {
        let status = if event == Some(AnnounceEvent::Completed) || left == 0 {
            PeerState::Completed
        } else {
            PeerState::Started
        };
        Self {
            id,
            ip,
            port,
            status,
            left,
            last_seen: Local::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Local::now();
    }

    pub fn is_seeder(&self) -> bool {
        self.status == PeerState::Completed
    }

    pub fn seconds_since_seen(&self) -> i64 {
        Local::now().signed_duration_since(self.last_seen).num_seconds()
    }
}
