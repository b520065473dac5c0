use std::str::FromStr;

/// Announce events a peer can report.
///
/// - `started`: the peer joined the swarm,
/// - `stopped`: the peer is leaving,
/// - `completed`: the peer finished downloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceEvent {
    Started,
    Stopped,
    Completed,
}

impl FromStr for AnnounceEvent {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(AnnounceEvent::Started),
            "stopped" => Ok(AnnounceEvent::Stopped),
            "completed" => Ok(AnnounceEvent::Completed),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("started".parse(), Ok(AnnounceEvent::Started));
        assert_eq!("stopped".parse(), Ok(AnnounceEvent::Stopped));
        assert_eq!("completed".parse(), Ok(AnnounceEvent::Completed));
        assert_eq!("paused".parse::<AnnounceEvent>(), Err(()));
    }
}
