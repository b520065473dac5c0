use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use metainfo::torrent::Torrent;

use crate::config::cfg::Cfg;
use crate::peer::bitfield::Bitfield;
use crate::peer::handshake::{Handshake, HANDSHAKE_LEN};
use crate::peer::message::{Message, MessageError, MessageId};
use crate::peer_id::PeerId;
use crate::piece_store::store::{PieceStore, PieceStoreError, WriteOutcome};
use crate::swarm::registry::SessionRegistry;

const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Posible peer session errors.
///
/// `Interrupted` is not a failure: it marks a session that observed the
/// shutdown signal mid-handshake and is reported quietly.
#[derive(Debug)]
pub enum PeerSessionError {
    Io(io::Error),
    HandshakeRejected,
    HandshakeTimedOut,
    ConnectedToSelf,
    Interrupted,
    FrameTooLong(u32),
    TruncatedFrame,
    Message(MessageError),
    Store(PieceStoreError),
}

/// One protocol state machine per TCP connection.
///
/// The session thread is the only writer on its socket; `have` broadcasts
/// from other sessions arrive through `have_inbox` and are flushed at the
/// top of every loop iteration, which keeps all sends serialized without a
/// stream lock.
pub struct PeerSession {
    stream: TcpStream,
    peer_name: String,
    torrent: Torrent,
    store: Arc<PieceStore>,
    registry: Arc<SessionRegistry>,
    token: u64,
    config: Cfg,
    local_peer_id: PeerId,
    am_choked: bool,
    peer_have: Bitfield,
    pending: HashMap<u32, Instant>,
    last_send: Instant,
    shutdown: Arc<AtomicBool>,
    have_inbox: Receiver<u32>,
}

enum FrameRead {
    Idle,
    Closed,
    KeepAlive,
    Frame(Vec<u8>),
}

enum PollRead {
    Idle,
    Closed,
    Filled,
    Interrupted,
}

impl PeerSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream: TcpStream,
        peer_name: String,
        torrent: Torrent,
        store: Arc<PieceStore>,
        registry: Arc<SessionRegistry>,
        token: u64,
        config: Cfg,
        local_peer_id: PeerId,
        shutdown: Arc<AtomicBool>,
        have_inbox: Receiver<u32>,
    ) -> Self {
        let total_pieces = torrent.total_pieces();
        Self {
            stream,
            peer_name,
            torrent,
            store,
            registry,
            token,
            config,
            local_peer_id,
            am_choked: true,
            peer_have: Bitfield::empty(total_pieces),
            pending: HashMap::new(),
            last_send: Instant::now(),
            shutdown,
            have_inbox,
        }
    }

    /// Runs the session to completion: handshake, opening sequence, then
    /// the steady-state loop until the socket closes, the wire is violated
    /// or shutdown fires. The socket is closed when the session is dropped.
    pub fn run(&mut self) -> Result<(), PeerSessionError> {
        self.stream
            .set_read_timeout(Some(self.config.poll_timeout()))
            .map_err(PeerSessionError::Io)?;
        self.stream
            .set_write_timeout(Some(WRITE_TIMEOUT))
            .map_err(PeerSessionError::Io)?;

        self.exchange_handshake()?;
        info!("Connected to peer {}", self.peer_name);

        self.send_message(Message::new(
            MessageId::Bitfield,
            self.store.bitfield().into_bytes(),
        ))?;
        self.send_message(Message::new(MessageId::Interested, vec![]))?;
        // No choking policy on our side: every peer is served.
        self.send_message(Message::new(MessageId::Unchoke, vec![]))?;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }
            self.forward_have_broadcasts()?;
            self.maybe_send_keep_alive()?;
            self.sweep_timed_out_requests();
            self.pump_requests()?;

            match self.read_frame()? {
                FrameRead::Idle | FrameRead::KeepAlive => continue,
                FrameRead::Closed => return Ok(()),
                FrameRead::Frame(frame) => {
                    let message =
                        Message::from_bytes(&frame).map_err(PeerSessionError::Message)?;
                    self.handle_message(message)?;
                }
            }
        }
    }

    /// Symmetric handshake: send ours, then require the remote's within the
    /// handshake deadline. Rejects a mismatched info hash and drops the
    /// connection when the remote turns out to be this process.
    fn exchange_handshake(&mut self) -> Result<(), PeerSessionError> {
        let ours = Handshake::new(self.torrent.info_hash, *self.local_peer_id.as_bytes());
        self.stream
            .write_all(&ours.as_bytes())
            .map_err(PeerSessionError::Io)?;
        self.last_send = Instant::now();

        let mut buffer = [0u8; HANDSHAKE_LEN];
        self.read_exact_deadline(&mut buffer, self.config.handshake_timeout())?;

        let theirs =
            Handshake::from_bytes(&buffer).map_err(|_| PeerSessionError::HandshakeRejected)?;
        if theirs.info_hash != self.torrent.info_hash {
            return Err(PeerSessionError::HandshakeRejected);
        }
        if theirs.peer_id == *self.local_peer_id.as_bytes() {
            return Err(PeerSessionError::ConnectedToSelf);
        }
        Ok(())
    }

    fn handle_message(&mut self, message: Message) -> Result<(), PeerSessionError> {
        match message.id {
            MessageId::Choke => {
                debug!("Choked by {}", self.peer_name);
                self.am_choked = true;
                // The remote will not serve these; they become eligible
                // again, from any peer.
                self.pending.clear();
            }
            MessageId::Unchoke => {
                debug!("Unchoked by {}", self.peer_name);
                self.am_choked = false;
            }
            MessageId::Interested | MessageId::NotInterested => {}
            MessageId::Have => {
                let index = message.parse_have().map_err(PeerSessionError::Message)?;
                if index < self.torrent.total_pieces() {
                    self.peer_have.set_piece(index);
                }
            }
            MessageId::Bitfield => {
                self.peer_have = Bitfield::new(message.payload);
                debug!(
                    "Peer {} has {}/{} pieces",
                    self.peer_name,
                    self.peer_have.count_pieces(self.torrent.total_pieces()),
                    self.torrent.total_pieces()
                );
            }
            MessageId::Request => self.handle_request(&message)?,
            MessageId::Piece => self.handle_piece(&message)?,
        }
        Ok(())
    }

    /// Serves a whole-piece request. Requests for a narrower range than the
    /// full piece are ignored rather than answered partially.
    fn handle_request(&mut self, message: &Message) -> Result<(), PeerSessionError> {
        let (index, begin, length) = message.parse_request().map_err(PeerSessionError::Message)?;
        if index >= self.torrent.total_pieces() {
            debug!("Ignoring request for out-of-range piece #{}", index);
            return Ok(());
        }
        if begin != 0 || length != self.torrent.piece_len(index) {
            debug!(
                "Ignoring sub-piece request from {} (piece #{}, begin {}, length {})",
                self.peer_name, index, begin, length
            );
            return Ok(());
        }
        match self.store.read_piece(index).map_err(PeerSessionError::Store)? {
            Some(block) => {
                self.send_message(Message::piece(index, 0, &block))?;
                debug!("Served piece #{} to {}", index, self.peer_name);
            }
            None => debug!(
                "Peer {} requested piece #{} we do not have",
                self.peer_name, index
            ),
        }
        Ok(())
    }

    fn handle_piece(&mut self, message: &Message) -> Result<(), PeerSessionError> {
        let (index, begin, block) = message.parse_piece().map_err(PeerSessionError::Message)?;
        if self.pending.remove(&index).is_none() {
            debug!(
                "Dropping unsolicited piece #{} from {}",
                index, self.peer_name
            );
            return Ok(());
        }
        if begin != 0 {
            debug!("Dropping partial piece #{} from {}", index, self.peer_name);
            return Ok(());
        }
        match self
            .store
            .write_piece(index, block)
            .map_err(PeerSessionError::Store)?
        {
            WriteOutcome::Stored => self.registry.broadcast_have(index, self.token),
            WriteOutcome::AlreadyStored => {}
            WriteOutcome::HashMismatch => warn!(
                "Hash mismatch for piece #{} from {}, discarding",
                index, self.peer_name
            ),
        }
        Ok(())
    }

    /// Keeps the request pipeline full while unchoked: lowest missing piece
    /// the peer advertises, capped at the configured pipeline depth.
    fn pump_requests(&mut self) -> Result<(), PeerSessionError> {
        if self.am_choked || self.store.is_complete() {
            return Ok(());
        }
        let have = self.store.snapshot_have();
        while self.pending.len() < self.config.pipelining_size {
            match next_request_index(&have, &self.peer_have, &self.pending) {
                Some(index) => {
                    debug!("Requesting piece #{} from {}", index, self.peer_name);
                    self.send_message(Message::request(index, 0, self.torrent.piece_len(index)))?;
                    self.pending.insert(index, Instant::now());
                }
                None => break,
            }
        }
        Ok(())
    }

    fn sweep_timed_out_requests(&mut self) {
        let timeout = self.config.request_timeout();
        let peer_name = &self.peer_name;
        self.pending.retain(|index, issued| {
            let expired = issued.elapsed() > timeout;
            if expired {
                warn!(
                    "Request for piece #{} from {} timed out, re-queueing",
                    index, peer_name
                );
            }
            !expired
        });
    }

    fn forward_have_broadcasts(&mut self) -> Result<(), PeerSessionError> {
        while let Ok(index) = self.have_inbox.try_recv() {
            self.send_message(Message::have(index))?;
        }
        Ok(())
    }

    fn maybe_send_keep_alive(&mut self) -> Result<(), PeerSessionError> {
        if self.last_send.elapsed() > self.config.keep_alive_interval() {
            self.stream
                .write_all(&Message::keep_alive_bytes())
                .map_err(PeerSessionError::Io)?;
            self.last_send = Instant::now();
        }
        Ok(())
    }

    fn send_message(&mut self, message: Message) -> Result<(), PeerSessionError> {
        self.stream
            .write_all(&message.as_bytes())
            .map_err(PeerSessionError::Io)?;
        self.last_send = Instant::now();
        Ok(())
    }

    /// Reads one length-prefixed frame with a bounded poll, so the loop can
    /// service timers and shutdown roughly once per poll timeout.
    fn read_frame(&mut self) -> Result<FrameRead, PeerSessionError> {
        let mut prefix = [0u8; 4];
        match self.poll_read(&mut prefix, true)? {
            PollRead::Idle | PollRead::Interrupted => return Ok(FrameRead::Idle),
            PollRead::Closed => return Ok(FrameRead::Closed),
            PollRead::Filled => {}
        }

        let frame_len = u32::from_be_bytes(prefix);
        if frame_len == 0 {
            return Ok(FrameRead::KeepAlive);
        }
        // The largest legal frame is a piece message: header plus one piece.
        if frame_len > self.torrent.piece_length() + 9 {
            return Err(PeerSessionError::FrameTooLong(frame_len));
        }

        let mut frame = vec![0u8; frame_len as usize];
        match self.poll_read(&mut frame, false)? {
            PollRead::Filled => Ok(FrameRead::Frame(frame)),
            PollRead::Interrupted => Ok(FrameRead::Idle),
            PollRead::Idle | PollRead::Closed => Err(PeerSessionError::TruncatedFrame),
        }
    }

    /// Accumulates exactly `buf.len()` bytes across read polls.
    ///
    /// With `allow_idle`, a poll timeout before the first byte yields
    /// `Idle`; once a frame has started, polls continue until it completes
    /// so no partial frame is ever abandoned.
    fn poll_read(&mut self, buf: &mut [u8], allow_idle: bool) -> Result<PollRead, PeerSessionError> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(PollRead::Interrupted);
            }
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    if filled == 0 {
                        return Ok(PollRead::Closed);
                    }
                    return Err(PeerSessionError::TruncatedFrame);
                }
                Ok(read) => filled += read,
                Err(err) if is_poll_timeout(&err) => {
                    if filled == 0 && allow_idle {
                        return Ok(PollRead::Idle);
                    }
                }
                Err(err) => return Err(PeerSessionError::Io(err)),
            }
        }
        Ok(PollRead::Filled)
    }

    fn read_exact_deadline(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<(), PeerSessionError> {
        let deadline = Instant::now() + timeout;
        let mut filled = 0;
        while filled < buf.len() {
            if self.shutdown.load(Ordering::Relaxed) {
                return Err(PeerSessionError::Interrupted);
            }
            if Instant::now() > deadline {
                return Err(PeerSessionError::HandshakeTimedOut);
            }
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => return Err(PeerSessionError::HandshakeRejected),
                Ok(read) => filled += read,
                Err(err) if is_poll_timeout(&err) => {}
                Err(err) => return Err(PeerSessionError::Io(err)),
            }
        }
        Ok(())
    }
}

fn is_poll_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Lowest-index piece we are missing, the peer advertises and we have not
/// already asked for. Deterministic and sufficient; a smarter order could
/// slot in here without touching the session.
fn next_request_index(
    have: &[bool],
    peer_have: &Bitfield,
    pending: &HashMap<u32, Instant>,
) -> Option<u32> {
    (0..have.len() as u32)
        .find(|&index| !have[index as usize] && peer_have.has_piece(index) && !pending.contains_key(&index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_request_prefers_lowest_index() {
        let have = vec![false, false, false];
        let peer_have = Bitfield::from_flags(&[true, true, true]);
        let pending = HashMap::new();

        assert_eq!(next_request_index(&have, &peer_have, &pending), Some(0));
    }

    #[test]
    fn test_next_request_skips_pieces_we_have() {
        let have = vec![true, false, true];
        let peer_have = Bitfield::from_flags(&[true, true, true]);
        let pending = HashMap::new();

        assert_eq!(next_request_index(&have, &peer_have, &pending), Some(1));
    }

    #[test]
    fn test_next_request_skips_pieces_the_peer_lacks() {
        let have = vec![false, false, false];
        let peer_have = Bitfield::from_flags(&[false, false, true]);
        let pending = HashMap::new();

        assert_eq!(next_request_index(&have, &peer_have, &pending), Some(2));
    }

    #[test]
    fn test_next_request_skips_pending_pieces() {
        let have = vec![false, false, false];
        let peer_have = Bitfield::from_flags(&[true, true, true]);
        let mut pending = HashMap::new();
        pending.insert(0, Instant::now());
        pending.insert(1, Instant::now());

        assert_eq!(next_request_index(&have, &peer_have, &pending), Some(2));
    }

    #[test]
    fn test_next_request_none_when_nothing_is_eligible() {
        let have = vec![true, false];
        let peer_have = Bitfield::from_flags(&[true, false]);
        let pending = HashMap::new();

        assert_eq!(next_request_index(&have, &peer_have, &pending), None);
    }
}
