use std::io;
use std::net::{IpAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use metainfo::torrent::Torrent;

use crate::config::cfg::Cfg;
use crate::peer::session::{PeerSession, PeerSessionError};
use crate::peer_id::PeerId;
use crate::piece_store::store::PieceStore;
use crate::swarm::registry::SessionRegistry;
use crate::tracker::announce::{AnnounceClient, Event, Progress};

const ACCEPT_POLL: Duration = Duration::from_millis(250);
const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

/// Posible swarm startup errors.
#[derive(Debug)]
pub enum SwarmError {
    Bind(io::Error),
    Spawn(io::Error),
}

/// Wires the piece store, the session registry, the listener and the
/// tracker announcer together. `start` consumes it and hands back a
/// `SwarmHandle` for dialing and shutdown.
pub struct Swarm {
    torrent: Torrent,
    store: Arc<PieceStore>,
    config: Cfg,
    peer_id: PeerId,
}

struct SwarmInner {
    torrent: Torrent,
    store: Arc<PieceStore>,
    config: Cfg,
    peer_id: PeerId,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<AtomicBool>,
    listen_port: u16,
}

/// Control surface of a running swarm.
pub struct SwarmHandle {
    inner: Arc<SwarmInner>,
    listener: Option<JoinHandle<()>>,
    announcer: Option<JoinHandle<()>>,
}

impl Swarm {
    pub fn new(torrent: Torrent, store: Arc<PieceStore>, config: Cfg, peer_id: PeerId) -> Self {
        Self {
            torrent,
            store,
            config,
            peer_id,
        }
    }

    /// Binds the listener (port 0 picks a free one) and spawns the accept
    /// and announce workers.
    ///
    /// # Errors
    /// - `SwarmError::Bind` if the port could not be bound.
    /// - `SwarmError::Spawn` if a worker thread could not be started.
    pub fn start(self, listen_port: u16) -> Result<SwarmHandle, SwarmError> {
        let listener = TcpListener::bind(("0.0.0.0", listen_port)).map_err(SwarmError::Bind)?;
        let port = listener.local_addr().map_err(SwarmError::Bind)?.port();
        listener.set_nonblocking(true).map_err(SwarmError::Bind)?;

        let inner = Arc::new(SwarmInner {
            torrent: self.torrent,
            store: self.store,
            config: self.config,
            peer_id: self.peer_id,
            registry: Arc::new(SessionRegistry::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            listen_port: port,
        });

        info!("Listening for incoming peers on port {}", port);

        let listener_inner = inner.clone();
        let listener_thread = thread::Builder::new()
            .name(format!("{} listener", inner.torrent.name()))
            .spawn(move || run_listener(listener, listener_inner))
            .map_err(SwarmError::Spawn)?;

        let announcer_inner = inner.clone();
        let announcer_thread = thread::Builder::new()
            .name(format!("{} announcer", inner.torrent.name()))
            .spawn(move || run_announcer(announcer_inner))
            .map_err(SwarmError::Spawn)?;

        Ok(SwarmHandle {
            inner,
            listener: Some(listener_thread),
            announcer: Some(announcer_thread),
        })
    }
}

impl SwarmHandle {
    pub fn port(&self) -> u16 {
        self.inner.listen_port
    }

    pub fn is_complete(&self) -> bool {
        self.inner.store.is_complete()
    }

    pub fn live_sessions(&self) -> usize {
        self.inner.registry.live_sessions()
    }

    /// Dials a peer endpoint directly, through the same self and duplicate
    /// filters the announcer uses.
    pub fn connect(&self, ip: &str, port: u16) {
        self.inner.dial(ip, port);
    }

    /// Graceful stop: fire every session's signal, join all workers, then
    /// tell the tracker we left (best effort).
    pub fn shutdown(mut self) {
        info!("Initiating graceful shutdown...");
        self.inner.shutdown.store(true, Ordering::Relaxed);
        self.inner.registry.shutdown_all();
        if let Some(worker) = self.listener.take() {
            let _ = worker.join();
        }
        if let Some(worker) = self.announcer.take() {
            let _ = worker.join();
        }
        self.inner.announce_stopped();
        info!("Client stopped.");
    }

    /// Parks the caller on the listener thread; used when there is no
    /// interactive way to stop the peer.
    pub fn wait(mut self) {
        if let Some(worker) = self.listener.take() {
            let _ = worker.join();
        }
    }
}

impl SwarmInner {
    fn spawn_session(self: &Arc<Self>, stream: TcpStream, ip: String, port: u16) {
        // Accepted sockets must poll on their own read timeout, not the
        // listener's nonblocking mode.
        if let Err(err) = stream.set_nonblocking(false) {
            warn!("Could not configure peer socket: {}", err);
            return;
        }

        let peer_name = format!("{}:{}", ip, port);
        let slot = self.registry.register(ip, port);
        let token = slot.token;
        let finished = slot.finished;

        let mut session = PeerSession::new(
            stream,
            peer_name.clone(),
            self.torrent.clone(),
            self.store.clone(),
            self.registry.clone(),
            token,
            self.config.clone(),
            self.peer_id,
            slot.shutdown,
            slot.have_inbox,
        );

        let spawned = thread::Builder::new()
            .name(format!("{} peer {}", self.torrent.name(), peer_name))
            .spawn(move || {
                match session.run() {
                    Ok(()) | Err(PeerSessionError::Interrupted) => (),
                    Err(err) => warn!("Session with {} ended: {:?}", peer_name, err),
                }
                finished.store(true, Ordering::Relaxed);
            });

        match spawned {
            Ok(worker) => self.registry.attach_worker(token, worker),
            Err(err) => {
                error!("Could not spawn session thread: {}", err);
                self.registry.deregister(token);
            }
        }
    }

    fn dial(self: &Arc<Self>, ip: &str, port: u16) {
        if self.shutdown.load(Ordering::Relaxed) {
            return;
        }
        if self.is_self(ip, port) {
            return;
        }
        if self.registry.is_connected(ip, port) {
            return;
        }

        let address = match (ip, port).to_socket_addrs().ok().and_then(|mut addrs| addrs.next()) {
            Some(address) => address,
            None => {
                debug!("Unresolvable peer endpoint {}:{}", ip, port);
                return;
            }
        };

        match TcpStream::connect_timeout(&address, self.config.dial_timeout()) {
            Ok(stream) => {
                info!("Connected to peer {}:{}", ip, port);
                self.spawn_session(stream, ip.to_string(), port);
            }
            Err(err) => debug!("Could not connect to {}:{}: {}", ip, port, err),
        }
    }

    /// Loopback traffic to our own listen port is ourselves. A self-dial
    /// through a non-local address is caught later by the peer-id check in
    /// the handshake.
    fn is_self(&self, ip: &str, port: u16) -> bool {
        if port != self.listen_port {
            return false;
        }
        match ip.parse::<IpAddr>() {
            Ok(address) => address.is_loopback(),
            Err(_) => ip == "localhost",
        }
    }

    fn progress(&self) -> Progress {
        let downloaded =
            self.store.downloaded_pieces() as u64 * self.torrent.piece_length() as u64;
        Progress {
            downloaded,
            left: self.torrent.length().saturating_sub(downloaded),
        }
    }

    fn announce_and_dial(self: &Arc<Self>, client: &AnnounceClient, event: Option<Event>) {
        match client.announce(self.progress(), event) {
            Ok(response) => {
                for peer in response.peers {
                    self.dial(&peer.ip, peer.port);
                }
            }
            Err(err) => warn!("Tracker announce failed: {:?}", err),
        }
    }

    fn announce_stopped(&self) {
        let client = match AnnounceClient::new(
            &self.torrent.announce_url,
            self.torrent.info_hash,
            self.peer_id,
            self.listen_port,
        ) {
            Ok(client) => client,
            Err(_) => return,
        };
        if let Err(err) = client.announce(self.progress(), Some(Event::Stopped)) {
            debug!("Final stopped announce failed: {:?}", err);
        }
    }
}

fn run_listener(listener: TcpListener, inner: Arc<SwarmInner>) {
    loop {
        if inner.shutdown.load(Ordering::Relaxed) {
            return;
        }
        match listener.accept() {
            Ok((stream, address)) => {
                info!("Accepted connection from {}", address);
                inner.spawn_session(stream, address.ip().to_string(), address.port());
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                if !inner.shutdown.load(Ordering::Relaxed) {
                    warn!("Listener error: {}", err);
                }
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

fn run_announcer(inner: Arc<SwarmInner>) {
    let client = match AnnounceClient::new(
        &inner.torrent.announce_url,
        inner.torrent.info_hash,
        inner.peer_id,
        inner.listen_port,
    ) {
        Ok(client) => client,
        Err(err) => {
            warn!("Announces disabled, bad tracker URL: {:?}", err);
            return;
        }
    };

    let mut completed_announced = inner.store.is_complete();
    let first_event = if completed_announced {
        Event::Completed
    } else {
        Event::Started
    };
    inner.announce_and_dial(&client, Some(first_event));

    loop {
        if sleep_with_shutdown(&inner.shutdown, inner.config.announce_interval()) {
            return;
        }
        inner.registry.reap();

        if inner.store.is_complete() && !completed_announced {
            completed_announced = true;
            info!("--- DOWNLOAD COMPLETE ---");
            inner.announce_and_dial(&client, Some(Event::Completed));
        } else {
            inner.announce_and_dial(&client, None);
        }
    }
}

/// Sleeps `total` in short slices, returning true as soon as the shutdown
/// flag is observed.
fn sleep_with_shutdown(flag: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if flag.load(Ordering::Relaxed) {
            return true;
        }
        let slice = remaining.min(SHUTDOWN_POLL);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
    flag.load(Ordering::Relaxed)
}
