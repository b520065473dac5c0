use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tracing::warn;

/// The coordinator's view of the live peer sessions.
///
/// Written by the listener and the dialer, read by the announcer for
/// reaping and by every session for `have` broadcasts. Each entry carries
/// the session's have inbox sender, its one-shot shutdown flag and, once
/// the worker is spawned, its join handle.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<u64, SessionHandle>>,
    next_token: AtomicU64,
}

#[derive(Debug)]
struct SessionHandle {
    peer_ip: String,
    peer_port: u16,
    have_tx: Sender<u32>,
    shutdown: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

/// Everything a freshly registered session thread needs from the registry.
pub struct SessionSlot {
    pub token: u64,
    pub have_inbox: Receiver<u32>,
    pub shutdown: Arc<AtomicBool>,
    pub finished: Arc<AtomicBool>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a token and an entry for a new session.
    pub fn register(&self, peer_ip: String, peer_port: u16) -> SessionSlot {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (have_tx, have_inbox) = channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        self.lock().insert(
            token,
            SessionHandle {
                peer_ip,
                peer_port,
                have_tx,
                shutdown: shutdown.clone(),
                finished: finished.clone(),
                worker: None,
            },
        );

        SessionSlot {
            token,
            have_inbox,
            shutdown,
            finished,
        }
    }

    /// Attaches the spawned worker thread to its entry.
    pub fn attach_worker(&self, token: u64, worker: JoinHandle<()>) {
        if let Some(handle) = self.lock().get_mut(&token) {
            handle.worker = Some(worker);
        }
    }

    /// Drops an entry whose worker could not be spawned.
    pub fn deregister(&self, token: u64) {
        self.lock().remove(&token);
    }

    /// Queues `have(index)` on every live session except the writer's own.
    /// Sessions flush their inbox on their own thread, so this never blocks
    /// on a socket.
    pub fn broadcast_have(&self, index: u32, except_token: u64) {
        for (token, handle) in self.lock().iter() {
            if *token == except_token || handle.finished.load(Ordering::Relaxed) {
                continue;
            }
            // A send error means the session just exited; reaping will
            // collect it.
            let _ = handle.have_tx.send(index);
        }
    }

    /// Whether a live session to this endpoint already exists.
    pub fn is_connected(&self, peer_ip: &str, peer_port: u16) -> bool {
        self.lock().values().any(|handle| {
            !handle.finished.load(Ordering::Relaxed)
                && handle.peer_ip == peer_ip
                && handle.peer_port == peer_port
        })
    }

    pub fn live_sessions(&self) -> usize {
        self.lock()
            .values()
            .filter(|handle| !handle.finished.load(Ordering::Relaxed))
            .count()
    }

    /// Joins and forgets sessions whose worker has terminated.
    pub fn reap(&self) {
        let mut sessions = self.lock();
        let done: Vec<u64> = sessions
            .iter()
            .filter(|(_, handle)| handle.finished.load(Ordering::Relaxed))
            .map(|(token, _)| *token)
            .collect();
        for token in done {
            if let Some(mut handle) = sessions.remove(&token) {
                if let Some(worker) = handle.worker.take() {
                    if worker.join().is_err() {
                        warn!(
                            "Session worker for {}:{} panicked",
                            handle.peer_ip, handle.peer_port
                        );
                    }
                }
            }
        }
    }

    /// Fires every session's shutdown signal, then joins the workers. Each
    /// worker observes the signal within one poll interval, so the joins
    /// are bounded.
    pub fn shutdown_all(&self) {
        let handles: Vec<SessionHandle> = {
            let mut sessions = self.lock();
            let tokens: Vec<u64> = sessions.keys().copied().collect();
            tokens
                .into_iter()
                .filter_map(|token| sessions.remove(&token))
                .collect()
        };

        for handle in &handles {
            handle.shutdown.store(true, Ordering::Relaxed);
        }
        for mut handle in handles {
            if let Some(worker) = handle.worker.take() {
                if worker.join().is_err() {
                    warn!(
                        "Session worker for {}:{} panicked during shutdown",
                        handle.peer_ip, handle.peer_port
                    );
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, SessionHandle>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
