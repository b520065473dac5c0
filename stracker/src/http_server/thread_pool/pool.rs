use std::sync::{
    mpsc::{self, channel, Sender},
    Arc, Mutex,
};

use tracing::{debug, error};

use crate::http_server::thread_pool::worker::{Worker, WorkerMessage};

/// Posible thread pool errors.
pub enum ThreadPoolError {
    SendError(mpsc::SendError<WorkerMessage>),
}

/// A fixed set of worker threads fed through a channel, so request
/// handling never blocks the accept loop.
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Sender<WorkerMessage>,
}

impl ThreadPool {
    /// Creates a pool of `size` workers. Panics when `size` is zero.
    pub fn new(size: usize) -> ThreadPool {
        assert!(size > 0);

        let (sender, receiver) = channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::new(id, Arc::clone(&receiver)));
        }

        ThreadPool { workers, sender }
    }

    /// Hands a job to whichever worker becomes free first.
    pub fn execute<F>(&self, job: F) -> Result<(), ThreadPoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(WorkerMessage::Job(Box::new(job)))
            .map_err(ThreadPoolError::SendError)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            if self.sender.send(WorkerMessage::Terminate).is_err() {
                error!("Could not deliver terminate message to the pool");
            }
        }
        for worker in &mut self.workers {
            debug!("Shutting down worker {}", worker.id());
            if let Some(thread) = worker.take_thread() {
                if thread.join().is_err() {
                    error!("A pool worker panicked");
                }
            }
        }
    }
}
