use std::{
    sync::{mpsc::Receiver, Arc, Mutex},
    thread,
};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub enum WorkerMessage {
    Job(Job),
    Terminate,
}

/// One pool thread, looping on the shared job channel until told to stop.
pub struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub fn new(id: usize, receiver: Arc<Mutex<Receiver<WorkerMessage>>>) -> Worker {
        let thread = thread::spawn(move || loop {
            let message = {
                let receiver = match receiver.lock() {
                    Ok(receiver) => receiver,
                    Err(poisoned) => poisoned.into_inner(),
                };
                receiver.recv()
            };
            match message {
                Ok(WorkerMessage::Job(job)) => job(),
                Ok(WorkerMessage::Terminate) | Err(_) => break,
            }
        });

        Worker {
            id,
            thread: Some(thread),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn take_thread(&mut self) -> Option<thread::JoinHandle<()>> {
        self.thread.take()
    }
}
