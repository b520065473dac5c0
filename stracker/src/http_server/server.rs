use std::{net::TcpListener, sync::Arc};

use tracing::{error, info};

use crate::http_server::request_handler::RequestHandler;
use crate::http_server::thread_pool::pool::ThreadPool;
use crate::tracker_status::status::TrackerStatus;

const POOL_SIZE: usize = 16;

/// The HTTP front of the tracker: accepts connections and hands each one
/// to the pool.
pub struct Server {
    listener: TcpListener,
    pool: ThreadPool,
    status: Arc<TrackerStatus>,
    port: u16,
}

impl Server {
    /// Binds the listener; port 0 picks a free one.
    pub fn init(status: Arc<TrackerStatus>, port: u16) -> std::io::Result<Server> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", port))?;
        let port = listener.local_addr()?.port();
        Ok(Server {
            listener,
            pool: ThreadPool::new(POOL_SIZE),
            status,
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves until the listener fails.
    pub fn serve(&self) -> std::io::Result<()> {
        info!("Serving on http://0.0.0.0:{}", self.port);

        for stream in self.listener.incoming() {
            let stream = stream?;
            let mut handler = RequestHandler::new(stream);
            let status = self.status.clone();
            let _ = self.pool.execute(move || {
                if let Err(err) = handler.handle(status) {
                    error!("Could not handle a request: {:?}", err);
                }
            });
        }
        Ok(())
    }
}
