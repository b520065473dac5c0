pub mod announce;
pub mod http;
pub mod http_server;
pub mod monitor;
pub mod swarm;
pub mod tracker;
pub mod tracker_peer;
pub mod tracker_status;
