pub mod config;
pub mod peer;
pub mod peer_id;
pub mod piece_store;
pub mod swarm;
pub mod tracker;
