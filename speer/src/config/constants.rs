// Setting names accepted in the config file.
pub const DOWNLOAD_DIRECTORY: &str = "DOWNLOAD_DIRECTORY";
pub const PIPELINING_SIZE: &str = "PIPELINING_SIZE";
pub const REQUEST_TIMEOUT_SECONDS: &str = "REQUEST_TIMEOUT_SECONDS";
pub const KEEP_ALIVE_SECONDS: &str = "KEEP_ALIVE_SECONDS";
pub const ANNOUNCE_INTERVAL_SECONDS: &str = "ANNOUNCE_INTERVAL_SECONDS";
pub const POLL_TIMEOUT_MILLIS: &str = "POLL_TIMEOUT_MILLIS";
pub const DIAL_TIMEOUT_SECONDS: &str = "DIAL_TIMEOUT_SECONDS";
pub const HANDSHAKE_TIMEOUT_SECONDS: &str = "HANDSHAKE_TIMEOUT_SECONDS";

pub const DEFAULT_DOWNLOAD_DIRECTORY: &str = ".";
pub const DEFAULT_PIPELINING_SIZE: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 20;
pub const DEFAULT_KEEP_ALIVE_SECONDS: u64 = 60;
pub const DEFAULT_ANNOUNCE_INTERVAL_SECONDS: u64 = 10;
pub const DEFAULT_POLL_TIMEOUT_MILLIS: u64 = 1000;
pub const DEFAULT_DIAL_TIMEOUT_SECONDS: u64 = 2;
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECONDS: u64 = 10;
