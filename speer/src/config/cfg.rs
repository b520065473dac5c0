use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::str::FromStr;
use std::time::Duration;

use super::constants;

/// Runtime settings of the peer.
///
/// Every field has a default matching the protocol constants, so the config
/// file is optional. The file format is one `{setting_name}={value}` pair
/// per line (without brackets).
///
/// - `download_directory`: where the shared file lives,
/// - `pipelining_size`: outstanding whole-piece requests kept per peer,
/// - `request_timeout`: how long before a pending request is re-queued,
/// - `keep_alive_interval`: silence on the wire before a keep-alive,
/// - `announce_interval`: pause between periodic tracker announces,
/// - `poll_timeout`: socket read poll, bounds how fast sessions notice
///   timers and shutdown,
/// - `dial_timeout`: outbound connection timeout,
/// - `handshake_timeout`: how long to wait for the remote's handshake.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub download_directory: String,
    pub pipelining_size: usize,
    pub request_timeout_seconds: u64,
    pub keep_alive_seconds: u64,
    pub announce_interval_seconds: u64,
    pub poll_timeout_millis: u64,
    pub dial_timeout_seconds: u64,
    pub handshake_timeout_seconds: u64,
}

impl Default for Cfg {
    fn default() -> Self {
        Self {
            download_directory: constants::DEFAULT_DOWNLOAD_DIRECTORY.to_string(),
            pipelining_size: constants::DEFAULT_PIPELINING_SIZE,
            request_timeout_seconds: constants::DEFAULT_REQUEST_TIMEOUT_SECONDS,
            keep_alive_seconds: constants::DEFAULT_KEEP_ALIVE_SECONDS,
            announce_interval_seconds: constants::DEFAULT_ANNOUNCE_INTERVAL_SECONDS,
            poll_timeout_millis: constants::DEFAULT_POLL_TIMEOUT_MILLIS,
            dial_timeout_seconds: constants::DEFAULT_DIAL_TIMEOUT_SECONDS,
            handshake_timeout_seconds: constants::DEFAULT_HANDSHAKE_TIMEOUT_SECONDS,
        }
    }
}

impl Cfg {
    /// Loads settings from the file at `path` over the defaults.
    ///
    /// It returns an `io::Error` if:
    /// - The path could not be opened or read.
    /// - A line is not a `NAME=value` pair.
    /// - A setting name is unknown.
    /// - A numeric value does not parse.
    pub fn from_file(path: &str) -> io::Result<Self> {
        let mut cfg = Self::default();

        let file = File::open(path)?;
        let reader = BufReader::new(file);

        for line in reader.lines() {
            let current_line = line?;
            if current_line.trim().is_empty() {
                continue;
            }
            let setting: Vec<&str> = current_line.split('=').collect();
            if setting.len() != 2 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Invalid config input: {}", current_line),
                ));
            }
            cfg.load_setting(setting[0], setting[1])?;
        }
        Ok(cfg)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_seconds)
    }

    pub fn announce_interval(&self) -> Duration {
        Duration::from_secs(self.announce_interval_seconds)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_millis)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_seconds)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_seconds)
    }

    fn load_setting(&mut self, name: &str, value: &str) -> io::Result<()> {
        match name {
            constants::DOWNLOAD_DIRECTORY => self.download_directory = String::from(value),
            constants::PIPELINING_SIZE => {
                self.pipelining_size = Self::parse_value(value, name)?;
            }
            constants::REQUEST_TIMEOUT_SECONDS => {
                self.request_timeout_seconds = Self::parse_value(value, name)?;
            }
            constants::KEEP_ALIVE_SECONDS => {
                self.keep_alive_seconds = Self::parse_value(value, name)?;
            }
            constants::ANNOUNCE_INTERVAL_SECONDS => {
                self.announce_interval_seconds = Self::parse_value(value, name)?;
            }
            constants::POLL_TIMEOUT_MILLIS => {
                self.poll_timeout_millis = Self::parse_value(value, name)?;
            }
            constants::DIAL_TIMEOUT_SECONDS => {
                self.dial_timeout_seconds = Self::parse_value(value, name)?;
            }
            constants::HANDSHAKE_TIMEOUT_SECONDS => {
                self.handshake_timeout_seconds = Self::parse_value(value, name)?;
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Invalid config setting name: {}", name),
                ))
            }
        }
        Ok(())
    }

    fn parse_value<F>(value: &str, setting: &str) -> io::Result<F>
    where
        F: FromStr,
    {
        value.parse::<F>().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid setting: {}, is not a valid type: {}", setting, value),
            )
        })
    }
}
