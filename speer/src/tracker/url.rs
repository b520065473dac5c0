/// A decomposed announce URL: `http://{host}:{port}{path}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerUrl {
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// Posible announce URL errors.
#[derive(Debug, PartialEq, Eq)]
pub enum TrackerUrlError {
    UnsupportedScheme,
    MissingHost,
    InvalidPort,
}

impl TrackerUrl {
    /// Parses a plain-HTTP announce URL. Anything but `http://` is
    /// rejected; this system's tracker speaks no TLS.
    pub fn parse(url: &str) -> Result<TrackerUrl, TrackerUrlError> {
        let rest = url
            .strip_prefix("http://")
            .ok_or(TrackerUrlError::UnsupportedScheme)?;

        let (authority, path) = match rest.find('/') {
            Some(slash) => (&rest[..slash], &rest[slash..]),
            None => (rest, "/"),
        };

        let (host, port) = match authority.rfind(':') {
            Some(colon) => {
                let port = authority[colon + 1..]
                    .parse::<u16>()
                    .map_err(|_| TrackerUrlError::InvalidPort)?;
                (&authority[..colon], port)
            }
            None => (authority, 80),
        };
        if host.is_empty() {
            return Err(TrackerUrlError::MissingHost);
        }

        Ok(TrackerUrl {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }
}
