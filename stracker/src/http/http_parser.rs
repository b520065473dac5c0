use std::{collections::HashMap, str::FromStr};

use super::http_method::HttpMethod;

/// A parsed request line: method, endpoint and query parameters.
///
/// Parameter values are kept exactly as they appear on the wire, still
/// percent-encoded; `info_hash` and `peer_id` carry raw bytes and must be
/// decoded by whoever consumes them.
#[derive(Debug)]
pub struct Http {
    pub method: HttpMethod,
    pub endpoint: String,
    pub params: HashMap<String, String>,
}

/// Posible request parsing errors.
#[derive(Debug, PartialEq, Eq)]
pub enum HttpError {
    ParseError,
    HttpMethodNotSupported,
}

impl Http {
    /// Parses the head of an HTTP request.
    pub fn parse(buffer: &[u8]) -> Result<Http, HttpError> {
        let mut lines = buffer.split(|&b| b == b'\r');
        let request_line = lines.next().ok_or(HttpError::ParseError)?;

        let mut parts = request_line.split(|&b| b == b' ');
        let method = HttpMethod::from_str(
            &String::from_utf8_lossy(parts.next().ok_or(HttpError::ParseError)?),
        )
        .map_err(|_| HttpError::HttpMethodNotSupported)?;

        let target = parts.next().ok_or(HttpError::ParseError)?;
        let mut target_parts = target.split(|&b| b == b'?');
        let endpoint =
            String::from_utf8_lossy(target_parts.next().ok_or(HttpError::ParseError)?).to_string();

        let params = match target_parts.next() {
            Some(query) => parse_params(query)?,
            None => HashMap::new(),
        };

        Ok(Http {
            method,
            endpoint,
            params,
        })
    }
}

fn parse_params(query: &[u8]) -> Result<HashMap<String, String>, HttpError> {
    let mut params = HashMap::new();
    for param in query.split(|&b| b == b'&') {
        let mut parts = param.split(|&b| b == b'=');
        let key = String::from_utf8_lossy(parts.next().ok_or(HttpError::ParseError)?).to_string();
        let value = String::from_utf8_lossy(parts.next().ok_or(HttpError::ParseError)?).to_string();
        params.insert(key, value);
    }
    Ok(params)
}
