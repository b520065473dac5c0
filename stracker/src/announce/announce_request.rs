use std::collections::HashMap;
use std::str::FromStr;

use url_encoder::url_encoder::decode;

use crate::tracker_peer::event::AnnounceEvent;

/// Validated parameters of one announce request.
#[derive(Debug, Clone)]
pub struct AnnounceRequest {
    pub info_hash: [u8; 20],
    pub peer_id: String,
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
    pub event: Option<AnnounceEvent>,
}

/// Posible announce request errors; each one answers as a 400.
#[derive(Debug, PartialEq, Eq)]
pub enum AnnounceRequestError {
    MissingInfoHash,
    InvalidInfoHash,
    MissingPeerId,
    InvalidPeerId,
    MissingPort,
    InvalidPort,
    InvalidNumber(&'static str),
}

impl AnnounceRequest {
    /// Builds a request from still-percent-encoded query parameters.
    ///
    /// `uploaded`/`downloaded`/`left` default to zero when absent; an
    /// unknown `event` string is treated as a periodic announce.
    pub fn from_params(
        params: &HashMap<String, String>,
    ) -> Result<AnnounceRequest, AnnounceRequestError> {
        let info_hash_bytes = decode(
            params
                .get("info_hash")
                .ok_or(AnnounceRequestError::MissingInfoHash)?,
        )
        .map_err(|_| AnnounceRequestError::InvalidInfoHash)?;
        let info_hash: [u8; 20] = info_hash_bytes
            .try_into()
            .map_err(|_| AnnounceRequestError::InvalidInfoHash)?;

        let peer_id_bytes = decode(
            params
                .get("peer_id")
                .ok_or(AnnounceRequestError::MissingPeerId)?,
        )
        .map_err(|_| AnnounceRequestError::InvalidPeerId)?;
        if peer_id_bytes.is_empty() {
            return Err(AnnounceRequestError::MissingPeerId);
        }
        let peer_id = String::from_utf8_lossy(&peer_id_bytes).into_owned();

        let port = params
            .get("port")
            .ok_or(AnnounceRequestError::MissingPort)?
            .parse::<u16>()
            .map_err(|_| AnnounceRequestError::InvalidPort)?;

        let uploaded = parse_number(params, "uploaded")?;
        let downloaded = parse_number(params, "downloaded")?;
        let left = parse_number(params, "left")?;

        let event = params
            .get("event")
            .and_then(|value| AnnounceEvent::from_str(value).ok());

        Ok(AnnounceRequest {
            info_hash,
            peer_id,
            port,
            uploaded,
            downloaded,
            left,
            event,
        })
    }
}

fn parse_number(
    params: &HashMap<String, String>,
    name: &'static str,
) -> Result<u64, AnnounceRequestError> {
    match params.get(name) {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| AnnounceRequestError::InvalidNumber(name)),
        None => Ok(0),
    }
}
