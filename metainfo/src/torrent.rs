use std::collections::BTreeMap;
use std::fmt::Write;

use sha1::{Digest, Sha1};

use bencoder::bencode::{Bencode, ToBencode};

use super::info::{FromInfoError, Info, PIECE_HASH_LEN};

/// A parsed metafile: announce URL, `info` dictionary and the SHA-1 of the
/// canonical bencoding of `info`, which identifies the torrent everywhere
/// (handshakes, tracker announces).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Torrent {
    pub announce_url: String,
    pub info: Info,
    pub info_hash: [u8; 20],
}

/// Posible `Torrent` decoding errors.
#[derive(Debug, PartialEq, Eq)]
pub enum FromTorrentError {
    MissingAnnounce,
    MissingInfo,
    FromInfoError(FromInfoError),
    NotADict,
}

impl Torrent {
    pub fn from(bencode: Bencode) -> Result<Torrent, FromTorrentError> {
        let entries = match bencode {
            Bencode::Dict(entries) => entries,
            _ => return Err(FromTorrentError::NotADict),
        };

        let announce_url = match entries.get(b"announce".as_slice()) {
            Some(Bencode::Bytes(bytes)) => String::from_utf8(bytes.clone())
                .map_err(|_| FromTorrentError::MissingAnnounce)?,
            _ => return Err(FromTorrentError::MissingAnnounce),
        };
        let info = match entries.get(b"info".as_slice()) {
            Some(bencode) => Info::from(bencode).map_err(FromTorrentError::FromInfoError)?,
            None => return Err(FromTorrentError::MissingInfo),
        };

        let info_hash = Self::hash_info(&info);

        Ok(Torrent {
            announce_url,
            info,
            info_hash,
        })
    }

    /// SHA-1 over the canonical bencoding of the `info` dict.
    pub fn hash_info(info: &Info) -> [u8; 20] {
        let digest = Sha1::digest(info.to_bencode().encode());
        digest.into()
    }

    pub fn name(&self) -> String {
        self.info.name.clone()
    }

    pub fn length(&self) -> u64 {
        self.info.length
    }

    pub fn piece_length(&self) -> u32 {
        self.info.piece_length
    }

    pub fn total_pieces(&self) -> u32 {
        self.info.length.div_ceil(self.info.piece_length as u64) as u32
    }

    /// Length in bytes of the given piece. Every piece is `piece_length`
    /// long except possibly the last one.
    pub fn piece_len(&self, index: u32) -> u32 {
        let remainder = (self.info.length % self.info.piece_length as u64) as u32;
        if index + 1 == self.total_pieces() && remainder != 0 {
            remainder
        } else {
            self.info.piece_length
        }
    }

    /// The expected 20-byte hash of the given piece, `None` when the index
    /// is out of range.
    pub fn piece_hash(&self, index: u32) -> Option<&[u8]> {
        let start = index as usize * PIECE_HASH_LEN;
        let end = start + PIECE_HASH_LEN;
        if end > self.info.pieces.len() {
            return None;
        }
        Some(&self.info.pieces[start..end])
    }

    /// Hex rendering of the info hash, for logs.
    pub fn info_hash_hex(&self) -> String {
        let mut hex = String::with_capacity(self.info_hash.len() * 2);
        for byte in self.info_hash {
            // Writing to a String cannot fail.
            let _ = write!(&mut hex, "{:02x}", byte);
        }
        hex
    }
}

impl ToBencode for Torrent {
    fn to_bencode(&self) -> Bencode {
        let mut root = BTreeMap::new();
        root.insert(b"announce".to_vec(), self.announce_url.to_bencode());
        root.insert(b"info".to_vec(), self.info.to_bencode());
        Bencode::Dict(root)
    }
}
