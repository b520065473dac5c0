use std::collections::BTreeMap;

use bencoder::bencode::{Bencode, ToBencode};

/// The `info` dictionary of a metafile: the fields that identify the shared
/// file and its pieces. Single-file torrents only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Info {
    pub length: u64,
    pub name: String,
    pub piece_length: u32,
    /// Concatenated 20-byte SHA-1 hashes, one per piece.
    pub pieces: Vec<u8>,
}

/// Posible `Info` decoding errors.
#[derive(Debug, PartialEq, Eq)]
pub enum FromInfoError {
    MissingLength,
    MissingName,
    MissingPieceLength,
    MissingPieces,
    NotADict,
    MultipleFilesNotSupported,
    MalformedPieces,
    PieceCountMismatch,
}

pub const PIECE_HASH_LEN: usize = 20;

impl Info {
    /// Builds an `Info` from its bencoded dictionary.
    ///
    /// It returns a `FromInfoError` if:
    /// - A required field is missing or has the wrong type.
    /// - The metafile describes multiple files.
    /// - The `pieces` blob is not a whole number of 20-byte hashes, or the
    ///   hash count does not match the file length.
    pub fn from(bencode: &Bencode) -> Result<Info, FromInfoError> {
        let entries = match bencode {
            Bencode::Dict(entries) => entries,
            _ => return Err(FromInfoError::NotADict),
        };

        if entries.contains_key(b"files".as_slice()) {
            return Err(FromInfoError::MultipleFilesNotSupported);
        }

        let length = match entries.get(b"length".as_slice()) {
            Some(Bencode::Int(n)) if *n >= 0 => *n as u64,
            _ => return Err(FromInfoError::MissingLength),
        };
        let name = match entries.get(b"name".as_slice()) {
            Some(Bencode::Bytes(bytes)) => String::from_utf8(bytes.clone())
                .map_err(|_| FromInfoError::MissingName)?,
            _ => return Err(FromInfoError::MissingName),
        };
        let piece_length = match entries.get(b"piece length".as_slice()) {
            Some(Bencode::Int(n)) if *n > 0 => *n as u32,
            _ => return Err(FromInfoError::MissingPieceLength),
        };
        let pieces = match entries.get(b"pieces".as_slice()) {
            Some(Bencode::Bytes(bytes)) => bytes.clone(),
            _ => return Err(FromInfoError::MissingPieces),
        };

        if pieces.len() % PIECE_HASH_LEN != 0 {
            return Err(FromInfoError::MalformedPieces);
        }
        let expected = length.div_ceil(piece_length as u64) as usize;
        if pieces.len() / PIECE_HASH_LEN != expected {
            return Err(FromInfoError::PieceCountMismatch);
        }

        Ok(Info {
            length,
            name,
            piece_length,
            pieces,
        })
    }
}

impl ToBencode for Info {
    fn to_bencode(&self) -> Bencode {
        let mut info = BTreeMap::new();
        info.insert(b"length".to_vec(), self.length.to_bencode());
        info.insert(b"name".to_vec(), self.name.to_bencode());
        info.insert(b"piece length".to_vec(), self.piece_length.to_bencode());
        info.insert(b"pieces".to_vec(), self.pieces.to_bencode());
        Bencode::Dict(info)
    }
}
