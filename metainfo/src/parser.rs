use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use bencoder::bencode::{Bencode, BencodeError};

use super::torrent::{FromTorrentError, Torrent};

/// Posible metafile parsing errors.
#[derive(Debug)]
pub enum ParseError {
    IoError(std::io::Error),
    BencodeError(BencodeError),
    FromTorrentError(FromTorrentError),
}

pub struct TorrentParser;

impl TorrentParser {
    /// Reads and decodes a `.torrent` file.
    ///
    /// # Errors
    ///
    /// - `ParseError::IoError` - the file could not be read
    /// - `ParseError::BencodeError` - the file is not valid bencode
    /// - `ParseError::FromTorrentError` - required metafile fields are
    ///   missing or malformed
    pub fn parse(filepath: &Path) -> Result<Torrent, ParseError> {
        let buffer = Self::read_file(filepath).map_err(ParseError::IoError)?;
        let bencode = Bencode::decode(&buffer).map_err(ParseError::BencodeError)?;
        Torrent::from(bencode).map_err(ParseError::FromTorrentError)
    }

    fn read_file(filepath: &Path) -> Result<Vec<u8>, std::io::Error> {
        let file = File::open(filepath)?;
        let mut reader = BufReader::new(file);
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}
