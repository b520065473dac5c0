use std::{
    fs::File,
    io::{BufReader, Read, Write},
    path::Path,
};

use sha1::{Digest, Sha1};

use bencoder::bencode::ToBencode;

use super::{info::Info, torrent::Torrent};

/// Piece size used when creating metafiles, 256 KiB.
pub const DEFAULT_PIECE_LENGTH: u32 = 262_144;

/// Posible metafile creation errors.
#[derive(Debug)]
pub enum BuildError {
    IoError(std::io::Error),
    NotAFile,
}

/// Hashes `source` piece by piece and builds the metafile for it.
///
/// # Errors
///
/// - `BuildError::NotAFile` - the source path is missing or is a directory
/// - `BuildError::IoError` - the source could not be read
pub fn build_torrent(
    source: &Path,
    announce_url: &str,
    piece_length: u32,
) -> Result<Torrent, BuildError> {
    if !source.is_file() {
        return Err(BuildError::NotAFile);
    }
    let name = source
        .file_name()
        .ok_or(BuildError::NotAFile)?
        .to_string_lossy()
        .into_owned();

    let file = File::open(source).map_err(BuildError::IoError)?;
    let length = file.metadata().map_err(BuildError::IoError)?.len();
    let pieces = hash_pieces(file, piece_length).map_err(BuildError::IoError)?;

    let info = Info {
        length,
        name,
        piece_length,
        pieces,
    };
    let info_hash = Torrent::hash_info(&info);

    Ok(Torrent {
        announce_url: announce_url.to_string(),
        info,
        info_hash,
    })
}

/// Writes the bencoded metafile to `dest`.
pub fn write_torrent_file(torrent: &Torrent, dest: &Path) -> Result<(), std::io::Error> {
    let mut file = File::create(dest)?;
    file.write_all(&torrent.to_bencode().encode())
}

fn hash_pieces(file: File, piece_length: u32) -> Result<Vec<u8>, std::io::Error> {
    let mut reader = BufReader::new(file);
    let mut pieces = Vec::new();
    let mut buffer = vec![0u8; piece_length as usize];

    loop {
        let mut filled = 0;
        // A piece may arrive in several short reads.
        while filled < buffer.len() {
            let read = reader.read(&mut buffer[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled == 0 {
            break;
        }
        pieces.extend_from_slice(&Sha1::digest(&buffer[..filled]));
    }

    Ok(pieces)
}
