use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha1::{Digest, Sha1};
use tracing::{info, warn};

use metainfo::torrent::Torrent;

use crate::peer::bitfield::Bitfield;

/// Owns the on-disk file and the completion bitmap.
///
/// Shared by every peer session and the coordinator. All operations take
/// the single internal mutex for the duration of their file I/O, which
/// keeps writes serialized and readers from ever observing a torn piece.
/// The lock is coarse on purpose: disk is not the bottleneck here.
#[derive(Debug)]
pub struct PieceStore {
    torrent: Torrent,
    path: PathBuf,
    inner: Mutex<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    file: fs::File,
    have: Vec<bool>,
    have_count: usize,
}

/// Posible piece store errors. A hash mismatch is not one of these: it is
/// an expected data-plane event reported through `WriteOutcome`.
#[derive(Debug)]
pub enum PieceStoreError {
    Io(std::io::Error),
    InvalidPieceIndex(u32),
}

/// What a `write_piece` call did.
///
/// Only `Stored` marks a completion event; a duplicate write is accepted
/// but must not trigger another `have` broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Stored,
    AlreadyStored,
    HashMismatch,
}

impl WriteOutcome {
    pub fn accepted(&self) -> bool {
        !matches!(self, WriteOutcome::HashMismatch)
    }
}

impl PieceStore {
    /// Opens (or creates) the backing file under `download_dir`.
    ///
    /// When a file of the right size already exists every piece is read
    /// back and hash-checked, so completion state survives restarts;
    /// corrupt pieces are reported and left to be fetched again. Otherwise
    /// the file is created as `total_length` zero bytes.
    ///
    /// # Errors
    /// - `PieceStoreError::Io` if the file could not be created, sized or
    ///   verified.
    pub fn new(torrent: Torrent, download_dir: &Path) -> Result<Self, PieceStoreError> {
        if !download_dir.exists() {
            fs::create_dir_all(download_dir).map_err(PieceStoreError::Io)?;
        }
        let path = download_dir.join(torrent.name());
        let total_pieces = torrent.total_pieces() as usize;

        let existing_size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let resume = path.exists() && existing_size == torrent.length();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(PieceStoreError::Io)?;

        let mut have = vec![false; total_pieces];
        let mut have_count = 0;

        if resume {
            for index in 0..torrent.total_pieces() {
                let piece = read_piece_at(&mut file, &torrent, index).map_err(PieceStoreError::Io)?;
                if Sha1::digest(&piece).as_slice() == torrent.piece_hash(index).unwrap_or(&[]) {
                    have[index as usize] = true;
                    have_count += 1;
                } else {
                    warn!("Piece #{} on disk failed verification, will re-download", index);
                }
            }
            info!(
                "Verified existing file {:?}: {}/{} pieces present",
                path, have_count, total_pieces
            );
        } else {
            // Truncate before sizing so a wrong-sized leftover cannot leak
            // stale bytes into unverified regions.
            file.set_len(0).map_err(PieceStoreError::Io)?;
            file.set_len(torrent.length()).map_err(PieceStoreError::Io)?;
            info!("Pre-allocated {:?} ({} bytes)", path, torrent.length());
        }

        Ok(Self {
            torrent,
            path,
            inner: Mutex::new(StoreInner {
                file,
                have,
                have_count,
            }),
        })
    }

    /// Hash-checks `bytes` against the expected piece hash and persists the
    /// piece when it matches.
    ///
    /// A mismatch leaves disk and bitmap untouched; writing a piece we
    /// already have is a no-op reported as `AlreadyStored`.
    ///
    /// # Errors
    /// - `PieceStoreError::InvalidPieceIndex` for an out-of-range index.
    /// - `PieceStoreError::Io` if the write itself failed.
    pub fn write_piece(&self, index: u32, bytes: &[u8]) -> Result<WriteOutcome, PieceStoreError> {
        let expected = self
            .torrent
            .piece_hash(index)
            .ok_or(PieceStoreError::InvalidPieceIndex(index))?;
        if Sha1::digest(bytes).as_slice() != expected
            || bytes.len() != self.torrent.piece_len(index) as usize
        {
            return Ok(WriteOutcome::HashMismatch);
        }

        let mut inner = self.lock();
        if inner.have[index as usize] {
            return Ok(WriteOutcome::AlreadyStored);
        }

        let offset = index as u64 * self.torrent.piece_length() as u64;
        inner
            .file
            .seek(SeekFrom::Start(offset))
            .map_err(PieceStoreError::Io)?;
        inner.file.write_all(bytes).map_err(PieceStoreError::Io)?;

        inner.have[index as usize] = true;
        inner.have_count += 1;
        info!(
            "Stored piece #{} | progress: {}/{}",
            index,
            inner.have_count,
            inner.have.len()
        );
        Ok(WriteOutcome::Stored)
    }

    /// Reads a piece back, or `None` when it is not (yet) present.
    ///
    /// # Errors
    /// - `PieceStoreError::InvalidPieceIndex` for an out-of-range index.
    /// - `PieceStoreError::Io` if the read failed.
    pub fn read_piece(&self, index: u32) -> Result<Option<Vec<u8>>, PieceStoreError> {
        if index >= self.torrent.total_pieces() {
            return Err(PieceStoreError::InvalidPieceIndex(index));
        }
        let mut inner = self.lock();
        if !inner.have[index as usize] {
            return Ok(None);
        }
        let piece = read_piece_at(&mut inner.file, &self.torrent, index).map_err(PieceStoreError::Io)?;
        Ok(Some(piece))
    }

    /// A consistent copy of the completion bitmap.
    pub fn snapshot_have(&self) -> Vec<bool> {
        self.lock().have.clone()
    }

    /// The completion bitmap in wire form.
    pub fn bitfield(&self) -> Bitfield {
        Bitfield::from_flags(&self.lock().have)
    }

    pub fn is_complete(&self) -> bool {
        let inner = self.lock();
        inner.have_count == inner.have.len()
    }

    pub fn downloaded_pieces(&self) -> usize {
        self.lock().have_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // A poisoned store mutex means a writer panicked mid-operation;
        // the bitmap only flips after a completed write, so continuing
        // with the inner state is sound.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn read_piece_at(
    file: &mut fs::File,
    torrent: &Torrent,
    index: u32,
) -> Result<Vec<u8>, std::io::Error> {
    let offset = index as u64 * torrent.piece_length() as u64;
    let mut buffer = vec![0u8; torrent.piece_len(index) as usize];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use metainfo::info::Info;

    use super::*;

    #[test]
    fn test_fresh_store_preallocates_zeroed_file() {
        let dir = test_dir("fresh_store");
        let store = PieceStore::new(test_torrent(), &dir).unwrap();

        let metadata = fs::metadata(store.path()).unwrap();
        assert_eq!(metadata.len(), 10);
        assert!(!store.is_complete());
        assert_eq!(store.snapshot_have(), vec![false, false, false]);

        cleanup(&dir);
    }

    #[test]
    fn test_write_piece_accepts_matching_hash() {
        let dir = test_dir("write_accepts");
        let store = PieceStore::new(test_torrent(), &dir).unwrap();

        assert_eq!(store.write_piece(0, b"AAAA").unwrap(), WriteOutcome::Stored);
        assert_eq!(store.read_piece(0).unwrap().unwrap(), b"AAAA");
        assert_eq!(store.downloaded_pieces(), 1);

        cleanup(&dir);
    }

    #[test]
    fn test_write_piece_rejects_bad_hash_and_leaves_state_unchanged() {
        let dir = test_dir("write_rejects");
        let store = PieceStore::new(test_torrent(), &dir).unwrap();

        assert_eq!(
            store.write_piece(0, b"AAAX").unwrap(),
            WriteOutcome::HashMismatch
        );
        assert_eq!(store.snapshot_have(), vec![false, false, false]);
        assert!(store.read_piece(0).unwrap().is_none());
        let on_disk = fs::read(store.path()).unwrap();
        assert_eq!(on_disk, vec![0u8; 10]);

        cleanup(&dir);
    }

    #[test]
    fn test_write_piece_is_idempotent() {
        let dir = test_dir("write_idempotent");
        let store = PieceStore::new(test_torrent(), &dir).unwrap();

        assert_eq!(store.write_piece(1, b"BBBB").unwrap(), WriteOutcome::Stored);
        assert_eq!(
            store.write_piece(1, b"BBBB").unwrap(),
            WriteOutcome::AlreadyStored
        );
        assert_eq!(store.downloaded_pieces(), 1);

        cleanup(&dir);
    }

    #[test]
    fn test_write_piece_out_of_range() {
        let dir = test_dir("write_out_of_range");
        let store = PieceStore::new(test_torrent(), &dir).unwrap();

        assert!(matches!(
            store.write_piece(3, b"CC"),
            Err(PieceStoreError::InvalidPieceIndex(3))
        ));

        cleanup(&dir);
    }

    #[test]
    fn test_short_last_piece_completes_store() {
        let dir = test_dir("short_last_piece");
        let store = PieceStore::new(test_torrent(), &dir).unwrap();

        assert_eq!(store.write_piece(0, b"AAAA").unwrap(), WriteOutcome::Stored);
        assert_eq!(store.write_piece(1, b"BBBB").unwrap(), WriteOutcome::Stored);
        assert_eq!(store.write_piece(2, b"CC").unwrap(), WriteOutcome::Stored);

        assert!(store.is_complete());
        assert_eq!(fs::read(store.path()).unwrap(), b"AAAABBBBCC");

        cleanup(&dir);
    }

    #[test]
    fn test_restart_verifies_existing_file() {
        let dir = test_dir("restart_verifies");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("shared.bin"), b"AAAABBBBCC").unwrap();

        let store = PieceStore::new(test_torrent(), &dir).unwrap();

        assert!(store.is_complete());
        assert_eq!(store.snapshot_have(), vec![true, true, true]);

        cleanup(&dir);
    }

    #[test]
    fn test_restart_detects_corrupt_piece_and_keeps_verifying() {
        let dir = test_dir("restart_corrupt");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("shared.bin"), b"AAAABBXBCC").unwrap();

        let store = PieceStore::new(test_torrent(), &dir).unwrap();

        // Piece 1 is corrupt; pieces 0 and 2 still count.
        assert_eq!(store.snapshot_have(), vec![true, false, true]);
        assert!(!store.is_complete());

        cleanup(&dir);
    }

    #[test]
    fn test_wrong_sized_file_is_recreated() {
        let dir = test_dir("wrong_sized");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("shared.bin"), b"tooshort").unwrap();

        let store = PieceStore::new(test_torrent(), &dir).unwrap();

        assert_eq!(fs::read(store.path()).unwrap(), vec![0u8; 10]);
        assert!(!store.is_complete());

        cleanup(&dir);
    }

    // Auxiliary functions

    /// 10-byte file in 3 pieces: "AAAA", "BBBB", "CC".
    fn test_torrent() -> Torrent {
        let mut pieces = Vec::new();
        for piece in [b"AAAA".as_slice(), b"BBBB", b"CC"] {
            pieces.extend_from_slice(&Sha1::digest(piece));
        }
        let info = Info {
            length: 10,
            name: "shared.bin".to_string(),
            piece_length: 4,
            pieces,
        };
        let info_hash = Torrent::hash_info(&info);
        Torrent {
            announce_url: "http://127.0.0.1:8000/announce".to_string(),
            info,
            info_hash,
        }
    }

    fn test_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("speer_store_{}", tag))
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }
}
