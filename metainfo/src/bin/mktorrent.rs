use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use tracing::{error, info};

use metainfo::builder::{build_torrent, write_torrent_file, DEFAULT_PIECE_LENGTH};

#[derive(Parser, Debug)]
struct Args {
    /// File to share
    file: String,
    /// Announce URL of the tracker, e.g. http://127.0.0.1:8000/announce
    tracker_url: String,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let source = PathBuf::from(args.file.trim());
    let torrent = match build_torrent(&source, &args.tracker_url, DEFAULT_PIECE_LENGTH) {
        Ok(torrent) => torrent,
        Err(err) => {
            error!("Could not build metafile for {:?}: {:?}", source, err);
            exit(1);
        }
    };

    let mut dest = source.clone().into_os_string();
    dest.push(".torrent");
    let dest = PathBuf::from(dest);

    if let Err(err) = write_torrent_file(&torrent, &dest) {
        error!("Could not write {:?}: {:?}", dest, err);
        exit(1);
    }

    info!("Torrent file created: {}", dest.display());
    info!("File: {} ({} bytes, {} pieces)", torrent.name(), torrent.length(), torrent.total_pieces());
    info!("Tracker: {}", torrent.announce_url);
    info!("Info hash: {}", torrent.info_hash_hex());
}
