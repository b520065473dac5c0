use std::env;
use std::path::PathBuf;
use std::process::exit;

use tracing::error;

use metainfo::parser::TorrentParser;
use stracker::tracker::{Tracker, TRACKER_PORT};

fn main() {
    // install global collector configured based on RUST_LOG env var.
    tracing_subscriber::fmt::init();

    let mut args = env::args();
    if args.len() != 2 {
        error!("Usage: stracker <torrent_file>");
        exit(1);
    }
    let torrent_file = PathBuf::from(args.nth(1).unwrap_or_default());

    let torrent = match TorrentParser::parse(&torrent_file) {
        Ok(torrent) => torrent,
        Err(err) => {
            error!("Could not load {:?}: {:?}", torrent_file, err);
            exit(1);
        }
    };

    let tracker = match Tracker::init(&torrent, TRACKER_PORT) {
        Ok(tracker) => tracker,
        Err(err) => {
            error!("Could not start tracker: {:?}", err);
            exit(1);
        }
    };

    if let Err(err) = tracker.run() {
        error!("Tracker stopped with an error: {}", err);
        exit(1);
    }
}
