use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use speer::config::cfg::Cfg;
use speer::peer_id::PeerId;
use speer::piece_store::store::PieceStore;
use speer::swarm::coordinator::Swarm;

use metainfo::parser::TorrentParser;

#[derive(Parser, Debug)]
struct Args {
    /// Path to the .torrent metafile
    torrent_file: String,
    /// TCP port to listen on for peers
    #[arg(default_value_t = 6881)]
    port: u16,
    /// Optional config file with KEY=VALUE lines
    #[arg(short, long)]
    config: Option<String>,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let torrent_path = PathBuf::from(args.torrent_file.trim());
    let torrent = match TorrentParser::parse(&torrent_path) {
        Ok(torrent) => torrent,
        Err(err) => {
            error!("Could not load {:?}: {:?}", torrent_path, err);
            exit(1);
        }
    };
    info!(
        "Loaded torrent {} ({} bytes, {} pieces, info hash {})",
        torrent.name(),
        torrent.length(),
        torrent.total_pieces(),
        torrent.info_hash_hex()
    );

    let config = match &args.config {
        Some(path) => match Cfg::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                error!("Could not load config {}: {}", path, err);
                exit(1);
            }
        },
        None => Cfg::default(),
    };

    let store = match PieceStore::new(torrent.clone(), Path::new(&config.download_directory)) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!("Could not open piece store: {:?}", err);
            exit(1);
        }
    };
    if store.is_complete() {
        info!("File found and verified, starting as seeder.");
    } else {
        info!("File not found or incomplete, starting as leecher.");
    }

    let peer_id = PeerId::generate();
    info!("Peer id: {}", peer_id);

    let swarm = Swarm::new(torrent, store, config, peer_id);
    let handle = match swarm.start(args.port) {
        Ok(handle) => handle,
        Err(err) => {
            error!("Could not start swarm: {:?}", err);
            exit(1);
        }
    };

    // A line on stdin stops the peer gracefully; with stdin closed (e.g.
    // running detached) it serves until the process is killed.
    info!("Press Enter to stop.");
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => handle.wait(),
        Ok(_) => handle.shutdown(),
    }
}
