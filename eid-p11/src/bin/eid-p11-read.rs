//! Reads the card in the first available slot and prints what it holds
//!
//! Usage: eid-p11-read [config.json]
//!
//! Walks the same transitions the viewer's state machine would for a card
//! insertion: find a slot, open a session, read the identity data (and the
//! certificates), then close the session. The cache is printed as JSON with
//! base64 values.

use std::env;
use std::path::PathBuf;
use std::process;

use log::{error, info};

use eid_p11::{
    Config, Event, LoadError, MemoryCache, NativeModule, PinOp, PinResult, SourceKind, Ui, Viewer,
    ViewerError,
};

/// Failure of one run of the reader
#[derive(Debug, thiserror::Error)]
enum ReadError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Viewer(#[from] ViewerError),
}

/// UI that only logs
struct LogUi;

impl Ui for LogUi {
    fn new_source(&mut self, kind: SourceKind) {
        info!("New source: {:?}", kind);
    }

    fn object_data(&mut self, label: &str, value: &[u8]) {
        info!("{}: {} bytes", label, value.len());
    }

    fn pin_result(&mut self, op: PinOp, result: PinResult) {
        info!("PIN {:?}: {:?}", op, result);
    }
}

fn read_card(config: &Config) -> Result<String, ReadError> {
    let module = NativeModule::load(&config.module_path)?;
    let mut viewer = Viewer::new(module, LogUi, MemoryCache::new());
    viewer.initialize()?;

    let slot = viewer.find_available_slot(config.want_token)?;
    info!("Using slot {}", slot);
    viewer.open_session(slot)?;

    let read = read_objects(&mut viewer, config.read_certificates);
    let json = viewer.cache().to_json().unwrap_or_else(|e| {
        error!("Failed to serialize cache: {}", e);
        String::new()
    });
    let closed = viewer.close_session();

    read?;
    closed?;
    Ok(json)
}

fn read_objects(
    viewer: &mut Viewer<NativeModule, LogUi, MemoryCache>,
    certificates: bool,
) -> Result<(), ViewerError> {
    let count = viewer.read_identity_objects()?;
    viewer.finalize_find()?;
    info!("Read {} identity objects", count);

    if certificates {
        let count = viewer.read_certificate_objects()?;
        viewer.finalize_find()?;
        info!("Read {} certificates", count);
    }

    for event in viewer.events().drain() {
        match event {
            Event::ReadReady => info!("Read ready"),
        }
    }
    Ok(())
}

fn main() {
    let config = Config::load(env::args().nth(1).map(PathBuf::from).as_deref());

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_filter.as_str()),
    )
    .init();

    match read_card(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("eid-p11-read: {}", e);
            process::exit(1);
        }
    }
}
