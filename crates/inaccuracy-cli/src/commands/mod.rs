pub mod calculate;
pub mod correlate;
pub mod matrix;
pub mod serve;
pub mod series;

use std::process;

use inaccuracy_core::{EngineError, MeasurementRecord, MemoryStore};

/// Load the measurement store from a JSON records file.
///
/// With `allow_missing`, an absent file yields an empty store (the server
/// starts before any ingest); every other failure is fatal.
pub fn load_store(path: &str, allow_missing: bool) -> MemoryStore {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<Vec<MeasurementRecord>>(&contents) {
            Ok(records) => MemoryStore::from_records(records),
            Err(err) => {
                eprintln!("Error: {path} is not a valid records file: {err}");
                process::exit(1);
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            MemoryStore::new()
        }
        Err(err) => {
            eprintln!("Error: cannot read {path}: {err}");
            process::exit(1);
        }
    }
}

/// Write the store back to the records file, keeping processed flags.
pub fn save_store(path: &str, store: &MemoryStore) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(&store.records()).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

/// Print an engine failure and exit. A not-found ledger gets a hint about
/// running `calculate` first.
pub fn exit_engine_error(err: EngineError) -> ! {
    eprintln!("Error: {err}");
    if err.is_not_found() {
        eprintln!("Hint: run `inaccuracy calculate` to build the ledger first");
    }
    process::exit(1);
}
