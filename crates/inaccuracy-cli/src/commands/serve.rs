use std::path::PathBuf;

use inaccuracy_core::Ledger;

pub fn run(records_path: &str, ledger_path: &str, host: &str, port: u16) {
    let store = super::load_store(records_path, true);
    let ledger = Ledger::new(ledger_path);

    let base = format!("http://{host}:{port}");
    println!("🔬 Inaccuracy Analysis Server v{}", inaccuracy_core::VERSION);
    println!("   {base}");
    println!("   {} records loaded from {records_path}", store.len());
    println!("   ledger: {ledger_path}");
    println!();
    println!("   Endpoints:");
    println!("     GET  /                         API index (try: curl {base})");
    println!("     GET  /health                   Health check");
    println!("     POST /records                  Ingest one measurement record");
    println!("     POST /inaccuracy/calculate     Append new errors to the ledger");
    println!("     GET  /inaccuracy/errors        Per-year normalized error series");
    println!("     GET  /inaccuracy/correlations  Covariate correlation statistics");
    println!("     GET  /inaccuracy/matrix        Correlation matrix with root causes");
    println!("     GET  /inaccuracy/download      Raw ledger file");
    println!();
    println!("   Examples:");
    println!("     curl -X POST {base}/inaccuracy/calculate");
    println!("     curl {base}/inaccuracy/errors");
    println!();

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(inaccuracy_server::run_server(
        store,
        ledger,
        Some(PathBuf::from(records_path)),
        host,
        port,
    ));
}
