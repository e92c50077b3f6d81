use inaccuracy_core::Ledger;

pub fn run(records_path: &str, ledger_path: &str) {
    let store = super::load_store(records_path, false);
    let ledger = Ledger::new(ledger_path);

    match ledger.write_new_errors(&store) {
        Ok(0) => println!("✅ No new data — {ledger_path} is up to date"),
        Ok(added) => {
            println!("✅ {added} new records added to {ledger_path}");
            // Persist the processed flags so the next run appends nothing.
            if let Err(err) = super::save_store(records_path, &store) {
                eprintln!("Error: cannot update {records_path}: {err}");
                std::process::exit(1);
            }
        }
        Err(err) => super::exit_engine_error(err),
    }
}
