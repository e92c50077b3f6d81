use inaccuracy_core::{K_MAX, Ledger};

pub fn run(ledger_path: &str) {
    let ledger = Ledger::new(ledger_path);
    let series = match ledger.read_yearly_series() {
        Ok(series) => series,
        Err(err) => super::exit_engine_error(err),
    };

    println!("📊 Yearly normalized error series (errors / {K_MAX})");
    println!();
    println!(
        "   {:<8} {:<10} {:>6} {:>8} {:>8}",
        "Year", "Condition", "Count", "Mean", "Max"
    );
    for (year, data) in &series {
        for (label, values) in [
            ("nku", &data.nku),
            ("minus_50", &data.minus_50),
            ("plus_50", &data.plus_50),
        ] {
            if values.is_empty() {
                println!("   {year:<8} {label:<10} {:>6} {:>8} {:>8}", 0, "-", "-");
                continue;
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            println!(
                "   {year:<8} {label:<10} {:>6} {mean:>8.3} {max:>8.3}",
                values.len()
            );
        }
    }
}
