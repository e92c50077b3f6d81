use inaccuracy_core::{CorrelationStat, Ledger, compute_correlations};

pub fn run(records_path: &str, ledger_path: &str) {
    let store = super::load_store(records_path, false);
    let ledger = Ledger::new(ledger_path);

    let results = match compute_correlations(&ledger, &store) {
        Ok(results) => results,
        Err(err) => super::exit_engine_error(err),
    };

    println!("📈 Error correlations against covariates");
    for result in &results {
        println!();
        println!("   {} ({} data points)", result.condition, result.points);
        print_stat("year", &result.year);
        print_stat("humidity", &result.humidity);
        print_stat("vibration", &result.vibration);

        for (label, means) in [
            ("product type", &result.by_product_type),
            ("production unit", &result.by_production_unit),
        ] {
            if means.is_empty() {
                continue;
            }
            println!("     mean error by {label}:");
            for entry in means {
                println!(
                    "       {:<16} {:.3}  (n={})",
                    entry.category, entry.mean, entry.count
                );
            }
        }
    }
}

fn print_stat(covariate: &str, stat: &CorrelationStat) {
    match (stat.r, stat.t, stat.p_value) {
        (Some(r), Some(t), Some(p)) => {
            let marker = if stat.significant { " ⚠ significant" } else { "" };
            println!(
                "     {covariate:<12} r={r:+.3}  t={t:.2}  p={p:.4}  (n={}){marker}",
                stat.pairs
            );
        }
        _ => println!(
            "     {covariate:<12} unavailable ({} pairs, insufficient variation)",
            stat.pairs
        ),
    }
}
