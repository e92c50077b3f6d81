use inaccuracy_core::{Ledger, build_matrix};

pub fn run(records_path: &str, ledger_path: &str, output_path: Option<&str>) {
    let store = super::load_store(records_path, false);
    let ledger = Ledger::new(ledger_path);

    let matrix = match build_matrix(&ledger, &store) {
        Ok(matrix) => matrix,
        Err(err) => super::exit_engine_error(err),
    };

    if let Some(path) = output_path {
        let json = match serde_json::to_string_pretty(&matrix) {
            Ok(json) => json,
            Err(err) => {
                eprintln!("Error: cannot serialize matrix: {err}");
                std::process::exit(1);
            }
        };
        if let Err(err) = std::fs::write(path, json) {
            eprintln!("Error: cannot write {path}: {err}");
            std::process::exit(1);
        }
        println!("✅ Matrix written to {path}");
        return;
    }

    println!("🔬 Condition × covariate correlation matrix");
    println!("   (* marks a cell filled with its column fallback, not computed)");
    println!();
    print!("   {:<10}", "");
    for column in matrix.columns {
        print!(" {column:>16}");
    }
    println!();
    for row in &matrix.rows {
        print!("   {:<10}", row.condition.to_string());
        for cell in row.cells {
            let tag = if cell.computed { " " } else { "*" };
            print!(" {:>15}{tag}", format!("{:+.2}", cell.value));
        }
        println!();
    }

    println!();
    println!("   Possible root causes:");
    for (i, reason) in matrix.reasons.iter().enumerate() {
        println!("   {}. {}", i + 1, reason.title);
        println!("      {}", reason.description);
        for measure in &reason.measures {
            println!("      [{}] {}", measure.priority, measure.action);
        }
    }
}
