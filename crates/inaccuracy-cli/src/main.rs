//! CLI for the azimuth inaccuracy analysis engine.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "inaccuracy")]
#[command(about = "Azimuth measurement-error extraction and correlation analysis")]
#[command(version = inaccuracy_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute errors for new records and append them to the ledger
    Calculate {
        /// JSON file of ingested measurement records
        #[arg(long, default_value = "records.json")]
        records: String,

        /// Path of the error ledger file
        #[arg(long, default_value = "inaccuracytest.txt")]
        ledger: String,
    },

    /// Print the per-year normalized error series
    Series {
        /// Path of the error ledger file
        #[arg(long, default_value = "inaccuracytest.txt")]
        ledger: String,
    },

    /// Correlate normalized errors against environmental covariates
    Correlate {
        /// JSON file of ingested measurement records
        #[arg(long, default_value = "records.json")]
        records: String,

        /// Path of the error ledger file
        #[arg(long, default_value = "inaccuracytest.txt")]
        ledger: String,
    },

    /// Print the condition-by-covariate correlation matrix with root causes
    Matrix {
        /// JSON file of ingested measurement records
        #[arg(long, default_value = "records.json")]
        records: String,

        /// Path of the error ledger file
        #[arg(long, default_value = "inaccuracytest.txt")]
        ledger: String,

        /// Write the matrix as JSON instead of a table
        #[arg(long)]
        output: Option<String>,
    },

    /// Start the HTTP backend
    Serve {
        /// JSON file of ingested measurement records (may not exist yet)
        #[arg(long, default_value = "records.json")]
        records: String,

        /// Path of the error ledger file
        #[arg(long, default_value = "inaccuracytest.txt")]
        ledger: String,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value = "8000")]
        port: u16,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Calculate { records, ledger } => commands::calculate::run(&records, &ledger),
        Commands::Series { ledger } => commands::series::run(&ledger),
        Commands::Correlate { records, ledger } => commands::correlate::run(&records, &ledger),
        Commands::Matrix {
            records,
            ledger,
            output,
        } => commands::matrix::run(&records, &ledger, output.as_deref()),
        Commands::Serve {
            records,
            ledger,
            host,
            port,
        } => commands::serve::run(&records, &ledger, &host, port),
    }
}
