use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use gosift_extract::{extract_dir, DriverError, ExtractResult};

#[derive(Parser)]
#[command(
    name = "gosift",
    about = "Whole-program symbol extraction and typing-contract generation"
)]
struct Cli {
    /// Directory searched for package sources (repeatable)
    #[arg(short = 'r', long = "root", global = true)]
    roots: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract a package tree and print the per-package symbol tables as JSON
    Symbols {
        /// Package entry point, e.g. example.com/demo
        package: String,
    },
    /// Extract a package tree and print the contract stream
    Contracts {
        /// Package entry point
        package: String,
    },
    /// Extract a package tree and print the recorded type allocations
    Allocs {
        /// Package entry point
        package: String,
    },
}

fn extract(package: &str, roots: &[PathBuf]) -> Result<ExtractResult, DriverError> {
    let roots = if roots.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        roots.to_vec()
    };
    extract_dir(package, roots)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match &cli.command {
        Command::Symbols { package } => extract(package, &cli.roots).map(|result| {
            match serde_json::to_string_pretty(&result.global) {
                Ok(json) => println!("{}", json),
                Err(err) => eprintln!("error: {}", err),
            }
        }),
        Command::Contracts { package } => extract(package, &cli.roots).map(|result| {
            for pkg in &result.packages {
                println!("package {}", pkg.path);
                for contract in pkg.contracts.iter() {
                    println!("\t{}", contract);
                }
            }
        }),
        Command::Allocs { package } => extract(package, &cli.roots).map(|result| {
            for pkg in &result.packages {
                println!("package {}", pkg.path);
                for symbol in pkg.allocated.symbols() {
                    println!("\t{}.{}\t{}", symbol.package, symbol.name, symbol.pos);
                }
            }
        }),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
