//! codefacts binary — thin CLI shell over the [`codefacts_engine`] library.

use clap::{Parser, Subcommand};
use codefacts_engine::facts::{fact_to_json, Fact};
use codefacts_engine::{CancelToken, FileScopeLoader, ScanOptions, Scanner};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Workspace scanner emitting relational code facts for a deductive reasoner.
#[derive(Parser)]
#[command(name = "codefacts", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Ignore pattern (repeatable); merged with .codefacts.toml
    #[arg(long = "ignore", global = true, value_name = "PATTERN")]
    ignore: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full scan: emit every fact as JSON lines on stdout
    Scan {
        /// Workspace root
        root: PathBuf,
        /// Also run the deep (second-pass) pipeline
        #[arg(long)]
        deep: bool,
    },
    /// Incremental scan: emit the retract+assert delta
    Delta {
        /// Workspace root
        root: PathBuf,
    },
    /// Emit the scope fact set for one active file
    Scope {
        /// Workspace root
        root: PathBuf,
        /// Active file, relative to the root
        #[arg(long)]
        file: String,
    },
    /// Watch the workspace and emit deltas as files change
    Watch {
        /// Workspace root
        root: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = CancelToken::new();

    let exit = match run(cli, cancel) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    };
    std::process::exit(exit);
}

fn run(cli: Cli, cancel: CancelToken) -> Result<(), codefacts_engine::ScanError> {
    let options = ScanOptions { ignore_patterns: cli.ignore.clone(), ..Default::default() };

    match cli.command {
        Commands::Scan { root, deep } => {
            let scanner = Scanner::new(&root, options)?;
            let result = scanner.scan_full(&cancel)?;
            print_facts(&result.facts);
            if deep {
                let deep_result = scanner.scan_deep(&cancel)?;
                print_facts(&deep_result.facts);
            }
            Ok(())
        }
        Commands::Delta { root } => {
            let scanner = Scanner::new(&root, options)?;
            let result = scanner.scan_incremental(&cancel)?;
            let summary = serde_json::json!({
                "full": result.full,
                "unchanged": result.unchanged,
                "changed_files": result.changed_files,
                "new_files": result.new_files,
                "deleted_files": result.deleted_files,
                "retract_count": result.retract_facts.len(),
                "assert_count": result.new_facts.len(),
            });
            println!("{summary}");
            for fact in &result.retract_facts {
                println!("{}", serde_json::json!({ "retract": fact_to_json(fact) }));
            }
            for fact in &result.new_facts {
                println!("{}", serde_json::json!({ "assert": fact_to_json(fact) }));
            }
            Ok(())
        }
        Commands::Scope { root, file } => {
            let loader = FileScopeLoader::new(&root, &options.ignore_patterns);
            let scope = loader.load(&file)?;
            print_facts(&scope.facts);
            Ok(())
        }
        Commands::Watch { root } => {
            let scanner = Arc::new(Scanner::new(&root, options.clone())?);
            // Prime the manifest so the first delta is small.
            scanner.scan_incremental(&cancel)?;
            let watcher = codefacts_engine::watch::start_watcher(
                &root,
                Arc::clone(&scanner),
                options.ignore_patterns,
                cancel.clone(),
                |delta| {
                    for fact in &delta.retract_facts {
                        println!("{}", serde_json::json!({ "retract": fact_to_json(fact) }));
                    }
                    for fact in &delta.new_facts {
                        println!("{}", serde_json::json!({ "assert": fact_to_json(fact) }));
                    }
                },
            );
            if watcher.is_none() {
                eprintln!("error: watcher could not start");
                std::process::exit(1);
            }
            // Block until interrupted; the watcher thread does the work.
            loop {
                std::thread::sleep(std::time::Duration::from_secs(60));
            }
        }
    }
}

fn print_facts(facts: &[Fact]) {
    for fact in facts {
        println!("{}", fact_to_json(fact));
    }
}
