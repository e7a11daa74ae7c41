use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use orkl_loader::db::DEFAULT_DB_PATH;
use orkl_loader::loader::DEFAULT_LIBRARY_PATH;
use orkl_loader::validate::DEFAULT_SCHEMA_PATH;
use orkl_loader::{LoadConfig, LoadEvent, LoadOutcome};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "orkl-loader")]
#[command(author, version, about = "Validate library.json and load it into the ORKL database")]
struct Args {
    /// Library export to load
    #[arg(long, default_value = DEFAULT_LIBRARY_PATH)]
    library: PathBuf,

    /// JSON schema the library must conform to
    #[arg(long, default_value = DEFAULT_SCHEMA_PATH)]
    schema: PathBuf,

    /// SQLite database file
    #[arg(long, env = "ORKL_DATABASE", default_value = DEFAULT_DB_PATH)]
    database: String,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// Only show the summary
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = LoadConfig {
        library_path: args.library,
        schema_path: args.schema,
        database_url: args.database,
    };

    let mut pb: Option<ProgressBar> = None;
    let mut skipped = 0usize;
    let outcome = orkl_loader::run(&config, |event| match event {
        LoadEvent::Validating => {
            if !args.quiet {
                eprintln!("Validating data...(this might take a while)");
            }
        }
        LoadEvent::Validated => {
            if !args.quiet {
                eprintln!("\x1b[32mData is valid.\x1b[0m");
            }
        }
        LoadEvent::Inserting { total } => {
            if !args.quiet {
                eprintln!("Inserting data into the database...");
                pb = Some(progress_bar(total));
            }
        }
        LoadEvent::EntryFinished { result, .. } => {
            if result.is_err() {
                skipped += 1;
            }
            if let Some(ref pb) = pb {
                pb.inc(1);
                if skipped > 0 {
                    pb.set_message(format!("{} skipped", skipped));
                }
            }
        }
    });

    if let Some(pb) = pb.take() {
        pb.finish_and_clear();
    }

    match outcome {
        Ok(LoadOutcome::Empty) => {
            println!("No data to insert.");
        }
        Ok(LoadOutcome::Completed(summary)) => {
            debug_assert_eq!(skipped, summary.skipped_count());
            println!(
                "Data inserted successfully. {} entries processed. {} entries skipped.",
                summary.processed,
                summary.skipped_count()
            );
        }
        Err(e) => {
            eprintln!("\x1b[31m{}\x1b[0m", e);
            std::process::exit(1);
        }
    }

    if !args.quiet {
        eprintln!("\n\x1b[90mDONE\x1b[0m");
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "orkl_loader=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}
