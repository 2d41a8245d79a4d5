mod commands;
mod logging;
mod report;

use std::process;

use clap::{CommandFactory, Parser};
use commands::{Cli, Commands, ProcessArgs};
use dotenv::dotenv;
use filegate_core::{AppConfig, Session};
use tracing::error;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match filegate_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command {
        Some(Commands::Process(process_args)) => {
            if let Err(err) = run_process(&config, &process_args) {
                error!("Error: {}", err);
                process::exit(1);
            }
        }
        Some(Commands::Stats) => {
            if let Err(err) = run_stats(&config) {
                error!("Error: {}", err);
                process::exit(1);
            }
        }
        Some(Commands::Orphans) => {
            if let Err(err) = run_orphans(&config) {
                error!("Error: {}", err);
                process::exit(1);
            }
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn open_session(config: &AppConfig) -> Result<Session, filegate_core::Error> {
    Session::open(config.session_options()?)
}

fn run_process(config: &AppConfig, args: &ProcessArgs) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(config)?;
    let mut totals = report::Totals::default();

    for path in &args.paths {
        if path.is_dir() {
            for record in session.process_directory(path, !args.no_recurse)? {
                let record = record?;
                report::emit(&record, args.json);
                totals.count(&record);
            }
        } else {
            let record = session.process_file(path)?;
            report::emit(&record, args.json);
            totals.count(&record);
        }
    }

    if !args.json {
        report::summary(&totals);
    }
    Ok(())
}

fn run_stats(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(config)?;
    let stats = session.stats()?;
    println!("unique sizes:         {}", stats.unique_sizes);
    println!("fringe entries:       {}", stats.fringe_entries);
    println!("full entries:         {}", stats.full_entries);
    println!("pending orphans:      {}", stats.pending_orphans);
    println!("unterminated journal: {}", stats.unterminated_journal);
    println!("schema version:       {}", stats.schema_version);
    Ok(())
}

fn run_orphans(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(config)?;
    let orphans = session.orphans()?;
    if orphans.is_empty() {
        println!("No pending orphans");
        return Ok(());
    }
    for orphan in orphans {
        println!(
            "#{} {} (from {}, {} bytes, {})",
            orphan.id, orphan.orphan_path, orphan.original_path, orphan.file_size, orphan.created_at
        );
    }
    Ok(())
}
