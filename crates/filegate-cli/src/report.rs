use colored::*;
use filegate_core::{DedupResult, ProcessRecord};

#[derive(Debug, Default)]
pub struct Totals {
    pub unique: usize,
    pub duplicate: usize,
    pub skipped: usize,
}

impl Totals {
    pub fn count(&mut self, record: &ProcessRecord) {
        match record.result {
            DedupResult::Unique => self.unique += 1,
            DedupResult::Duplicate => self.duplicate += 1,
            DedupResult::Skipped => self.skipped += 1,
        }
    }
}

pub fn emit(record: &ProcessRecord, json: bool) {
    if json {
        match serde_json::to_string(record) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::error!("could not serialize record: {}", e),
        }
        return;
    }

    let path = record.original_path.display();
    match record.result {
        DedupResult::Unique => {
            let stored = record
                .stored_path
                .as_ref()
                .filter(|s| s.as_path() != record.original_path.as_path())
                .map(|s| format!(" -> {}", s.display()))
                .unwrap_or_default();
            println!("{} [tier {}] {}{}", "UNIQUE".green(), record.tier, path, stored);
        }
        DedupResult::Duplicate => {
            let of = record
                .duplicate_of
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default();
            println!("{} [tier {}] {} == {}", "DUPLICATE".red(), record.tier, path, of);
        }
        DedupResult::Skipped => {
            let error = record.error.as_deref().unwrap_or("unknown");
            println!(
                "{} [tier {}] {} ({})",
                "SKIPPED".yellow(),
                record.tier,
                path,
                error
            );
        }
    }
}

pub fn summary(totals: &Totals) {
    println!();
    println!(
        "{} unique, {} duplicates, {} skipped",
        format!("{}", totals.unique).green(),
        format!("{}", totals.duplicate).red(),
        format!("{}", totals.skipped).yellow(),
    );
}
