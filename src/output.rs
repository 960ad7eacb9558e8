use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ListResult, PlanResult, ProgressEvent, ProgressSink};
use crate::domain::{FetchStatus, RunReport};

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const RULE: &str = "======================================================================";

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_plan(plan: &PlanResult) -> io::Result<()> {
        Self::print_json(plan)
    }

    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-facing progress on stdout.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Searching {
                tile,
                start,
                end,
                bands,
            } => {
                println!("\nSearching for HLS data:");
                println!("  Tile: {tile}");
                println!("  Date range: {start} to {end}");
                println!("  Bands: {}", bands.join(", "));
            }
            ProgressEvent::Found { candidates, .. } => {
                println!("\nFound {candidates} files to download");
            }
            ProgressEvent::Limited { max_files } => {
                println!("Limiting to first {max_files} files");
            }
            ProgressEvent::Started {
                index,
                total,
                filename,
            } => {
                println!("\n[{index}/{total}] {filename}");
            }
            ProgressEvent::Transfer {
                received, total, ..
            } => {
                if let Some(total) = total.filter(|total| *total > 0) {
                    let percent = received as f64 / total as f64 * 100.0;
                    print!("    Progress: {percent:.1}%\r");
                    let _ = io::stdout().flush();
                }
            }
            ProgressEvent::Finished { outcome, .. } => match outcome.status {
                FetchStatus::AlreadyPresent => {
                    println!("{GREEN}  ✓ Already exists: {}{RESET}", outcome.filename);
                }
                FetchStatus::Downloaded => {
                    println!(
                        "{CYAN}  ✓ Downloaded: {} ({}){RESET}",
                        outcome.filename,
                        megabytes(outcome.bytes_transferred)
                    );
                }
                FetchStatus::Failed => {
                    println!(
                        "{RED}  ✗ Error downloading {}: {}{RESET}",
                        outcome.filename,
                        outcome.error.as_deref().unwrap_or("unknown error")
                    );
                }
            },
        }
    }
}

pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_banner() {
        println!("{RULE}");
        println!("HLS SENTINEL-2 DATA DOWNLOADER");
        println!("{RULE}");
    }

    pub fn print_report(report: &RunReport) {
        println!("\n{RULE}");
        if report.requested == 0 {
            println!("{YELLOW}No granules found!{RESET}");
        } else {
            println!("DOWNLOAD COMPLETE");
        }
        println!("{RULE}");
        println!(
            "{GREEN}✓ Successfully downloaded: {} files{RESET}",
            report.succeeded
        );
        let present = report.count(FetchStatus::AlreadyPresent);
        if present > 0 {
            println!("{GREEN}  ({present} already present){RESET}");
        }
        if report.failed > 0 {
            println!("{RED}✗ Failed: {} files{RESET}", report.failed);
        }
        println!(
            "{CYAN}Transferred: {}{RESET}",
            megabytes(report.bytes_transferred())
        );
        println!("{CYAN}Location: {}{RESET}", report.output_directory);
        println!("{RULE}");
    }

    pub fn print_plan(plan: &PlanResult) {
        println!("\nDry run: {} files would be requested", plan.requested);
        for file in &plan.files {
            let state = if file.present { "present" } else { "missing" };
            println!("  [{state}] {} ({})", file.filename, file.band);
        }
        println!("Location: {}", plan.output_directory);
    }

    pub fn print_list(result: &ListResult) {
        println!("{CYAN}{}{RESET}", result.output_directory);
        if result.files.is_empty() {
            println!("{YELLOW}  no downloaded files{RESET}");
            return;
        }
        for file in &result.files {
            let band = file
                .granule
                .as_ref()
                .map(|granule| granule.band.as_str())
                .unwrap_or("-");
            println!(
                "  {:<24} {:<6} {:>10}  {}",
                file.label,
                band,
                megabytes(file.size_bytes),
                file.filename
            );
        }
    }
}

fn megabytes(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0)
}
