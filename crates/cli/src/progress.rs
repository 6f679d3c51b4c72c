//! Terminal progress display for a scan.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use changescan_common::ProgressListener;
use changescan_filesystem::{RunSummary, ScanStats};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner that counts progress ticks from the scanner.
pub struct SpinnerProgress {
    bar: ProgressBar,
    items: AtomicU64,
}

impl SpinnerProgress {
    /// Create and start a spinner.
    pub fn new() -> Self {
        let bar: ProgressBar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("Scanning...");

        Self {
            bar,
            items: AtomicU64::new(0),
        }
    }

    /// Number of ticks seen so far.
    pub fn items(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }
}

impl Default for SpinnerProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressListener for SpinnerProgress {
    fn on_progress_tick(&self) {
        let items: u64 = self.items.fetch_add(1, Ordering::Relaxed) + 1;
        if items % 64 == 0 {
            self.bar
                .set_message(format!("Examined {} items", format_number(items)));
        }
    }

    fn on_scan_complete(&self) {
        self.bar.finish_and_clear();
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let digits: String = n.to_string();
    let mut out: String = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Print a summary of the run to stdout.
pub fn print_summary(summary: &RunSummary) {
    println!();
    if let Some(stats) = &summary.stats {
        print_scan_stats(stats);
    } else if let Some(snapshot) = &summary.snapshot {
        println!("  Files:         {}", format_number(snapshot.len() as u64));
        println!("  Total size:    {}", format_size(snapshot.total_bytes(), BINARY));
    }
    if let Some(path) = &summary.saved_to {
        println!("  Snapshot:      {}", path.display());
    }
    if let Some(comparison) = &summary.comparison {
        println!("  New files:     {}", format_number(comparison.new_to_candidate.len() as u64));
        println!(
            "  Missing files: {}",
            format_number(comparison.removed_in_candidate.len() as u64)
        );
        println!(
            "  Changed files: {}",
            format_number(comparison.file_system_differences.len() as u64)
        );
    }
    println!();
}

fn print_scan_stats(stats: &ScanStats) {
    let seconds: f64 = stats.duration.as_secs_f64();
    let rate: f64 = if seconds > 0.0 {
        stats.files_described as f64 / seconds
    } else {
        0.0
    };

    println!("  Directories:   {}", format_number(stats.directories_scanned));
    println!("  Files:         {}", format_number(stats.files_described));
    println!("  Total size:    {}", format_size(stats.bytes_described, BINARY));
    println!("  Duration:      {:.1}s ({:.0} files/sec)", seconds, rate);
    let excluded: u64 = stats.files_excluded + stats.directories_excluded;
    if excluded > 0 {
        println!("  Excluded:      {}", format_number(excluded));
    }
    let failed: u64 = stats.files_failed + stats.directories_failed;
    if failed > 0 {
        println!("  Errors:        {}", format_number(failed));
    }
}
