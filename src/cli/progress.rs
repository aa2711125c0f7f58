//! Progress bar and summary reporting for CLI runs.

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;

use crate::{CacheEvents, InstallReport, Registration};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates a progress bar for the precache fetches.
fn make_install_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} - {msg}")
            .expect("progress template is valid")
            .progress_chars("━━╌"),
    );
    bar
}

/// Reports controller events on the terminal.
pub struct TerminalEvents {
    bar: ProgressBar,
}

impl Default for TerminalEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalEvents {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bar: make_install_bar(),
        }
    }

    /// Removes the progress bar once installation is over.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl CacheEvents for TerminalEvents {
    fn on_install_start(&self, store: &str, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_message(format!("installing {store}"));
    }

    fn on_precached(&self, url: &str) {
        self.bar.set_message(url.to_string());
        self.bar.inc(1);
    }

    fn on_precache_failed(&self, url: &str, error: &str) {
        self.bar.println(format!("  failed {url}: {error}"));
        self.bar.inc(1);
    }

    fn on_store_deleted(&self, store: &str) {
        self.bar.println(format!("  deleted stale store {store}"));
    }

    fn on_network_error(&self, url: &Url, error: &str) {
        self.bar.println(format!("  network error for {url}: {error}"));
    }
}

fn print_install(report: &InstallReport) {
    println!("  Store:             {}", report.store);
    println!("  Cached:            {}", report.cached.len());
    if !report.failed.is_empty() {
        println!("  Failed:            {}", report.failed.len());
        for failure in &report.failed {
            println!("    {} ({})", failure.url, failure.reason);
        }
    }
}

/// Prints the outcome of registering the controller.
pub fn print_registration(store: &str, registration: &Registration) {
    println!("{SEPARATOR}");
    println!("Cache Summary");
    println!("{SEPARATOR}");

    match &registration.install {
        Some(report) => print_install(report),
        None => println!("  Store:             {store} (already installed)"),
    }
    if !registration.activation.deleted.is_empty() {
        println!(
            "  Deleted:           {}",
            registration.activation.deleted.join(", ")
        );
    }
    println!(
        "  Controlling:       {}",
        if registration.activation.clients_claimed { "yes" } else { "no" }
    );

    println!("{SEPARATOR}");
}

/// Prints every store with its entry count, marking the current one.
pub fn print_stores(current: &str, stores: &[(String, usize)]) {
    if stores.is_empty() {
        println!("No cache stores.");
        return;
    }
    for (name, entries) in stores {
        let marker = if name == current { "*" } else { " " };
        println!("{marker} {name} ({entries} entries)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_events_track_install_progress() {
        let events = TerminalEvents::default();
        events.on_install_start("portfolio-cache-v5", 3);
        events.on_precached("/");
        events.on_precache_failed("/about.html", "offline");
        assert_eq!(events.bar.length(), Some(3));
        assert_eq!(events.bar.position(), 2);
        events.finish();
        assert!(events.bar.is_finished());
    }
}
