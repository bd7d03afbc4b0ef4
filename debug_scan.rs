// Run with: cargo run --example debug_scan -- /path/to/scan

use dusql_core::{Crawler, ScanConfig};
use std::path::PathBuf;
use std::time::{Duration, Instant};

fn main() {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    println!("Crawling: {:?}", path);

    let mut crawler = Crawler::new(path, ScanConfig::default());
    if crawler.root_key().is_none() {
        println!("Root does not exist, nothing to crawl");
        return;
    }

    let start = Instant::now();
    let mut last_print = Instant::now();

    while let Some(record) = crawler.next() {
        let now = Instant::now();
        if now.duration_since(last_print) > Duration::from_secs(1) {
            let p = crawler.progress();
            println!(
                "[{:>6.1}s] records={:<8} dirs={:<8} bytes={:<12} unreadable={:<4} vanished={:<4} unlistable={:<4} last={}",
                start.elapsed().as_secs_f64(),
                p.records,
                p.dirs_scanned,
                p.bytes_scanned,
                p.unreadable,
                p.vanished,
                p.unlistable,
                record.display_name(),
            );
            last_print = now;
        }
    }

    let p = crawler.progress();
    println!(
        "\nFinal: {} records, {} total size, {} device boundaries, {:.1}s",
        p.records,
        dusql_core::format_size(p.bytes_scanned),
        p.boundaries,
        start.elapsed().as_secs_f64()
    );
}
