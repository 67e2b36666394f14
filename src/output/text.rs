//! Human-readable text output

use crate::stats::{AggregateReport, PhaseStats};
use crate::util::time::{format_bytes, format_duration, format_throughput};
use crate::workflow::{DownloadOutcome, UploadOutcome, WorkerResult};

/// Print a run report to stdout
///
/// Shows per-phase success counts, bottleneck time, throughput and the
/// transfer-time distribution. With `per_worker`, a table of individual
/// workers follows.
pub fn print_report(report: &AggregateReport, per_worker: Option<&[&WorkerResult]>) {
    println!("═══════════════════════════════════════════════════════════");
    println!("                    TEST RESULTS");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("File Size:  {}", format_bytes(report.file_size));
    println!("Workers:    {}", report.worker_count);
    println!("Pool:       {}", report.pool_kind);
    println!("Started:    {}", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Wall Time:  {:.3}s", report.wall_time.as_secs_f64());
    println!();

    print_phase("Upload", &report.upload);
    print_phase("Download", &report.download);

    if let Some(results) = per_worker {
        print_worker_table(results);
    }

    println!("═══════════════════════════════════════════════════════════");
}

fn print_phase(name: &str, stats: &PhaseStats) {
    println!("{}:", name);
    println!("  Successful:  {}", stats.successful);
    println!("  Failed:      {}", stats.failed);
    println!("  Total Time:  {:.3}s", stats.max_elapsed.as_secs_f64());
    println!(
        "  Throughput:  {:.2} MB/s ({})",
        stats.throughput_mb_s(),
        format_throughput(stats.throughput_bytes_per_sec)
    );
    println!("  Total Bytes: {:.2} MB", stats.total_mb());

    match &stats.latency {
        Some(latency) => {
            println!("  Time per transfer:");
            println!("    Min:  {}", format_duration(latency.min));
            println!("    Mean: {}", format_duration(latency.mean));
            println!("    p50:  {}", format_duration(latency.p50));
            println!("    p90:  {}", format_duration(latency.p90));
            println!("    p99:  {}", format_duration(latency.p99));
            println!("    Max:  {}", format_duration(latency.max));
        }
        None => println!("  No timing data collected"),
    }
    println!();
}

fn print_worker_table(results: &[&WorkerResult]) {
    println!("Per-Worker Results:");
    println!(
        "  {:>6}  {:<8} {:>10}  {:<8} {:>10}  {:<5}  {}",
        "worker", "upload", "time", "download", "time", "valid", "note"
    );
    for result in results {
        println!("  {}", worker_row(result));
    }
    println!();
}

/// One table row for a worker
pub fn worker_row(result: &WorkerResult) -> String {
    let (upload, upload_time, upload_note) = match &result.upload {
        Some(UploadOutcome::Completed {
            success, elapsed, ..
        }) => (status(*success), format_duration(*elapsed), None),
        Some(UploadOutcome::Failed(failure)) => ("FAIL", "-".to_string(), Some(failure.to_string())),
        None => ("-", "-".to_string(), None),
    };
    let (download, download_time, valid, download_note) = match &result.download {
        Some(DownloadOutcome::Completed {
            elapsed,
            content_matches_prefix,
            ..
        }) => (
            "OK",
            format_duration(*elapsed),
            if *content_matches_prefix { "yes" } else { "NO" },
            None,
        ),
        Some(DownloadOutcome::Failed(failure)) => ("FAIL", "-".to_string(), "-", Some(failure.to_string())),
        None => ("-", "-".to_string(), "-", None),
    };

    let note = result
        .error
        .as_ref()
        .map(|f| f.to_string())
        .or(upload_note)
        .or(download_note)
        .unwrap_or_default();

    format!(
        "{:>6}  {:<8} {:>10}  {:<8} {:>10}  {:<5}  {}",
        result.worker_id, upload, upload_time, download, download_time, valid, note
    )
}

fn status(success: bool) -> &'static str {
    if success {
        "OK"
    } else {
        "REJECTED"
    }
}
