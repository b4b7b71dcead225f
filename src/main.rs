//! phishtree entrypoint: scores URLs from the command line, or one per line
//! on stdin when none are given, and prints one JSON record per URL.

use chrono::Utc;
use phishtree::{
    config::DetectorConfig,
    inference::{Detector, Prediction},
    logging::{ScanRecord, StructuredLogger},
    DetectorError,
};
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use uuid::Uuid;

static STOP: AtomicBool = AtomicBool::new(false);

fn read_urls() -> Result<Vec<String>, std::io::Error> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        return Ok(args);
    }
    let mut urls = Vec::new();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            urls.push(trimmed.to_string());
        }
    }
    Ok(urls)
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("PHISHTREE_CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = DetectorConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    let detector = Detector::from_config(&config)?;
    let urls = read_urls()?;
    let scan_id = Uuid::new_v4();
    info!(
        %scan_id,
        urls = urls.len(),
        trees = detector.ensemble().num_trees(),
        "scan starting"
    );

    install_stop_handler();

    let results = detector.predict_many_cancellable(urls.as_slice(), &STOP);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let (mut flagged, mut failed, mut cancelled) = (0usize, 0usize, 0usize);
    for (url, result) in urls.iter().zip(results) {
        let (prediction, error) = match result {
            Ok(p) => (p, None),
            Err(DetectorError::Cancelled) => {
                cancelled += 1;
                continue;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "url not scored");
                failed += 1;
                (Prediction::unclassifiable(&e), Some(e.to_string()))
            }
        };
        if prediction.is_phishing {
            flagged += 1;
        }
        let record = ScanRecord {
            scan_id,
            ts: Utc::now(),
            url,
            prediction,
            error,
        };
        StructuredLogger::emit_json(&record, &mut out)?;
    }
    out.flush()?;

    if cancelled > 0 {
        warn!(%scan_id, cancelled, "scan interrupted");
    }
    info!(%scan_id, flagged, failed, "scan complete");
    Ok(())
}

/// Route Ctrl-C to `STOP`. Without a handler the scan still runs, it just
/// cannot be interrupted cleanly.
fn install_stop_handler() -> bool {
    match ctrlc::set_handler(|| STOP.store(true, Ordering::Relaxed)) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "ctrl-c handler not installed");
            false
        }
    }
}
