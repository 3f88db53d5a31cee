//! Log Sentinel entrypoint.
//!
//! - `log-sentinel train` fits a bundle from the configured corpus and stores it
//! - `log-sentinel score` scores stdin line by line, one ndjson verdict per line on stdout
//! - `log-sentinel watch <file>` follows a growing file until Ctrl+C

use log_sentinel::{
    config::SentinelConfig,
    detector::{Detector, StreamSummary},
    features::HashingEmbedder,
    logging::StructuredLogger,
    storage::ArtifactStore,
    training::Trainer,
};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

static STOP: AtomicBool = AtomicBool::new(false);

const USAGE: &str = "usage: log-sentinel <train | score | watch <file>>";

fn train(config: &SentinelConfig) -> Result<(), BoxError> {
    let store = ArtifactStore::open(&config.artifacts.store_path)?;
    let embedder = Arc::new(HashingEmbedder::from_config(&config.embedding)?);
    let trainer = Trainer::new(config.training.clone(), embedder);
    let outcome = trainer.run(&store)?;
    let pruned = store.prune_except_current()?;
    info!(
        records = outcome.report.records,
        skipped = outcome.report.skipped,
        columns = outcome.report.n_columns,
        flagged = outcome.report.flagged,
        pruned,
        "bundle ready"
    );
    Ok(())
}

fn score_stdin(detector: &Detector) -> Result<(), BoxError> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    let summary = detector.score_stream(stdin.lock(), &mut stdout)?;
    info!(
        lines = summary.lines,
        scored = summary.scored,
        anomalous = summary.anomalous,
        failed = summary.failed,
        lossy = summary.lossy,
        "input exhausted"
    );
    Ok(())
}

fn watch(detector: &Detector, path: &Path) -> Result<(), BoxError> {
    let _ = ctrlc::set_handler(|| STOP.store(true, Ordering::Relaxed));
    let mut reader = BufReader::new(std::fs::File::open(path)?);
    let mut stdout = std::io::stdout().lock();
    let mut pending = Vec::new();
    let mut summary = StreamSummary::default();
    info!(path = %path.display(), "watching (Ctrl+C to stop)");

    while !STOP.load(Ordering::Relaxed) {
        let n = reader.read_until(b'\n', &mut pending)?;
        if n == 0 || !pending.ends_with(b"\n") {
            // partial line: wait for the writer to finish it
            std::thread::sleep(Duration::from_millis(250));
            continue;
        }
        detector.score_raw_line(&pending, &mut stdout, &mut summary)?;
        pending.clear();
    }
    info!(
        lines = summary.lines,
        anomalous = summary.anomalous,
        failed = summary.failed,
        "watch stopped"
    );
    Ok(())
}

fn main() -> Result<(), BoxError> {
    let config_path = std::env::var("LOG_SENTINEL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("sentinel.json"));
    let config = SentinelConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("train") => train(&config),
        Some("score") => {
            let store = ArtifactStore::open(&config.artifacts.store_path)?;
            // refuses to start without a complete, consistent bundle
            let detector = Detector::from_store(&store)?;
            info!(bundle_id = %detector.bundle().id(), "detector ready");
            score_stdin(&detector)
        }
        Some("watch") => {
            let path = args.next().map(PathBuf::from).ok_or(USAGE)?;
            let store = ArtifactStore::open(&config.artifacts.store_path)?;
            let detector = Detector::from_store(&store)?;
            info!(bundle_id = %detector.bundle().id(), "detector ready");
            watch(&detector, &path)
        }
        _ => Err(USAGE.into()),
    }
}
