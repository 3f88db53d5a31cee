//! Integration tests: training, inference parity, reconciliation and artifact storage.

mod common;

use common::{corpus, embedder, train, INJECTION};
use log_sentinel::{
    config::SentinelConfig,
    detector::{Detector, Label},
    error::{EmbeddingError, SentinelError},
    features::{Embedder, EmbeddingSpec, FeatureExtractor, HashingEmbedder},
    model::ModelBundle,
    parser::parse_line,
    storage::ArtifactStore,
    training::{Trainer, TrainingOutcome},
};
use ndarray::Array2;
use std::path::Path;
use std::sync::{Arc, OnceLock};

const CORPUS_SIZE: usize = 2000;

fn trained() -> &'static (Vec<String>, TrainingOutcome) {
    static TRAINED: OnceLock<(Vec<String>, TrainingOutcome)> = OnceLock::new();
    TRAINED.get_or_init(|| {
        let lines = corpus(CORPUS_SIZE, 7);
        let outcome = train(&lines);
        (lines, outcome)
    })
}

fn detector() -> Detector {
    let (_, outcome) = trained();
    Detector::new(Arc::new(outcome.bundle.clone()), embedder()).unwrap()
}

#[test]
fn config_load_default() {
    let c = SentinelConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.training.n_estimators, 100);
    assert_eq!(c.training.contamination, 0.01);
    assert_eq!(c.training.seed, 42);
}

#[test]
fn reconciled_vectors_match_schema() {
    let (_, outcome) = trained();
    let schema = outcome.bundle.schema();
    let extractor = FeatureExtractor::new(embedder());
    let lines = [
        "Sep 02 21:41:00 web-prod-03 sshd[1234]: Accepted password for admin from 10.0.5.9 port 22",
        "Sep 02 21:41:00 web-prod-03 nginx[80]: GET /index.html 200",
        INJECTION,
    ];
    for line in lines {
        let record = parse_line(line).unwrap();
        let frame = extractor.extract(&[record]).unwrap();
        let aligned = schema.reconcile(&frame);
        assert_eq!(aligned.n_cols(), schema.len());
        assert_eq!(aligned.columns(), schema.columns());

        let again = schema.reconcile(&aligned);
        assert_eq!(again, aligned);
    }
}

#[test]
fn unseen_process_contributes_nothing() {
    let (_, outcome) = trained();
    let schema = outcome.bundle.schema();
    let record = parse_line("Sep 02 21:41:00 web-prod-03 nginx[80]: GET /index.html 200").unwrap();
    let frame = FeatureExtractor::new(embedder()).extract(&[record]).unwrap();
    assert!(frame.column_index("proc_nginx").is_some());

    let aligned = schema.reconcile(&frame);
    let vector = aligned.vector(0);
    assert!(vector.get("proc_nginx").is_none());
    let indicators: Vec<f64> = vector
        .iter()
        .filter(|(name, _)| name.starts_with("proc_"))
        .map(|(_, v)| v)
        .collect();
    assert_eq!(indicators.len(), 6);
    assert!(indicators.iter().all(|v| *v == 0.0));

    let event = detector()
        .score("Sep 02 21:41:00 web-prod-03 nginx[80]: GET /index.html 200")
        .unwrap();
    assert!(event.score.is_some());
}

#[test]
fn training_and_inference_agree() {
    let (lines, outcome) = trained();
    let detector = detector();
    let labels = outcome.labels();
    assert_eq!(labels.len(), lines.len());

    for (i, line) in lines.iter().enumerate() {
        let event = detector.score(line).unwrap();
        let score = event.score.unwrap();
        assert!(
            (score - outcome.scores[i]).abs() < 1e-12,
            "row {}: {} vs {}",
            i,
            score,
            outcome.scores[i]
        );
        assert_eq!(event.label, labels[i], "row {}", i);
    }
}

#[test]
fn batch_scoring_matches_single_scoring() {
    let (lines, _) = trained();
    let detector = detector();
    let mut batch: Vec<&str> = lines.iter().take(40).map(String::as_str).collect();
    batch.insert(5, "not a log line");
    batch.push(INJECTION);

    let events = detector.score_batch(batch.iter().copied()).unwrap();
    assert_eq!(events.len(), batch.len());
    assert!(!events[5].is_parsed());
    for (line, event) in batch.iter().zip(&events) {
        let single = detector.score(line).unwrap();
        assert_eq!(single.label, event.label);
        assert_eq!(single.score, event.score);
    }
}

#[test]
fn unparsable_lines_are_normal_and_unscored() {
    let detector = detector();
    for line in [
        "",
        "garbage",
        "Sep 02 21:41:00 web-prod-03 kernel: [9999]: Buffer overflow attempt detected from 10.0.5.20",
        "Sep 02 21:40:00 corp-server-01 sshd[notapid]: Failed password",
    ] {
        let event = detector.score(line).unwrap();
        assert_eq!(event.label, Label::Normal);
        assert_eq!(event.score, None);
        assert!(event.record.is_none());
    }
}

#[test]
fn contamination_fraction_is_flagged_in_training() {
    let (_, outcome) = trained();
    let flagged = outcome
        .labels()
        .iter()
        .filter(|l| **l == Label::Anomalous)
        .count();
    assert_eq!(flagged, outcome.report.flagged);
    // 1% of 2000, with room for ties at the threshold
    assert!((10..=30).contains(&flagged), "flagged {}", flagged);
}

#[test]
fn sql_injection_is_flagged() {
    let detector = detector();
    let run = corpus(31, 99);
    let mut benign: Vec<f64> = run
        .iter()
        .map(|l| detector.score(l).unwrap().score.unwrap())
        .collect();
    benign.sort_by(|a, b| a.total_cmp(b));
    let median = benign[benign.len() / 2];

    let event = detector.score(INJECTION).unwrap();
    assert_eq!(event.label, Label::Anomalous);
    assert!(event.score.unwrap() < median);
    assert_eq!(event.record.as_ref().unwrap().process, "mysql");
}

#[test]
fn oversized_pid_does_not_hide_a_line() {
    let detector = detector();
    let expected = detector.score(INJECTION).unwrap();
    for pid in ["99999999999", "123456789012345678901234567890"] {
        let line = INJECTION.replace("[1111]", &format!("[{}]", pid));
        let event = detector.score(&line).unwrap();
        assert!(event.is_parsed(), "pid {}", pid);
        assert_eq!(event.label, Label::Anomalous);
        assert_eq!(event.score, expected.score);
    }
}

#[test]
fn detector_is_shareable_across_threads() {
    let detector = Arc::new(detector());
    let expected = detector.score(INJECTION).unwrap().score;
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let d = Arc::clone(&detector);
            std::thread::spawn(move || d.score(INJECTION).unwrap().score)
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}

#[test]
fn mismatched_embedder_is_rejected() {
    let (_, outcome) = trained();
    let bundle = Arc::new(outcome.bundle.clone());
    let err = Detector::new(bundle, Arc::new(HashingEmbedder::new(32, 3).unwrap())).unwrap_err();
    assert!(matches!(err, SentinelError::ArtifactInconsistent(_)));
}

struct Offline;

impl Embedder for Offline {
    fn dim(&self) -> usize {
        64
    }
    fn embed(&self, _: &[&str]) -> Result<Array2<f64>, EmbeddingError> {
        Err(EmbeddingError::Unavailable("model server down".into()))
    }
    fn spec(&self) -> EmbeddingSpec {
        embedder().spec()
    }
}

#[test]
fn embedding_failure_fails_the_call() {
    let (_, outcome) = trained();
    let detector = Detector::new(Arc::new(outcome.bundle.clone()), Arc::new(Offline)).unwrap();
    let err = detector.score(INJECTION).unwrap_err();
    assert!(matches!(err, SentinelError::Embedding(EmbeddingError::Unavailable(_))));
    // unparsable lines never reach the embedder
    assert!(detector.score("garbage").is_ok());
}

fn verdicts(out: Vec<u8>) -> Vec<serde_json::Value> {
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn invalid_utf8_does_not_stop_the_stream() {
    let detector = detector();
    let mut input = Vec::new();
    input.extend_from_slice(
        b"Sep 02 21:41:00 web-prod-03 sshd[1234]: Accepted password for admin from 10.0.5.9 port 22\n",
    );
    input.extend_from_slice(b"Sep 02 21:41:01 web-prod-03 sshd[1235]: Accepted password for \xffadmin\n");
    input.extend_from_slice(b"garbage\r\n");
    // last line has no trailing newline
    input.extend_from_slice(INJECTION.as_bytes());

    let mut out = Vec::new();
    let summary = detector.score_stream(&input[..], &mut out).unwrap();
    assert_eq!(summary.lines, 4);
    assert_eq!(summary.lossy, 1);
    assert_eq!(summary.scored, 3);
    assert_eq!(summary.failed, 0);

    let lines = verdicts(out);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1]["process"], "sshd");
    assert!(lines[1]["message"].as_str().unwrap().contains('\u{FFFD}'));
    assert!(lines[2].get("score").is_none());
    assert_eq!(lines[3]["label"], "anomalous");
}

#[test]
fn embedding_failure_skips_only_that_line() {
    let (_, outcome) = trained();
    let detector = Detector::new(Arc::new(outcome.bundle.clone()), Arc::new(Offline)).unwrap();
    let input = format!("{}\ngarbage\n{}\n", INJECTION, INJECTION);

    let mut out = Vec::new();
    let summary = detector.score_stream(input.as_bytes(), &mut out).unwrap();
    assert_eq!(summary.lines, 3);
    assert_eq!(summary.failed, 2);
    // the unparsable line never reaches the embedder and still gets a verdict
    let lines = verdicts(out);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["label"], "normal");
}

#[test]
fn store_roundtrip() {
    let (_, outcome) = trained();
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(&dir.path().join("artifacts.db")).unwrap();
    store.save(&outcome.bundle).unwrap();

    let loaded = store.load_current().unwrap();
    assert_eq!(loaded, outcome.bundle);

    let from_store = Detector::from_store(&store).unwrap();
    let direct = detector();
    assert_eq!(
        from_store.score(INJECTION).unwrap().score,
        direct.score(INJECTION).unwrap().score
    );
}

#[test]
fn empty_store_refuses_to_load() {
    let store = ArtifactStore::in_memory().unwrap();
    assert!(matches!(
        Detector::from_store(&store),
        Err(SentinelError::ArtifactMissing(_))
    ));
}

#[test]
fn store_detects_missing_and_tampered_artifacts() {
    let (_, outcome) = trained();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("artifacts.db");
    let store = ArtifactStore::open(&path).unwrap();
    store.save(&outcome.bundle).unwrap();

    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute(
        "UPDATE artifacts SET payload = payload || ' ' WHERE name = 'scaler'",
        [],
    )
    .unwrap();
    assert!(matches!(
        store.load_current(),
        Err(SentinelError::ArtifactInconsistent(_))
    ));

    raw.execute("DELETE FROM artifacts WHERE name = 'model'", [])
        .unwrap();
    assert!(matches!(
        store.load_current(),
        Err(SentinelError::ArtifactMissing(_))
    ));
}

#[test]
fn retraining_moves_current_and_prunes() {
    let store = ArtifactStore::in_memory().unwrap();
    let lines = corpus(200, 3);
    let first = train(&lines);
    let second = train(&lines);
    store.save(&first.bundle).unwrap();
    store.save(&second.bundle).unwrap();
    assert_eq!(store.list_bundles().unwrap().len(), 2);
    assert_eq!(store.current_id().unwrap(), Some(second.bundle.id()));

    assert_eq!(store.prune_except_current().unwrap(), 1);
    assert_eq!(store.list_bundles().unwrap().len(), 1);
    assert_eq!(store.load_current().unwrap().id(), second.bundle.id());
}

#[test]
fn pruning_during_saves_keeps_the_current_bundle() {
    let (_, outcome) = trained();
    let base = &outcome.bundle;
    let store = Arc::new(ArtifactStore::in_memory().unwrap());
    store.save(base).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        let base = base.clone();
        std::thread::spawn(move || {
            for _ in 0..20 {
                let fresh = ModelBundle::new(
                    base.schema().clone(),
                    base.scaler().clone(),
                    base.forest().clone(),
                    base.embedding().clone(),
                )
                .unwrap();
                store.save(&fresh).unwrap();
            }
        })
    };
    for _ in 0..20 {
        store.prune_except_current().unwrap();
        assert!(store.load_current().is_ok());
    }
    writer.join().unwrap();

    store.prune_except_current().unwrap();
    let remaining = store.list_bundles().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(Some(remaining[0].id), store.current_id().unwrap());
    assert!(store.load_current().is_ok());
}

#[test]
fn unrepresentable_timestamp_is_inconsistent() {
    let (_, outcome) = trained();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("artifacts.db");
    let store = ArtifactStore::open(&path).unwrap();
    store.save(&outcome.bundle).unwrap();

    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute("UPDATE bundles SET created_at = ?1", [i64::MAX])
        .unwrap();
    assert!(matches!(
        store.list_bundles(),
        Err(SentinelError::ArtifactInconsistent(_))
    ));
    assert!(matches!(
        store.load_current(),
        Err(SentinelError::ArtifactInconsistent(_))
    ));
}

#[test]
fn trainer_run_reads_corpus_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let corpus_path = dir.path().join("normal_traffic.log");
    let mut text = corpus(300, 11).join("\n");
    text.push_str("\nthis line is not syslog\n");
    std::fs::write(&corpus_path, text).unwrap();

    let mut config = common::training_config();
    config.corpus_path = corpus_path;
    let store = ArtifactStore::open(&dir.path().join("store").join("artifacts.db")).unwrap();
    let outcome = Trainer::new(config, embedder()).run(&store).unwrap();

    assert_eq!(outcome.report.lines_read, 301);
    assert_eq!(outcome.report.records, 300);
    assert_eq!(outcome.report.skipped, 1);
    assert_eq!(store.load_current().unwrap().id(), outcome.bundle.id());
}
