#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use access_facade_core::error::{AccessFacadeError, Result};
use access_facade_core::model::{
    Action, AuditEvent, AuditRecord, AuthzContext, AuthzRequest, DecisionOutcome, Resource,
    ServiceIdentity, Subject,
};
use access_facade_core::obs::FacadeMetrics;
use audit_facade::{AuditOutbox, AuditPublisher, OutboxSettings};

/// Accepts the first `ok_budget` events, refuses the rest.
struct Sink {
    ok_budget: AtomicUsize,
    got: Mutex<Vec<String>>,
}

impl Sink {
    fn accepting(n: usize) -> Self {
        Self {
            ok_budget: AtomicUsize::new(n),
            got: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AuditPublisher for Sink {
    async fn publish(&self, event: &AuditEvent) -> Result<()> {
        let left = self.ok_budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(AccessFacadeError::Unavailable("sink down".into()));
        }
        self.ok_budget.store(left - 1, Ordering::SeqCst);
        self.got.lock().unwrap().push(event.event_id().to_string());
        Ok(())
    }
}

fn event(subject: &str) -> AuditEvent {
    let req = AuthzRequest {
        subject: Subject::new(subject),
        action: Action::new("sjp.delete-financial-means"),
        resource: Resource::new("POST", "/cases"),
        context: AuthzContext::default(),
    };
    AuditRecord::from_outcome(
        &ServiceIdentity::default(),
        &req,
        &DecisionOutcome::deny("not a member"),
    )
    .into()
}

fn outbox(dir: &Path, max_file_size_bytes: u64, max_files: usize) -> (AuditOutbox, Arc<FacadeMetrics>) {
    let metrics = Arc::new(FacadeMetrics::default());
    let settings = OutboxSettings {
        enabled: true,
        dir: dir.to_path_buf(),
        max_file_size_bytes,
        max_files,
        replay_interval_sec: 15,
    };
    (AuditOutbox::new(settings, metrics.clone()), metrics)
}

fn file_names(paths: &[std::path::PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn append_then_replay_empties_the_spool() {
    let tmp = tempfile::tempdir().unwrap();
    let (outbox, metrics) = outbox(tmp.path(), 10 * 1024 * 1024, 10);

    let a = event("a");
    let b = event("b");
    outbox.append(&a).await.expect("append a");
    outbox.append(&b).await.expect("append b");

    let files = outbox.files().await.unwrap();
    assert_eq!(files.len(), 1);
    let content = std::fs::read_to_string(&files[0]).unwrap();
    let lines: Vec<AuditEvent> = content
        .lines()
        .map(|l| serde_json::from_str(l).expect("valid line"))
        .collect();
    assert_eq!(lines, vec![a.clone(), b.clone()]);

    let sink = Sink::accepting(usize::MAX);
    let report = outbox.replay(&sink).await.unwrap();
    assert_eq!(report.replayed, 2);
    assert_eq!(report.files_deleted, 1);
    assert!(outbox.files().await.unwrap().is_empty());
    assert_eq!(
        *sink.got.lock().unwrap(),
        vec![a.event_id().to_string(), b.event_id().to_string()]
    );
    assert_eq!(metrics.audit_outbox.get(&[("op", "replayed")]), 2);
}

#[tokio::test]
async fn failed_replay_keeps_remaining_lines() {
    let tmp = tempfile::tempdir().unwrap();
    let (outbox, _) = outbox(tmp.path(), 10 * 1024 * 1024, 10);
    for s in ["a", "b", "c"] {
        outbox.append(&event(s)).await.unwrap();
    }

    let report = outbox.replay(&Sink::accepting(1)).await.unwrap();
    assert_eq!(report.replayed, 1);
    assert_eq!(report.retained, 2);
    assert_eq!(report.files_rewritten, 1);

    let files = outbox.files().await.unwrap();
    let content = std::fs::read_to_string(&files[0]).unwrap();
    assert_eq!(content.lines().count(), 2);

    // Sink still down: nothing changes on disk.
    let report = outbox.replay(&Sink::accepting(0)).await.unwrap();
    assert_eq!(report.retained, 2);
    assert_eq!(report.files_rewritten, 0);
}

#[tokio::test]
async fn corrupt_lines_are_discarded() {
    let tmp = tempfile::tempdir().unwrap();
    let (outbox, metrics) = outbox(tmp.path(), 10 * 1024 * 1024, 10);
    let good = serde_json::to_string(&event("a")).unwrap();
    std::fs::write(
        tmp.path().join("audit-2024-01-01.jsonl"),
        format!("{{not json\n{good}\n"),
    )
    .unwrap();

    let report = outbox.replay(&Sink::accepting(usize::MAX)).await.unwrap();
    assert_eq!(report.discarded, 1);
    assert_eq!(report.replayed, 1);
    assert_eq!(report.files_deleted, 1);
    assert_eq!(metrics.audit_outbox.get(&[("op", "discarded")]), 1);
}

#[tokio::test]
async fn non_utf8_line_does_not_block_later_files() {
    let tmp = tempfile::tempdir().unwrap();
    let (outbox, metrics) = outbox(tmp.path(), 10 * 1024 * 1024, 10);
    let first = event("a");
    let second = event("b");

    let mut oldest = b"\xff\xfe garbage\n".to_vec();
    oldest.extend_from_slice(serde_json::to_string(&first).unwrap().as_bytes());
    oldest.push(b'\n');
    std::fs::write(tmp.path().join("audit-2024-01-01.jsonl"), oldest).unwrap();
    std::fs::write(
        tmp.path().join("audit-2024-01-02.jsonl"),
        format!("{}\n", serde_json::to_string(&second).unwrap()),
    )
    .unwrap();

    let sink = Sink::accepting(usize::MAX);
    let report = outbox.replay(&sink).await.unwrap();
    assert_eq!(report.discarded, 1);
    assert_eq!(report.replayed, 2);
    assert_eq!(report.files_deleted, 2);
    assert!(outbox.files().await.unwrap().is_empty());
    assert_eq!(
        *sink.got.lock().unwrap(),
        vec![first.event_id().to_string(), second.event_id().to_string()]
    );
    assert_eq!(metrics.audit_outbox.get(&[("op", "discarded")]), 1);
}

#[tokio::test]
async fn unreadable_file_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let (outbox, metrics) = outbox(tmp.path(), 10 * 1024 * 1024, 10);
    // A directory with a spool name cannot be read as a file.
    std::fs::create_dir(tmp.path().join("audit-2024-01-01.jsonl")).unwrap();
    std::fs::write(
        tmp.path().join("audit-2024-01-02.jsonl"),
        format!("{}\n", serde_json::to_string(&event("b")).unwrap()),
    )
    .unwrap();

    let report = outbox.replay(&Sink::accepting(usize::MAX)).await.unwrap();
    assert_eq!(report.replayed, 1);
    assert_eq!(metrics.audit_outbox.get(&[("op", "failed")]), 1);
}

#[tokio::test]
async fn full_file_rotates_to_timestamped_name() {
    let tmp = tempfile::tempdir().unwrap();
    let (outbox, _) = outbox(tmp.path(), 1, 10);
    outbox.append(&event("a")).await.unwrap();
    outbox.append(&event("b")).await.unwrap();

    let names = file_names(&outbox.files().await.unwrap());
    assert_eq!(names.len(), 2, "{names:?}");
    // audit-YYYY-MM-DD.jsonl then audit-YYYY-MM-DD-HHMMSS.jsonl
    assert_eq!(names[0].len(), "audit-2024-01-01.jsonl".len());
    assert_eq!(names[1].len(), "audit-2024-01-01-120000.jsonl".len());
    assert!(names[1].starts_with(names[0].trim_end_matches(".jsonl")));
}

#[tokio::test]
async fn oldest_files_are_evicted_past_max_files() {
    let tmp = tempfile::tempdir().unwrap();
    let line = format!("{}\n", serde_json::to_string(&event("old")).unwrap());
    std::fs::write(tmp.path().join("audit-2020-01-01.jsonl"), &line).unwrap();
    std::fs::write(tmp.path().join("audit-2020-01-02.jsonl"), &line).unwrap();
    std::fs::write(tmp.path().join("unrelated.txt"), "keep me").unwrap();

    let (outbox, metrics) = outbox(tmp.path(), 10 * 1024 * 1024, 2);
    outbox.append(&event("new")).await.unwrap();

    let names = file_names(&outbox.files().await.unwrap());
    assert_eq!(names.len(), 2);
    assert_eq!(names[0], "audit-2020-01-02.jsonl");
    assert_eq!(metrics.audit_outbox.get(&[("op", "evicted")]), 1);
    assert!(tmp.path().join("unrelated.txt").exists());
}

#[tokio::test]
async fn disabled_outbox_refuses_appends() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = OutboxSettings {
        enabled: false,
        dir: tmp.path().to_path_buf(),
        ..Default::default()
    };
    let outbox = AuditOutbox::new(settings, Arc::new(FacadeMetrics::default()));
    assert!(outbox.append(&event("a")).await.is_err());
    let report = outbox.replay(&Sink::accepting(usize::MAX)).await.unwrap();
    assert_eq!(report.replayed, 0);
}
