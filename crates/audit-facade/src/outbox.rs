//! JSON-lines spool for events the sink could not take.
//!
//! Layout: `audit-YYYY-MM-DD.jsonl`, then `audit-YYYY-MM-DD-HHMMSS.jsonl`
//! once the newest file of the day is full. Names sort chronologically, so
//! replay and eviction both work oldest first.
//!
//! All file access goes through one async lock: an append never interleaves
//! with a replay rewriting the same file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use access_facade_core::error::{AccessFacadeError, Result};
use access_facade_core::model::AuditEvent;
use access_facade_core::obs::FacadeMetrics;

use crate::config::OutboxSettings;
use crate::publisher::AuditPublisher;

const PREFIX: &str = "audit-";
const SUFFIX: &str = ".jsonl";

/// Outcome of one replay pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    pub replayed: usize,
    /// Lines kept for the next pass.
    pub retained: usize,
    /// Lines that did not parse and were dropped.
    pub discarded: usize,
    pub files_deleted: usize,
    pub files_rewritten: usize,
}

pub struct AuditOutbox {
    settings: OutboxSettings,
    metrics: Arc<FacadeMetrics>,
    lock: Mutex<()>,
}

/// `(date, time)` parsed from a spool file name; the day's first file has an empty time.
fn sort_key(name: &str) -> Option<(String, String)> {
    let stem = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    let (date, ts) = match stem.len() {
        10 => (stem, ""),
        17 if stem.as_bytes()[10] == b'-' => (&stem[..10], &stem[11..]),
        _ => return None,
    };
    let date_ok = date
        .bytes()
        .enumerate()
        .all(|(i, b)| if i == 4 || i == 7 { b == b'-' } else { b.is_ascii_digit() });
    if !date_ok || !ts.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((date.to_string(), ts.to_string()))
}

fn day_of(now: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        now.year(),
        u8::from(now.month()),
        now.day()
    )
}

fn time_of(now: OffsetDateTime) -> String {
    format!("{:02}{:02}{:02}", now.hour(), now.minute(), now.second())
}

impl AuditOutbox {
    pub fn new(settings: OutboxSettings, metrics: Arc<FacadeMetrics>) -> Self {
        Self {
            settings,
            metrics,
            lock: Mutex::new(()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.settings.dir
    }

    /// Spool files, oldest first.
    pub async fn files(&self) -> Result<Vec<PathBuf>> {
        let mut keyed = Vec::new();
        let mut rd = match fs::read_dir(&self.settings.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = rd.next_entry().await? {
            let name = entry.file_name();
            let Some(key) = name.to_str().and_then(sort_key) else {
                continue;
            };
            keyed.push((key, entry.path()));
        }
        keyed.sort();
        Ok(keyed.into_iter().map(|(_, p)| p).collect())
    }

    async fn target_file(&self, now: OffsetDateTime) -> Result<PathBuf> {
        let day = day_of(now);
        let newest_today = self
            .files()
            .await?
            .into_iter()
            .rev()
            .find(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(sort_key)
                    .is_some_and(|(d, _)| d == day)
            });

        let Some(path) = newest_today else {
            return Ok(self.settings.dir.join(format!("{PREFIX}{day}{SUFFIX}")));
        };
        let size = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        if size < self.settings.max_file_size_bytes {
            return Ok(path);
        }
        // A second rotation within the same second reuses the name.
        Ok(self
            .settings
            .dir
            .join(format!("{PREFIX}{day}-{}{SUFFIX}", time_of(now))))
    }

    /// Append one event as a JSON line.
    pub async fn append(&self, event: &AuditEvent) -> Result<()> {
        if !self.settings.enabled {
            return Err(AccessFacadeError::Unavailable("audit outbox disabled".into()));
        }
        let _guard = self.lock.lock().await;
        match self.append_locked(event).await {
            Ok(()) => {
                self.metrics.audit_outbox.inc(&[("op", "appended")]);
                tracing::debug!(event_id = %event.event_id(), "audit event spooled to outbox");
                Ok(())
            }
            Err(e) => {
                self.metrics.audit_outbox.inc(&[("op", "failed")]);
                tracing::error!(event_id = %event.event_id(), error = %e, "audit outbox append failed");
                Err(e)
            }
        }
    }

    async fn append_locked(&self, event: &AuditEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)
            .map_err(|e| AccessFacadeError::Internal(format!("audit encode: {e}")))?;
        line.push('\n');

        fs::create_dir_all(&self.settings.dir).await?;
        let path = self.target_file(OffsetDateTime::now_utc()).await?;
        let created = !fs::try_exists(&path).await.unwrap_or(false);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        if created {
            self.evict_locked().await?;
        }
        Ok(())
    }

    async fn evict_locked(&self) -> Result<()> {
        let files = self.files().await?;
        if files.len() <= self.settings.max_files {
            return Ok(());
        }
        let excess = files.len() - self.settings.max_files;
        for path in files.into_iter().take(excess) {
            fs::remove_file(&path).await?;
            self.metrics.audit_outbox.inc(&[("op", "evicted")]);
            tracing::warn!(file = %path.display(), "audit outbox full, evicted oldest file");
        }
        Ok(())
    }

    /// Republish spooled events, oldest first.
    ///
    /// After the first publish failure the rest of the pass only retains lines;
    /// the sink is assumed down until the next pass. A file that cannot be read
    /// or rewritten is skipped so newer files still drain.
    pub async fn replay(&self, publisher: &dyn AuditPublisher) -> Result<ReplayReport> {
        let mut report = ReplayReport::default();
        if !self.settings.enabled {
            return Ok(report);
        }
        let _guard = self.lock.lock().await;
        let mut sink_down = false;

        for path in self.files().await? {
            if let Err(e) = self
                .replay_file(&path, publisher, &mut sink_down, &mut report)
                .await
            {
                self.metrics.audit_outbox.inc(&[("op", "failed")]);
                tracing::error!(file = %path.display(), error = %e, "outbox file replay failed");
            }
        }

        if report.replayed > 0 || report.discarded > 0 {
            tracing::info!(
                replayed = report.replayed,
                retained = report.retained,
                discarded = report.discarded,
                "audit outbox replay"
            );
        }
        Ok(report)
    }

    async fn replay_file(
        &self,
        path: &Path,
        publisher: &dyn AuditPublisher,
        sink_down: &mut bool,
        report: &mut ReplayReport,
    ) -> Result<()> {
        let content = fs::read(path).await?;
        let mut kept: Vec<&[u8]> = Vec::new();
        let mut changed = false;

        for line in content
            .split(|b| *b == b'\n')
            .filter(|l| !l.trim_ascii().is_empty())
        {
            let parsed = std::str::from_utf8(line)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str::<AuditEvent>(s).map_err(|e| e.to_string()));
            let event = match parsed {
                Ok(ev) => ev,
                Err(e) => {
                    report.discarded += 1;
                    changed = true;
                    self.metrics.audit_outbox.inc(&[("op", "discarded")]);
                    tracing::warn!(file = %path.display(), error = %e, "discarding corrupt outbox line");
                    continue;
                }
            };
            if *sink_down {
                kept.push(line);
                continue;
            }
            match publisher.publish(&event).await {
                Ok(()) => {
                    report.replayed += 1;
                    changed = true;
                    self.metrics.audit_outbox.inc(&[("op", "replayed")]);
                }
                Err(e) => {
                    tracing::warn!(event_id = %event.event_id(), error = %e, "outbox replay stalled");
                    *sink_down = true;
                    kept.push(line);
                }
            }
        }

        report.retained += kept.len();
        if kept.is_empty() {
            fs::remove_file(path).await?;
            report.files_deleted += 1;
        } else if changed {
            let mut body = kept.join(&b'\n');
            body.push(b'\n');
            let tmp = path.with_extension("jsonl.tmp");
            fs::write(&tmp, body).await?;
            fs::rename(&tmp, path).await?;
            report.files_rewritten += 1;
        }
        Ok(())
    }
}
