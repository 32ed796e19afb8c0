//! Append-only publication ledger
//!
//! Each channel keeps a durable history of completed publications as a plain
//! text file, one `<ISO-8601 instant>,<artifact filename>` line per entry.
//! The ledger is the source of truth for rate limiting: the *last* line is
//! authoritative for computing the next legal publish time, even when
//! concurrent publishes across different time slots complete out of order and
//! leave earlier lines with later timestamps. Historical lines are never
//! rewritten.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::scheduler::error::{SchedulerError, SchedulerResult};

/// One durable publication record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Instant the publication was planned for
    pub published_at: DateTime<Utc>,

    /// File name of the published artifact
    pub artifact: String,
}

impl LedgerEntry {
    /// Create a new ledger entry
    pub fn new(published_at: DateTime<Utc>, artifact: impl Into<String>) -> Self {
        Self {
            published_at,
            artifact: artifact.into(),
        }
    }

    /// Serialize to the on-disk line format (without trailing newline)
    pub fn to_line(&self) -> String {
        format!(
            "{},{}",
            self.published_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.artifact
        )
    }

    /// Parse one ledger line
    ///
    /// A malformed line is an error, never a silent default: treating a
    /// corrupt tail as "no history" would bypass the rate limit.
    pub fn parse(line: &str) -> SchedulerResult<Self> {
        let (timestamp, artifact) = line
            .split_once(',')
            .ok_or_else(|| SchedulerError::ledger_parse(line, "missing ',' separator"))?;

        let published_at = DateTime::parse_from_rfc3339(timestamp.trim())
            .map_err(|e| SchedulerError::ledger_parse(line, e.to_string()))?
            .with_timezone(&Utc);

        let artifact = artifact.trim();
        if artifact.is_empty() {
            return Err(SchedulerError::ledger_parse(line, "empty artifact name"));
        }

        Ok(Self {
            published_at,
            artifact: artifact.to_string(),
        })
    }
}

/// Append-only per-channel publication history
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Create a ledger handle for the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The ledger's file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the authoritative tail entry
    ///
    /// Returns `Ok(None)` when the ledger does not exist yet or holds no
    /// entries. A malformed tail line is a hard error.
    pub async fn last_entry(&self) -> SchedulerResult<Option<LedgerEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SchedulerError::io_error("read_ledger", e.to_string())),
        };

        match content.lines().filter(|l| !l.trim().is_empty()).last() {
            Some(line) => LedgerEntry::parse(line).map(Some),
            None => Ok(None),
        }
    }

    /// Append one entry, creating the file if needed
    pub async fn append(&self, entry: &LedgerEntry) -> SchedulerResult<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| SchedulerError::io_error("open_ledger", e.to_string()))?;

        file.write_all(format!("{}\n", entry.to_line()).as_bytes())
            .await
            .map_err(|e| SchedulerError::io_error("append_ledger", e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| SchedulerError::io_error("flush_ledger", e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry_at(y: i32, m: u32, d: u32) -> LedgerEntry {
        let at = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
        LedgerEntry::new(at, "clip.mp4")
    }

    #[test]
    fn test_entry_line_roundtrip() {
        let entry = entry_at(2024, 3, 1);
        let line = entry.to_line();

        assert_eq!(line, "2024-03-01T12:00:00Z,clip.mp4");
        assert_eq!(LedgerEntry::parse(&line).unwrap(), entry);
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        let err = LedgerEntry::parse("2024-03-01T12:00:00Z clip.mp4").unwrap_err();
        assert!(matches!(err, SchedulerError::LedgerParse { .. }));
    }

    #[test]
    fn test_parse_rejects_bad_timestamp() {
        let err = LedgerEntry::parse("yesterday,clip.mp4").unwrap_err();
        assert!(matches!(err, SchedulerError::LedgerParse { .. }));
    }

    #[test]
    fn test_parse_rejects_empty_artifact() {
        let err = LedgerEntry::parse("2024-03-01T12:00:00Z,").unwrap_err();
        assert!(matches!(err, SchedulerError::LedgerParse { .. }));
    }

    #[test]
    fn test_parse_allows_commas_in_artifact_only_after_first() {
        // split is on the first comma; artifact names keep the rest verbatim
        let entry = LedgerEntry::parse("2024-03-01T12:00:00Z,a,b.mp4").unwrap();
        assert_eq!(entry.artifact, "a,b.mp4");
    }

    #[tokio::test]
    async fn test_missing_ledger_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("upload_history.txt"));

        assert_eq!(ledger.last_entry().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_append_then_last_entry() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("upload_history.txt"));

        let first = entry_at(2024, 3, 1);
        let second = LedgerEntry::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 17, 0, 0).unwrap(),
            "clip_two.mp4",
        );

        ledger.append(&first).await.unwrap();
        ledger.append(&second).await.unwrap();

        assert_eq!(ledger.last_entry().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_last_line_wins_over_timestamp_order() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("upload_history.txt"));

        // a later-slot publish finishing first leaves a newer timestamp
        // above the tail; the tail still wins
        let late_slot = LedgerEntry::new(
            Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap(),
            "late.mp4",
        );
        let early_slot = entry_at(2024, 3, 1);

        ledger.append(&late_slot).await.unwrap();
        ledger.append(&early_slot).await.unwrap();

        assert_eq!(ledger.last_entry().await.unwrap(), Some(early_slot));
    }

    #[tokio::test]
    async fn test_malformed_tail_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload_history.txt");
        tokio::fs::write(&path, "2024-03-01T12:00:00Z,ok.mp4\nnot a ledger line\n")
            .await
            .unwrap();

        let ledger = Ledger::new(&path);
        assert!(ledger.last_entry().await.is_err());
    }
}
