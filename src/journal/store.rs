use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use alloy::primitives::B256;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tracing::{debug, warn};

use super::models::{JournalEntry, JournalKind};
use crate::error::RecoveryResult;

/// Append-only journals under one storage directory - the only state shared
/// between the scan and submit phases.
pub struct RecoveryJournal {
    dir: PathBuf,
}

impl RecoveryJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: JournalKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Append one record and flush it to disk before returning.
    ///
    /// A fragment left by an interrupted append is sealed with a newline
    /// first so the new record always starts on its own line.
    pub async fn append(&self, kind: JournalKind, entry: &JournalEntry) -> RecoveryResult<()> {
        let line = entry.encode_line()?;
        fs::create_dir_all(&self.dir).await?;

        let path = self.path(kind);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;

        let len = file.metadata().await?.len();
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).await?;
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                warn!("⚠️ Sealing torn record at end of {}", path.display());
                file.write_all(b"\n").await?;
            }
        }

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;

        debug!(request_id = %entry.request_id(), journal = kind.file_name(), "Journal record appended");
        Ok(())
    }

    /// Replay a journal in order. A missing file is an empty journal.
    /// Records under the legacy file name come first.
    pub async fn read(&self, kind: JournalKind) -> RecoveryResult<Vec<JournalEntry>> {
        let mut entries = Vec::new();
        if let Some(legacy) = kind.legacy_file_name() {
            let path = self.dir.join(legacy);
            let legacy_entries = read_records(&path).await?;
            if !legacy_entries.is_empty() {
                debug!("Replayed {} records from {}", legacy_entries.len(), path.display());
            }
            entries.extend(legacy_entries);
        }
        entries.extend(read_records(&self.path(kind)).await?);
        Ok(entries)
    }

    pub async fn request_ids(&self, kind: JournalKind) -> RecoveryResult<HashSet<B256>> {
        Ok(self
            .read(kind)
            .await?
            .iter()
            .map(JournalEntry::request_id)
            .collect())
    }
}

/// Only lines terminated by `,` and a newline are complete records; anything
/// else is a torn write and is skipped with a warning.
async fn read_records(path: &Path) -> RecoveryResult<Vec<JournalEntry>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for (index, segment) in content.split_inclusive('\n').enumerate() {
        let record = segment.trim();
        if record.is_empty() {
            continue;
        }
        if !segment.ends_with('\n') || !record.ends_with(',') {
            warn!(
                "⚠️ Ignoring incomplete record at {}:{}",
                path.display(),
                index + 1
            );
            continue;
        }
        match JournalEntry::decode_line(record) {
            Ok(entry) => entries.push(entry),
            Err(_) if is_truncated(record) => {
                warn!("⚠️ Ignoring sealed torn record at {}:{}", path.display(), index + 1);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(entries)
}

// A sealed fragment of an interrupted append is JSON cut short
fn is_truncated(record: &str) -> bool {
    let body = record.strip_suffix(',').unwrap_or(record);
    matches!(serde_json::from_str::<serde_json::Value>(body), Err(e) if e.is_eof())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::gateway::testing::request_log;
    use crate::request::OracleRequest;
    use alloy::primitives::U256;

    fn temp_journal() -> RecoveryJournal {
        RecoveryJournal::new(std::env::temp_dir().join(format!("request-recovery-{}", uuid::Uuid::new_v4())))
    }

    fn entry(byte: u8) -> JournalEntry {
        let log = request_log(B256::repeat_byte(byte), U256::from(1_000u64), 10);
        JournalEntry::pending(&OracleRequest::decode(&log).unwrap())
    }

    #[tokio::test]
    async fn test_missing_journal_is_empty() {
        let journal = temp_journal();
        assert!(journal.read(JournalKind::Pending).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_preserves_order_per_kind() {
        let journal = temp_journal();
        journal.append(JournalKind::Pending, &entry(1)).await.unwrap();
        journal.append(JournalKind::Pending, &entry(2)).await.unwrap();
        journal.append(JournalKind::Fulfilled, &entry(3)).await.unwrap();

        let pending = journal.read(JournalKind::Pending).await.unwrap();
        assert_eq!(pending, vec![entry(1), entry(2)]);

        let fulfilled = journal.request_ids(JournalKind::Fulfilled).await.unwrap();
        assert!(fulfilled.contains(&B256::repeat_byte(3)));
        assert_eq!(fulfilled.len(), 1);

        let _ = fs::remove_dir_all(journal.dir()).await;
    }

    #[tokio::test]
    async fn test_crash_between_appends_keeps_prior_records() {
        let journal = temp_journal();
        journal.append(JournalKind::Pending, &entry(1)).await.unwrap();

        // Half of the next record reached the disk before the crash
        let torn = entry(2).encode_line().unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(journal.path(JournalKind::Pending))
            .await
            .unwrap();
        file.write_all(&torn.as_bytes()[..torn.len() / 2]).await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        assert_eq!(journal.read(JournalKind::Pending).await.unwrap(), vec![entry(1)]);

        // The next run keeps appending after the fragment
        journal.append(JournalKind::Pending, &entry(3)).await.unwrap();
        assert_eq!(
            journal.read(JournalKind::Pending).await.unwrap(),
            vec![entry(1), entry(3)]
        );

        let _ = fs::remove_dir_all(journal.dir()).await;
    }

    #[tokio::test]
    async fn test_sealed_fragment_ending_in_comma_is_skipped() {
        let journal = temp_journal();
        fs::create_dir_all(journal.dir()).await.unwrap();
        let first = entry(1).encode_line().unwrap();
        fs::write(journal.path(JournalKind::Pending), format!("{}{{\"version\":2,\n", first))
            .await
            .unwrap();

        assert_eq!(journal.read(JournalKind::Pending).await.unwrap(), vec![entry(1)]);

        fs::write(journal.path(JournalKind::Pending), "{\"version\":2,\"args\":7},\n")
            .await
            .unwrap();
        assert!(journal.read(JournalKind::Pending).await.is_err());

        let _ = fs::remove_dir_all(journal.dir()).await;
    }

    #[tokio::test]
    async fn test_reads_positional_journal_files() {
        let journal = temp_journal();
        fs::create_dir_all(journal.dir()).await.unwrap();
        let content = concat!(
            r#"["0x0101010101010101010101010101010101010101010101010101010101010101","5","0x2222222222222222222222222222222222222222","0xdeadbeef","1700000000","0x000000000000000000000000000000000000000000000000000000c2797eab80"],"#,
            "\n"
        );
        fs::write(journal.path(JournalKind::Pending), content).await.unwrap();

        let entries = journal.read(JournalKind::Pending).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].args.payment, U256::from(5u64));

        let _ = fs::remove_dir_all(journal.dir()).await;
    }

    #[tokio::test]
    async fn test_pending_reads_legacy_file_name_first() {
        let journal = temp_journal();
        fs::create_dir_all(journal.dir()).await.unwrap();
        fs::write(
            journal.dir().join("unfullfilled_requests"),
            entry(1).encode_line().unwrap(),
        )
        .await
        .unwrap();
        journal.append(JournalKind::Pending, &entry(2)).await.unwrap();

        assert_eq!(
            journal.read(JournalKind::Pending).await.unwrap(),
            vec![entry(1), entry(2)]
        );
        // Appends never touch the legacy file
        let legacy = fs::read_to_string(journal.dir().join("unfullfilled_requests")).await.unwrap();
        assert_eq!(legacy, entry(1).encode_line().unwrap());
        assert!(journal.read(JournalKind::Fulfilled).await.unwrap().is_empty());

        let _ = fs::remove_dir_all(journal.dir()).await;
    }
}
