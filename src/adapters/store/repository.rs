use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{CityId, FetchRecord, StatusRecord};
use crate::error::{ClimaError, Result};

use super::atomic;

const LATEST_FILE: &str = "latest.json";
const STATUS_FILE: &str = "status.json";
const SNAPSHOTS_DIR: &str = "snapshots";
const SNAPSHOT_INDEX: &str = "index.json";
const GRAPHS_DIR: &str = "graphs";

/// One retained snapshot; `seq` grows monotonically per city
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub seq: u64,
    pub file: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SnapshotIndex {
    next_seq: u64,
    entries: Vec<SnapshotEntry>,
}

/// Per-city on-disk state under `<root>/cities/<id>/`.
///
/// Only the scheduler writes here; readers rely on atomic replacement.
#[derive(Debug, Clone)]
pub struct CityDataRepository {
    root: PathBuf,
}

impl CityDataRepository {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().join("cities"),
        }
    }

    /// Ids become directory names, so only slug characters are accepted
    pub fn city_dir(&self, city_id: &CityId) -> Result<PathBuf> {
        let id = city_id.as_str();
        let safe = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !safe {
            return Err(ClimaError::NotFound(format!("invalid city id '{}'", id)));
        }
        Ok(self.root.join(id))
    }

    pub fn graphs_dir(&self, city_id: &CityId) -> Result<PathBuf> {
        Ok(self.city_dir(city_id)?.join(GRAPHS_DIR))
    }

    fn snapshots_dir(&self, city_id: &CityId) -> Result<PathBuf> {
        Ok(self.city_dir(city_id)?.join(SNAPSHOTS_DIR))
    }

    /// Overwrite latest, append a snapshot, prune to `retention` newest
    pub fn save_fetch(
        &self,
        city_id: &CityId,
        record: &FetchRecord,
        retention: usize,
    ) -> Result<SnapshotEntry> {
        let city_dir = self.city_dir(city_id)?;
        let snapshots_dir = self.snapshots_dir(city_id)?;
        fs::create_dir_all(&snapshots_dir).map_err(|e| ClimaError::persistence(&snapshots_dir, e))?;

        atomic::write_json(&city_dir.join(LATEST_FILE), record)?;

        let mut index = self.load_index(&snapshots_dir)?;
        let seq = index.next_seq;
        let entry = SnapshotEntry {
            seq,
            file: format!("{:06}_{}.json", seq, record.fetched_at.format("%Y%m%d_%H%M%S")),
            fetched_at: record.fetched_at,
        };
        atomic::write_json(&snapshots_dir.join(&entry.file), record)?;

        index.next_seq = seq + 1;
        index.entries.push(entry.clone());
        index.entries.sort_by_key(|e| e.seq);

        let keep = retention.max(1);
        let excess = index.entries.len().saturating_sub(keep);
        let pruned: Vec<SnapshotEntry> = index.entries.drain(..excess).collect();

        atomic::write_json(&snapshots_dir.join(SNAPSHOT_INDEX), &index)?;

        for old in &pruned {
            if let Err(e) = atomic::remove_file_if_exists(&snapshots_dir.join(&old.file)) {
                warn!("Failed to prune snapshot {} of {}: {}", old.file, city_id, e);
            }
        }
        if !pruned.is_empty() {
            debug!("Pruned {} snapshot(s) of {}", pruned.len(), city_id);
        }

        Ok(entry)
    }

    /// Index on disk, or one rebuilt from snapshot filenames if it is missing or unreadable
    fn load_index(&self, snapshots_dir: &Path) -> Result<SnapshotIndex> {
        let path = snapshots_dir.join(SNAPSHOT_INDEX);
        match atomic::read_json::<SnapshotIndex>(&path) {
            Ok(Some(index)) => return Ok(index),
            Ok(None) => {}
            Err(e) => warn!("Rebuilding snapshot index: {}", e),
        }
        self.rebuild_index(snapshots_dir)
    }

    fn rebuild_index(&self, snapshots_dir: &Path) -> Result<SnapshotIndex> {
        let entries = match fs::read_dir(snapshots_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SnapshotIndex::default()),
            Err(e) => return Err(ClimaError::persistence(snapshots_dir, e)),
        };

        let mut index = SnapshotIndex::default();
        for entry in entries.flatten() {
            let file = entry.file_name().to_string_lossy().into_owned();
            let Some(seq) = file
                .split_once('_')
                .and_then(|(prefix, _)| prefix.parse::<u64>().ok())
            else {
                continue;
            };
            let fetched_at = atomic::read_json::<FetchRecord>(&entry.path())
                .ok()
                .flatten()
                .map(|r| r.fetched_at)
                .unwrap_or_else(Utc::now);
            index.entries.push(SnapshotEntry { seq, file, fetched_at });
        }

        index.entries.sort_by_key(|e| e.seq);
        index.next_seq = index.entries.last().map(|e| e.seq + 1).unwrap_or(0);
        Ok(index)
    }

    /// Retained snapshots, newest first
    pub fn list_snapshots(&self, city_id: &CityId) -> Result<Vec<SnapshotEntry>> {
        let mut entries = self.load_index(&self.snapshots_dir(city_id)?)?.entries;
        entries.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(entries)
    }

    pub fn read_snapshot(&self, city_id: &CityId, entry: &SnapshotEntry) -> Result<Option<FetchRecord>> {
        atomic::read_json(&self.snapshots_dir(city_id)?.join(&entry.file))
    }

    pub fn read_latest(&self, city_id: &CityId) -> Result<Option<FetchRecord>> {
        atomic::read_json(&self.city_dir(city_id)?.join(LATEST_FILE))
    }

    pub fn write_status(&self, city_id: &CityId, ok: bool, message: impl Into<String>) -> Result<StatusRecord> {
        let status = StatusRecord::new(ok, message);
        atomic::write_json(&self.city_dir(city_id)?.join(STATUS_FILE), &status)?;
        Ok(status)
    }

    /// Never fails: a missing record is "not yet updated", an unreadable one is reported as such
    pub fn read_status(&self, city_id: &CityId) -> StatusRecord {
        let path = match self.city_dir(city_id) {
            Ok(dir) => dir.join(STATUS_FILE),
            Err(e) => return StatusRecord::new(false, e.to_string()),
        };
        match atomic::read_json::<StatusRecord>(&path) {
            Ok(Some(status)) => status,
            Ok(None) => StatusRecord::not_yet_updated(),
            Err(e) => {
                warn!("Unreadable status for {}: {}", city_id, e);
                StatusRecord {
                    ok: false,
                    message: "status record is unreadable".to_string(),
                    updated_at: None,
                }
            }
        }
    }

    /// Drop latest, snapshots, status and charts; absent artifacts are fine
    pub fn purge(&self, city_id: &CityId) -> Result<()> {
        let dir = self.city_dir(city_id)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClimaError::persistence(&dir, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Forecast;
    use chrono::Duration;
    use serde_json::json;

    fn record(n: i64) -> FetchRecord {
        FetchRecord {
            fetched_at: Utc::now() + Duration::seconds(n),
            payload: Forecast::new(json!({ "n": n })),
        }
    }

    fn repo() -> (tempfile::TempDir, CityDataRepository, CityId) {
        let dir = tempfile::tempdir().unwrap();
        let repo = CityDataRepository::new(dir.path());
        (dir, repo, CityId::new("valencia_valencia_spain"))
    }

    fn snapshot_files(repo: &CityDataRepository, id: &CityId) -> Vec<String> {
        let mut files: Vec<String> = fs::read_dir(repo.snapshots_dir(id).unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|f| f != SNAPSHOT_INDEX)
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_retention_one_keeps_single_snapshot() {
        let (_dir, repo, id) = repo();
        repo.save_fetch(&id, &record(1), 1).unwrap();
        repo.save_fetch(&id, &record(2), 1).unwrap();

        assert_eq!(snapshot_files(&repo, &id).len(), 1);
        let latest = repo.read_latest(&id).unwrap().unwrap();
        assert_eq!(latest.payload.as_value()["n"], 2);

        let only = &repo.list_snapshots(&id).unwrap()[0];
        let snap = repo.read_snapshot(&id, only).unwrap().unwrap();
        assert_eq!(snap.payload.as_value()["n"], 2);
    }

    #[test]
    fn test_pruning_keeps_most_recent() {
        let (_dir, repo, id) = repo();
        for n in 0..7 {
            repo.save_fetch(&id, &record(n), 3).unwrap();
        }

        let entries = repo.list_snapshots(&id).unwrap();
        let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![6, 5, 4]);
        assert_eq!(snapshot_files(&repo, &id).len(), 3);

        for (entry, expected) in entries.iter().zip([6, 5, 4]) {
            let snap = repo.read_snapshot(&id, entry).unwrap().unwrap();
            assert_eq!(snap.payload.as_value()["n"], expected);
        }
    }

    #[test]
    fn test_shrinking_retention_prunes_on_next_save() {
        let (_dir, repo, id) = repo();
        for n in 0..5 {
            repo.save_fetch(&id, &record(n), 10).unwrap();
        }
        repo.save_fetch(&id, &record(5), 2).unwrap();
        assert_eq!(snapshot_files(&repo, &id).len(), 2);
    }

    #[test]
    fn test_index_rebuilt_when_lost() {
        let (_dir, repo, id) = repo();
        for n in 0..3 {
            repo.save_fetch(&id, &record(n), 5).unwrap();
        }
        fs::remove_file(repo.snapshots_dir(&id).unwrap().join(SNAPSHOT_INDEX)).unwrap();

        let entry = repo.save_fetch(&id, &record(3), 5).unwrap();
        assert_eq!(entry.seq, 3);
        assert_eq!(repo.list_snapshots(&id).unwrap().len(), 4);
    }

    #[test]
    fn test_status_default_and_write() {
        let (_dir, repo, id) = repo();
        let status = repo.read_status(&id);
        assert!(!status.ok);
        assert_eq!(status.message, "not yet updated");

        repo.write_status(&id, true, "OK").unwrap();
        let status = repo.read_status(&id);
        assert!(status.ok);
        assert!(status.updated_at.is_some());
    }

    #[test]
    fn test_purge_removes_everything_and_tolerates_absence() {
        let (_dir, repo, id) = repo();
        repo.save_fetch(&id, &record(1), 3).unwrap();
        repo.write_status(&id, true, "OK").unwrap();
        fs::create_dir_all(repo.graphs_dir(&id).unwrap()).unwrap();
        fs::write(repo.graphs_dir(&id).unwrap().join("temp.png"), b"png").unwrap();

        repo.purge(&id).unwrap();
        assert!(!repo.city_dir(&id).unwrap().exists());
        assert!(repo.read_latest(&id).unwrap().is_none());

        repo.purge(&id).unwrap();
    }

    #[test]
    fn test_unsafe_ids_are_rejected() {
        let (_dir, repo, _) = repo();
        assert!(repo.city_dir(&CityId::new("../etc")).is_err());
        assert!(repo.city_dir(&CityId::new("")).is_err());
    }
}
