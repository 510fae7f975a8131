use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use draglog_types::Score;

use crate::emulator::ensure_finite;
use crate::error::LedgerError;

/// One checkpoint: the feedback note and the full score table written with it.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotEntry {
    pub feedback: String,
    pub scores: BTreeMap<String, Score>,
}

/// Append-only trail of reliability checkpoints.
///
/// Each checkpoint is two lines, in order:
/// ```text
/// "<feedback note as a JSON string>"
/// {"<source>":<score>,...}
/// ```
/// Lines are never rewritten; only the reset path removes the file.
#[derive(Clone, Debug)]
pub struct SnapshotTrail {
    path: PathBuf,
}

impl SnapshotTrail {
    /// Open the trail at `path`, creating it empty if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path })
    }

    /// Append one `(feedback, scores)` checkpoint. A table holding a
    /// non-finite score is refused and nothing is written.
    pub fn append(&self, feedback: &str, scores: &BTreeMap<String, Score>) -> Result<(), LedgerError> {
        for (id, score) in scores {
            ensure_finite(id, *score)?;
        }
        let note = serde_json::to_string(feedback)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        let table = serde_json::to_string(scores)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(format!("{note}\n{table}\n").as_bytes())?;
        file.flush()?;

        info!(sources = scores.len(), feedback, "reliability snapshot written");
        Ok(())
    }

    /// Every checkpoint, oldest first.
    pub fn entries(&self) -> Result<Vec<SnapshotEntry>, LedgerError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| (i + 1, l))
            .collect();

        let mut entries = Vec::with_capacity(lines.len() / 2);
        for pair in lines.chunks(2) {
            let (note_line, note) = pair[0];
            let Some(&(table_line, table)) = pair.get(1) else {
                return Err(LedgerError::CorruptSnapshot {
                    line: note_line,
                    reason: "feedback note without a score table".into(),
                });
            };

            let feedback: String = serde_json::from_str(note).map_err(|e| LedgerError::CorruptSnapshot {
                line: note_line,
                reason: e.to_string(),
            })?;
            let scores: BTreeMap<String, Score> =
                serde_json::from_str(table).map_err(|e| LedgerError::CorruptSnapshot {
                    line: table_line,
                    reason: e.to_string(),
                })?;
            entries.push(SnapshotEntry { feedback, scores });
        }

        debug!(entries = entries.len(), "snapshot trail read");
        Ok(entries)
    }

    /// Score table written with the most recent checkpoint tagged `feedback`.
    pub fn state_at(&self, feedback: &str) -> Result<Option<BTreeMap<String, Score>>, LedgerError> {
        let entries = self.entries()?;
        Ok(entries
            .into_iter()
            .rev()
            .find(|e| e.feedback == feedback)
            .map(|e| e.scores))
    }

    /// Score table of the checkpoint immediately preceding the most recent
    /// one tagged `feedback`, i.e. the state before that feedback was applied.
    pub fn state_before(&self, feedback: &str) -> Result<Option<BTreeMap<String, Score>>, LedgerError> {
        let mut entries = self.entries()?;
        let Some(pos) = entries.iter().rposition(|e| e.feedback == feedback) else {
            return Ok(None);
        };
        if pos == 0 {
            return Ok(None);
        }
        Ok(Some(entries.swap_remove(pos - 1).scores))
    }

    /// Remove the trail file. Removing an absent file is not an error.
    pub fn truncate(&self) -> Result<(), LedgerError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, Score)]) -> BTreeMap<String, Score> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn non_finite_table_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let trail = SnapshotTrail::open(dir.path().join("h.log")).unwrap();
        trail.append("", &table(&[("s", 1.0)])).unwrap();

        let err = trail
            .append("fb", &table(&[("s", 1.0), ("t", f32::INFINITY)]))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NonFiniteScore { source_id, .. } if source_id == "t"));
        assert_eq!(trail.entries().unwrap().len(), 1);
    }

    #[test]
    fn checkpoint_is_two_lines() {
        let dir = tempfile::tempdir().unwrap();
        let trail = SnapshotTrail::open(dir.path().join("h.log")).unwrap();
        trail.append("feedback A", &table(&[("src1", 1.0)])).unwrap();

        let text = fs::read_to_string(trail.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![r#""feedback A""#, r#"{"src1":1.0}"#]);
    }

    #[test]
    fn entries_pair_up_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let trail = SnapshotTrail::open(dir.path().join("h.log")).unwrap();
        trail.append("", &table(&[("a", 0.5)])).unwrap();
        trail.append("f1", &table(&[("a", 0.7)])).unwrap();
        trail.append("multi\nline", &table(&[("a", 0.9), ("b", 1.0)])).unwrap();

        let entries = trail.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].feedback, "");
        assert_eq!(entries[1].scores, table(&[("a", 0.7)]));
        assert_eq!(entries[2].feedback, "multi\nline");
    }

    #[test]
    fn state_at_and_before() {
        let dir = tempfile::tempdir().unwrap();
        let trail = SnapshotTrail::open(dir.path().join("h.log")).unwrap();
        trail.append("", &table(&[("a", 0.5)])).unwrap();
        trail.append("f1", &table(&[("a", 0.7)])).unwrap();

        assert_eq!(trail.state_at("f1").unwrap(), Some(table(&[("a", 0.7)])));
        assert_eq!(trail.state_before("f1").unwrap(), Some(table(&[("a", 0.5)])));
        assert_eq!(trail.state_before("").unwrap(), None);
        assert_eq!(trail.state_at("nope").unwrap(), None);
    }

    #[test]
    fn dangling_note_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let trail = SnapshotTrail::open(dir.path().join("h.log")).unwrap();
        trail.append("f", &table(&[])).unwrap();
        OpenOptions::new()
            .append(true)
            .open(trail.path())
            .unwrap()
            .write_all(b"\"orphan\"\n")
            .unwrap();

        assert!(matches!(
            trail.entries(),
            Err(LedgerError::CorruptSnapshot { line: 3, .. })
        ));
    }

    #[test]
    fn truncate_twice_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let trail = SnapshotTrail::open(dir.path().join("h.log")).unwrap();
        trail.append("f", &table(&[])).unwrap();
        trail.truncate().unwrap();
        trail.truncate().unwrap();
        assert!(trail.entries().unwrap().is_empty());
    }
}
