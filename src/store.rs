//! Local persistence: the in-progress card draft and the history of share
//! links a user has opened. Plain JSON files under the platform data
//! directory; corrupt or missing files read as empty state rather than
//! erroring, so a bad write never bricks the editor.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{KosmaError, KosmaResult};
use crate::model::Card;

const DRAFT_FILE: &str = "draft.json";
const HISTORY_FILE: &str = "history.json";

/// One previously-viewed shared card, kept so the viewer can show a
/// "recently seen" list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    /// The card as reconstructed at view time (images absent by design of
    /// the share codec).
    pub data: Card,
    /// Unix milliseconds at first view.
    pub timestamp: u64,
}

/// File-backed store rooted at a directory. Production code uses
/// [`Store::open_default`]; tests point it at a temp dir.
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the platform data dir (`~/.local/share/kosma` on Linux).
    pub fn open_default() -> KosmaResult<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| KosmaError::validation("no platform data directory"))?;
        Ok(Self::new(base.join("kosma")))
    }

    fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> KosmaResult<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            KosmaError::validation(format!("create {}: {e}", self.root.display()))
        })?;
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| KosmaError::validation(format!("serialize {file}: {e}")))?;
        let path = self.path(file);
        fs::write(&path, json)
            .map_err(|e| KosmaError::validation(format!("write {}: {e}", path.display())))?;
        Ok(())
    }

    /// Read and parse, treating every failure mode as "nothing stored".
    fn read_json<T: for<'de> Deserialize<'de>>(&self, file: &str) -> Option<T> {
        let path = self.path(file);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), %e, "stored file unreadable, ignoring");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(path = %path.display(), %e, "stored file corrupt, ignoring");
                None
            }
        }
    }

    pub fn save_draft(&self, card: &Card) -> KosmaResult<()> {
        self.write_json(DRAFT_FILE, card)
    }

    /// The saved draft, or `None` when absent or unparseable.
    pub fn load_draft(&self) -> Option<Card> {
        self.read_json(DRAFT_FILE)
    }

    pub fn clear_draft(&self) -> KosmaResult<()> {
        let path = self.path(DRAFT_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KosmaError::validation(format!(
                "remove {}: {e}",
                path.display()
            ))),
        }
    }

    /// All recorded views, newest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.read_json(HISTORY_FILE).unwrap_or_default()
    }

    /// Record a viewed share. A share id is recorded once; revisits keep
    /// the original entry and timestamp.
    pub fn record_view(&self, id: &str, data: Card, timestamp: u64) -> KosmaResult<()> {
        let mut entries = self.history();
        if entries.iter().any(|e| e.id == id) {
            return Ok(());
        }
        entries.insert(
            0,
            HistoryEntry {
                id: id.to_string(),
                data,
                timestamp,
            },
        );
        self.write_json(HISTORY_FILE, &entries)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("kosma"));
        (dir, store)
    }

    fn viewed_card(name: &str) -> Card {
        let mut card = Card::empty();
        card.name = name.to_string();
        card
    }

    #[test]
    fn draft_roundtrip() {
        let (_dir, store) = temp_store();
        assert!(store.load_draft().is_none());

        let mut card = Card::empty();
        card.name = "Iris Vale".to_string();
        card.email = "iris@example.com".to_string();
        store.save_draft(&card).unwrap();
        assert_eq!(store.load_draft(), Some(card));

        store.clear_draft().unwrap();
        assert!(store.load_draft().is_none());
        store.clear_draft().unwrap();
    }

    #[test]
    fn corrupt_draft_reads_as_absent() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.root().join(DRAFT_FILE), b"{not json").unwrap();
        assert!(store.load_draft().is_none());
    }

    #[test]
    fn history_records_once_per_id_newest_first() {
        let (_dir, store) = temp_store();
        store.record_view("aaa", viewed_card("A"), 100).unwrap();
        store.record_view("bbb", viewed_card("B"), 200).unwrap();
        // Revisit keeps the original entry.
        store.record_view("aaa", viewed_card("A2"), 300).unwrap();

        let hist = store.history();
        assert_eq!(hist.len(), 2);
        assert_eq!(hist[0].id, "bbb");
        assert_eq!(hist[1].id, "aaa");
        assert_eq!(hist[1].data.name, "A");
        assert_eq!(hist[1].timestamp, 100);
    }

    #[test]
    fn corrupt_history_starts_fresh() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.root().join(HISTORY_FILE), b"42").unwrap();
        assert!(store.history().is_empty());
        store.record_view("ccc", viewed_card("C"), 1).unwrap();
        assert_eq!(store.history().len(), 1);
    }
}
