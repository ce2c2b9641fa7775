use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use tracing::warn;

/// Last-selected group per file, ordered by recency and capped.
///
/// Persisted as a versioned JSON list of `(path, group id)` pairs and
/// reloaded at workspace open, so last-selected lookups work before any
/// index activity. Files written by a different format version are
/// discarded rather than migrated.
#[derive(Debug)]
pub struct GroupHistory {
    entries: IndexMap<PathBuf, String>,
    capacity: usize,
}

#[derive(Serialize, Deserialize)]
struct PersistedHistory {
    version: u32,
    entries: Vec<PersistedEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    path: PathBuf,
    group_id: String,
}

impl GroupHistory {
    const CURRENT_VERSION: u32 = 1;
    const HISTORY_FILENAME: &'static str = "group-history.json";

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity,
        }
    }

    /// Load persisted history from `state_dir`. Missing, corrupt or
    /// version-mismatched files yield an empty history with a warning;
    /// history loss is never fatal.
    pub fn load(state_dir: &Path, capacity: usize) -> Self {
        let path = state_dir.join(Self::HISTORY_FILENAME);
        if !path.exists() {
            return Self::new(capacity);
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!("failed to read group history at {path:?}: {err}");
                return Self::new(capacity);
            }
        };
        let persisted: PersistedHistory = match serde_json::from_str(&content) {
            Ok(persisted) => persisted,
            Err(err) => {
                warn!("group history at {path:?} is unreadable ({err}); starting empty");
                return Self::new(capacity);
            }
        };
        if persisted.version != Self::CURRENT_VERSION {
            warn!(
                "group history version mismatch: {} vs {}; starting empty",
                persisted.version,
                Self::CURRENT_VERSION
            );
            return Self::new(capacity);
        }

        let mut history = Self::new(capacity);
        for entry in persisted.entries {
            history.record(entry.path, entry.group_id);
        }
        history
    }

    /// Write the history to `state_dir` atomically (temp file + rename).
    pub fn save(&self, state_dir: &Path) -> io::Result<()> {
        fs::create_dir_all(state_dir)?;
        let path = state_dir.join(Self::HISTORY_FILENAME);
        let tmp_path = state_dir.join(format!("{}.tmp", Self::HISTORY_FILENAME));

        let persisted = PersistedHistory {
            version: Self::CURRENT_VERSION,
            entries: self
                .entries
                .iter()
                .map(|(path, group_id)| PersistedEntry {
                    path: path.clone(),
                    group_id: group_id.clone(),
                })
                .collect(),
        };
        let data = serde_json::to_string_pretty(&persisted).map_err(io::Error::other)?;
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(data.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Record `group_id` as the most recent selection for `path`, evicting
    /// the oldest entry once the cap is exceeded.
    pub fn record(&mut self, path: PathBuf, group_id: String) {
        self.entries.shift_remove(&path);
        self.entries.insert(path, group_id);
        while self.entries.len() > self.capacity {
            self.entries.shift_remove_index(0);
        }
    }

    pub fn remove(&mut self, path: &Path) {
        self.entries.shift_remove(path);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
