use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const LEDGER_FILE: &str = ".ondemand-state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    InProgress,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub status: Status,
    // Unix seconds of the last status change.
    pub updated: i64,
}

// Ledger records which apps were fully created, so a directory left behind by an
// interrupted run is not mistaken for a finished one.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: BTreeMap<String, Entry>,
}

impl Ledger {
    // Loading never creates the file; it is first written when an app is created.
    pub fn load(apps_dir: &Path) -> Result<Self> {
        let path = apps_dir.join(LEDGER_FILE);
        let entries: BTreeMap<String, Entry> = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data)
                .with_context(|| format!("Corrupt state file {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        debug!("Loaded {} ledger entries from {}", entries.len(), path.display());
        Ok(Self { path, entries })
    }

    pub fn status(&self, app_name: &str) -> Option<Status> {
        self.entries.get(app_name).map(|e| e.status)
    }

    pub fn mark(&mut self, app_name: &str, status: Status) -> Result<()> {
        self.entries.insert(
            app_name.to_string(),
            Entry {
                status,
                updated: OffsetDateTime::now_utc().unix_timestamp(),
            },
        );
        self.save()?;
        debug!("Marked {} as {:?}", app_name, status);
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("Failed to write state file {}", self.path.display()))?;
        Ok(())
    }
}
