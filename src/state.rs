//! Persistent delivery history.
//!
//! The state file is a small JSON document:
//!
//! ```json
//! {
//!   "sent_ids": ["https://example.com/a", "https://example.com/b"],
//!   "last_run": "2025-05-06T14:30:00+00:00"
//! }
//! ```
//!
//! `sent_ids` is ordered oldest first and capped; when the cap is exceeded the
//! oldest ids are evicted. Reading never fails: a missing, unreadable or
//! malformed file is a fresh, empty history. Writing goes through a temp file
//! and a rename so the file is never left half-written.

use crate::models::Article;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs as stdfs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// A lock older than this is assumed to belong to a crashed run.
const STALE_LOCK_AGE: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to write state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("another run holds the lock {path}")]
    Locked { path: PathBuf },
}

/// Delivered ids plus the time of the last successful run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryState {
    #[serde(default)]
    sent_ids: Vec<String>,
    #[serde(default)]
    pub last_run: Option<String>,
    #[serde(skip)]
    index: HashSet<String>,
}

impl DeliveryState {
    /// Build a state from ids in delivery order, dropping repeats.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = Self::default();
        for id in ids {
            state.push(id.into());
        }
        state
    }

    fn push(&mut self, id: String) -> bool {
        if self.index.insert(id.clone()) {
            self.sent_ids.push(id);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Delivered ids, oldest first.
    #[cfg(test)]
    pub fn sent_ids(&self) -> &[String] {
        &self.sent_ids
    }

    pub fn len(&self) -> usize {
        self.sent_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent_ids.is_empty()
    }

    /// Append ids not yet present, then evict the oldest beyond `cap`.
    pub fn record<'a, I>(&mut self, ids: I, cap: usize)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for id in ids {
            self.push(id.to_string());
        }
        if self.sent_ids.len() > cap {
            let excess = self.sent_ids.len() - cap;
            for evicted in self.sent_ids.drain(..excess) {
                self.index.remove(&evicted);
            }
            debug!(evicted = excess, cap, "Evicted oldest delivered ids");
        }
    }

    /// Re-derive the lookup index after deserializing.
    fn reindex(self) -> Self {
        let last_run = self.last_run;
        let mut state = Self::from_ids(self.sent_ids);
        state.last_run = last_run;
        state
    }
}

/// Drop articles that were already delivered, keeping order.
pub fn filter_unseen(articles: Vec<Article>, state: &DeliveryState) -> Vec<Article> {
    articles
        .into_iter()
        .filter(|a| !state.contains(&a.id))
        .collect()
}

/// Location and bound of the delivery history.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    cap: usize,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            path: path.into(),
            cap,
        }
    }

    /// Read the history, falling back to an empty one on any problem.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> DeliveryState {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No state file yet; starting fresh");
                return DeliveryState::default();
            }
            Err(e) => {
                warn!(error = %e, "State file unreadable; starting fresh");
                return DeliveryState::default();
            }
        };
        match serde_json::from_slice::<DeliveryState>(&raw) {
            Ok(state) => {
                let state = state.reindex();
                if state.is_empty() {
                    info!(last_run = ?state.last_run, "State file has no delivered ids");
                } else {
                    info!(sent = state.len(), last_run = ?state.last_run, "Loaded delivery state");
                }
                state
            }
            Err(e) => {
                warn!(error = %e, "State file malformed; starting fresh");
                DeliveryState::default()
            }
        }
    }

    /// Mark `selected` as delivered and persist.
    ///
    /// Callers must only invoke this once the output for `selected` exists.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), count = selected.len()))]
    pub async fn record_and_save(
        &self,
        selected: &[Article],
        state: &mut DeliveryState,
        now: DateTime<Utc>,
    ) -> Result<(), StateError> {
        state.record(selected.iter().map(|a| a.id.as_str()), self.cap);
        state.last_run = Some(now.to_rfc3339());
        self.save(state).await
    }

    async fn save(&self, state: &DeliveryState) -> Result<(), StateError> {
        let json = serde_json::to_vec_pretty(state)?;
        let io_err = |source| StateError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = sibling(&self.path, "tmp");
        fs::write(&tmp, json).await.map_err(io_err)?;
        fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        info!(sent = state.len(), "Saved delivery state");
        Ok(())
    }

    /// Take the advisory run lock next to the state file.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub fn lock(&self) -> Result<RunLock, StateError> {
        RunLock::acquire(sibling(&self.path, "lock"))
    }
}

/// `state.json` → `state.json.<ext>`.
fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Exclusive marker file held for the duration of a run; removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    fn acquire(path: PathBuf) -> Result<Self, StateError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            stdfs::create_dir_all(parent).map_err(|source| StateError::Io {
                path: path.clone(),
                source,
            })?;
        }
        match Self::create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let observed = stdfs::read_to_string(&path).unwrap_or_default();
                if !is_stale(&path) {
                    return Err(StateError::Locked { path });
                }
                warn!(path = %path.display(), holder = %observed.trim(), "Taking over stale run lock");
                if !remove_if_unchanged(&path, &observed) {
                    return Err(StateError::Locked { path });
                }
                Self::create(&path).map_err(|e| match e.kind() {
                    ErrorKind::AlreadyExists => StateError::Locked { path: path.clone() },
                    _ => StateError::Io {
                        path: path.clone(),
                        source: e,
                    },
                })
            }
            Err(source) => Err(StateError::Io { path, source }),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = stdfs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        writeln!(file, "{}", std::process::id())?;
        debug!(path = %path.display(), "Acquired run lock");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

/// Remove a stale lock only if it still holds what the caller saw.
///
/// Another run taking over the same stale lock replaces its contents with
/// its own pid, so a changed file means we lost the race. A window remains
/// between this check and the removal; it is a single read apart.
fn remove_if_unchanged(path: &Path, observed: &str) -> bool {
    match stdfs::read_to_string(path) {
        Ok(current) if current == observed && is_stale(path) => stdfs::remove_file(path).is_ok(),
        _ => false,
    }
}

fn is_stale(path: &Path) -> bool {
    stdfs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = stdfs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release run lock");
        }
    }
}
