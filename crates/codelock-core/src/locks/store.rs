//! ============================================================================
//! Lock Store
//! ============================================================================
//! In-memory set of code locks keyed by object instance, persisted as a JSON
//! snapshot. Saves go through a write-to-temp-then-rename sequence so a
//! failed or interrupted save leaves the previous registry file intact, and
//! a writer lock serializes overlapping saves so the file always holds one
//! complete snapshot.
//! ============================================================================

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{CodeLock, LockCode};
use crate::types::{ActorId, InstanceId, UpsertOutcome};

/// Failed to populate the store from the registry file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read lock registry {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("lock registry {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("lock registry {path} is corrupt: duplicate lock for instance {instance_id}")]
    Duplicate {
        path: PathBuf,
        instance_id: InstanceId,
    },
}

/// Failed to write the registry snapshot. The previous file is left intact.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("failed to encode lock registry: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write lock registry {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to replace lock registry {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Owns every `CodeLock` record and its persisted form.
pub struct LockStore {
    path: PathBuf,
    records: HashMap<InstanceId, CodeLock>,
    /// Admits one snapshot writer at a time; shared with the background
    /// save workers so overlapping saves cannot interleave on the temp
    /// file.
    writer: Arc<Mutex<()>>,
}

impl LockStore {
    /// Empty store bound to a registry path. Nothing is read until `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: HashMap::new(),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// The registry file path this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Populate the record set from the registry file.
    ///
    /// A missing file is a valid empty registry, not an error. On a read or
    /// parse failure the in-memory set is left empty so the engine keeps
    /// working against a blank registry.
    pub fn load(&mut self) -> Result<(), LoadError> {
        self.records.clear();

        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no lock registry at {}, starting empty", self.path.display());
                return Ok(());
            }
            Err(e) => {
                return Err(LoadError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let locks: Vec<CodeLock> = serde_json::from_slice(&bytes).map_err(|e| LoadError::Corrupt {
            path: self.path.clone(),
            source: e,
        })?;

        // A save never writes the same instance twice; a duplicate means the
        // file was edited or damaged.
        let count = locks.len();
        let mut records = HashMap::with_capacity(count);
        for lock in locks {
            let instance_id = lock.instance_id;
            if records.insert(instance_id, lock).is_some() {
                return Err(LoadError::Duplicate {
                    path: self.path.clone(),
                    instance_id,
                });
            }
        }
        self.records = records;
        info!("loaded {} code locks from {}", count, self.path.display());
        Ok(())
    }

    /// Write the full record set to the registry file atomically. Blocks
    /// until any in-flight background save has published its snapshot.
    pub fn save(&self) -> Result<(), SaveError> {
        write_snapshot(&self.path, &self.snapshot(), &self.writer)?;
        debug!(
            "saved {} code locks to {}",
            self.records.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Copy the record set out on the caller's context and write it on a
    /// blocking worker, so decision traffic never waits on disk. Workers
    /// share the store's writer lock, so overlapping saves each publish a
    /// complete snapshot. A failed save is logged and leaves the previous
    /// registry file in place; the next save trigger retries with fresh
    /// data.
    pub fn save_in_background(&self) -> JoinHandle<Result<(), SaveError>> {
        let path = self.path.clone();
        let snapshot = self.snapshot();
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let result = write_snapshot(&path, &snapshot, &writer);
            match &result {
                Ok(()) => debug!("saved {} code locks to {}", snapshot.len(), path.display()),
                Err(e) => warn!("background save of lock registry failed: {}", e),
            }
            result
        })
    }

    /// Look up the lock on an object.
    pub fn get(&self, instance_id: InstanceId) -> Option<&CodeLock> {
        self.records.get(&instance_id)
    }

    /// Create a lock owned by `actor_id`, or change the code on an existing
    /// one. Re-coding keeps the remembered user list.
    pub fn upsert(
        &mut self,
        instance_id: InstanceId,
        code: LockCode,
        actor_id: ActorId,
    ) -> UpsertOutcome {
        match self.records.get_mut(&instance_id) {
            Some(lock) => {
                lock.code = code;
                debug!("changed code on lock {}", instance_id);
                UpsertOutcome::Changed
            }
            None => {
                self.records
                    .insert(instance_id, CodeLock::new(instance_id, code, actor_id));
                debug!("created lock {} owned by {}", instance_id, actor_id);
                UpsertOutcome::Created
            }
        }
    }

    /// Remove the lock on an object. Returns whether a record existed.
    pub fn remove(&mut self, instance_id: InstanceId) -> bool {
        let removed = self.records.remove(&instance_id).is_some();
        if removed {
            debug!("removed lock {}", instance_id);
        }
        removed
    }

    /// Append the actor to the lock's remembered users unless already listed.
    /// All `users` growth goes through here, so order and uniqueness hold by
    /// construction. Returns whether the actor was newly appended.
    pub fn remember_user(&mut self, instance_id: InstanceId, actor_id: ActorId) -> bool {
        match self.records.get_mut(&instance_id) {
            Some(lock) if !lock.remembers(actor_id) => {
                lock.users.push(actor_id);
                debug!("lock {} now remembers {}", instance_id, actor_id);
                true
            }
            _ => false,
        }
    }

    /// Owned copy of every record, ordered by instance id. Callers may
    /// mutate the store while walking the copy.
    pub fn snapshot(&self) -> Vec<CodeLock> {
        let mut locks: Vec<CodeLock> = self.records.values().cloned().collect();
        locks.sort_by_key(|lock| lock.instance_id);
        locks
    }

    /// Number of locks on record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Serialize the snapshot and move it into place: write to a sibling `.tmp`
/// file, fsync, rename over the registry, then fsync the directory. The
/// registry path never holds a partially written file. The writer lock
/// admits one writer at a time; concurrent callers queue here.
fn write_snapshot(path: &Path, locks: &[CodeLock], writer: &Mutex<()>) -> Result<(), SaveError> {
    let payload = serde_json::to_vec_pretty(locks)?;
    let _writer = writer.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| SaveError::Write {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
    }

    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp).map_err(|e| SaveError::Write {
        path: tmp.clone(),
        source: e,
    })?;
    file.write_all(&payload).map_err(|e| SaveError::Write {
        path: tmp.clone(),
        source: e,
    })?;
    file.sync_all().map_err(|e| SaveError::Write {
        path: tmp.clone(),
        source: e,
    })?;

    std::fs::rename(&tmp, path).map_err(|e| SaveError::Replace {
        path: path.to_path_buf(),
        source: e,
    })?;
    sync_parent_dir(path).map_err(|e| SaveError::Replace {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn code(value: u16) -> LockCode {
        LockCode::new(value).unwrap()
    }

    fn registry_in(dir: &TempDir) -> PathBuf {
        dir.path().join("locks.json")
    }

    #[test]
    fn test_upsert_get_remove() {
        let dir = TempDir::new().unwrap();
        let mut store = LockStore::new(registry_in(&dir));

        let outcome = store.upsert(InstanceId(7), code(1234), ActorId(100));
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(store.len(), 1);

        let lock = store.get(InstanceId(7)).unwrap();
        assert_eq!(lock.code, code(1234));
        assert_eq!(lock.users, vec![ActorId(100)]);

        assert!(store.remove(InstanceId(7)));
        assert!(!store.remove(InstanceId(7)));
        assert!(store.get(InstanceId(7)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_recode_keeps_users() {
        let dir = TempDir::new().unwrap();
        let mut store = LockStore::new(registry_in(&dir));

        store.upsert(InstanceId(7), code(1234), ActorId(100));
        assert!(store.remember_user(InstanceId(7), ActorId(200)));

        let outcome = store.upsert(InstanceId(7), code(9999), ActorId(300));
        assert_eq!(outcome, UpsertOutcome::Changed);

        let lock = store.get(InstanceId(7)).unwrap();
        assert_eq!(lock.code, code(9999));
        assert_eq!(lock.users, vec![ActorId(100), ActorId(200)]);
        assert_eq!(lock.owner(), Some(ActorId(100)));
    }

    #[test]
    fn test_remember_user_appends_once() {
        let dir = TempDir::new().unwrap();
        let mut store = LockStore::new(registry_in(&dir));
        store.upsert(InstanceId(7), code(1234), ActorId(100));

        assert!(store.remember_user(InstanceId(7), ActorId(200)));
        assert!(!store.remember_user(InstanceId(7), ActorId(200)));
        assert!(!store.remember_user(InstanceId(7), ActorId(100)));
        assert!(!store.remember_user(InstanceId(99), ActorId(200)));

        let lock = store.get(InstanceId(7)).unwrap();
        assert_eq!(lock.users, vec![ActorId(100), ActorId(200)]);
    }

    #[test]
    fn test_save_load_round_trip_preserves_user_order() {
        let dir = TempDir::new().unwrap();
        let path = registry_in(&dir);

        let mut store = LockStore::new(&path);
        store.upsert(InstanceId(7), code(42), ActorId(100));
        store.remember_user(InstanceId(7), ActorId(300));
        store.remember_user(InstanceId(7), ActorId(200));
        store.upsert(InstanceId(9), code(1234), ActorId(100));
        store.save().unwrap();

        let mut reloaded = LockStore::new(&path);
        reloaded.load().unwrap();

        assert_eq!(reloaded.len(), 2);
        let lock = reloaded.get(InstanceId(7)).unwrap();
        assert_eq!(lock.code, code(42));
        assert_eq!(lock.users, vec![ActorId(100), ActorId(300), ActorId(200)]);
        assert_eq!(reloaded.get(InstanceId(9)).unwrap().code, code(1234));
    }

    #[test]
    fn test_load_missing_file_is_empty_registry() {
        let dir = TempDir::new().unwrap();
        let mut store = LockStore::new(registry_in(&dir));
        store.load().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_reports_and_store_stays_usable() {
        let dir = TempDir::new().unwrap();
        let path = registry_in(&dir);
        std::fs::write(&path, b"not json at all {{{").unwrap();

        let mut store = LockStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(matches!(err, LoadError::Corrupt { .. }));
        assert!(store.is_empty());

        store.upsert(InstanceId(1), code(1), ActorId(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_rejects_out_of_range_code() {
        let dir = TempDir::new().unwrap();
        let path = registry_in(&dir);
        std::fs::write(
            &path,
            br#"[{"instance_id": 7, "code": 10000, "users": [100]}]"#,
        )
        .unwrap();

        let mut store = LockStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(matches!(err, LoadError::Corrupt { .. }));
    }

    #[test]
    fn test_load_rejects_duplicate_instance_ids() {
        let dir = TempDir::new().unwrap();
        let path = registry_in(&dir);
        std::fs::write(
            &path,
            br#"[{"instance_id": 7, "code": 1111, "users": [100]},
                 {"instance_id": 9, "code": 1234, "users": [100]},
                 {"instance_id": 7, "code": 2222, "users": [200]}]"#,
        )
        .unwrap();

        let mut store = LockStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(matches!(
            err,
            LoadError::Duplicate {
                instance_id: InstanceId(7),
                ..
            }
        ));
        // Neither record wins; the store starts empty like any corrupt load.
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_save_leaves_previous_registry_intact() {
        let dir = TempDir::new().unwrap();
        let path = registry_in(&dir);

        let mut store = LockStore::new(&path);
        store.upsert(InstanceId(7), code(1234), ActorId(100));
        store.save().unwrap();
        let saved = std::fs::read(&path).unwrap();

        // Occupy the temp path with a directory so the next write fails
        // before the rename step.
        std::fs::create_dir(path.with_extension("tmp")).unwrap();

        store.upsert(InstanceId(9), code(5678), ActorId(100));
        let err = store.save().unwrap_err();
        assert!(matches!(err, SaveError::Write { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), saved);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("locks.json");

        let mut store = LockStore::new(&path);
        store.upsert(InstanceId(7), code(1234), ActorId(100));
        store.save().unwrap();

        let mut reloaded = LockStore::new(&path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_snapshot_is_ordered_by_instance() {
        let dir = TempDir::new().unwrap();
        let mut store = LockStore::new(registry_in(&dir));
        store.upsert(InstanceId(9), code(1), ActorId(1));
        store.upsert(InstanceId(3), code(2), ActorId(1));
        store.upsert(InstanceId(7), code(3), ActorId(1));

        let ids: Vec<InstanceId> = store.snapshot().iter().map(|l| l.instance_id).collect();
        assert_eq!(ids, vec![InstanceId(3), InstanceId(7), InstanceId(9)]);
    }

    #[tokio::test]
    async fn test_background_save_persists_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = registry_in(&dir);

        let mut store = LockStore::new(&path);
        store.upsert(InstanceId(7), code(1234), ActorId(100));

        let handle = store.save_in_background();
        // Mutations after the handoff must not leak into this save.
        store.upsert(InstanceId(9), code(5678), ActorId(100));
        handle.await.unwrap().unwrap();

        let mut reloaded = LockStore::new(&path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.get(InstanceId(7)).is_some());
    }

    #[tokio::test]
    async fn test_overlapping_saves_publish_a_complete_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = registry_in(&dir);

        // Queue a save after every mutation without awaiting, so the
        // blocking workers all run at once against the same temp path.
        let mut store = LockStore::new(&path);
        let mut handles = Vec::new();
        for id in 1..=8u64 {
            store.upsert(InstanceId(id), code(1000 + id as u16), ActorId(id));
            handles.push(store.save_in_background());
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Whichever writer published last, the file must parse as one of
        // the queued snapshots, never a mix of two.
        let mut reloaded = LockStore::new(&path);
        reloaded.load().unwrap();
        let published = reloaded.len() as u64;
        assert!((1..=8).contains(&published));
        for id in 1..=published {
            let lock = reloaded.get(InstanceId(id)).unwrap();
            assert_eq!(lock.code, code(1000 + id as u16));
            assert_eq!(lock.owner(), Some(ActorId(id)));
        }
    }
}
