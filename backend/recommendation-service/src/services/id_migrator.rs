//! Persistent bijection between opaque user keys and dense numeric ids.
//!
//! Store format: one JSON object per line, `{"id":1,"key":"alice"}`.
//! Lines are only ever appended, so a crash mid-flush loses at most the
//! unflushed tail; ids already on disk never change.

use crate::error::{AppError, Result};
use crate::models::UserId;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const FIRST_USER_ID: UserId = 1;

#[derive(Debug, Serialize, Deserialize)]
struct MappingEntry {
    id: UserId,
    key: String,
}

#[derive(Debug, Default)]
struct MigratorState {
    key_to_id: HashMap<String, UserId>,
    id_to_key: HashMap<UserId, String>,
    next_id: UserId,
    /// Allocated since the last flush
    pending: Vec<(UserId, String)>,
}

impl MigratorState {
    fn empty() -> Self {
        Self {
            next_id: FIRST_USER_ID,
            ..Default::default()
        }
    }

    fn insert(&mut self, id: UserId, key: String) {
        self.id_to_key.insert(id, key.clone());
        self.key_to_id.insert(key, id);
        if id >= self.next_id {
            self.next_id = id + 1;
        }
    }
}

pub struct IdMigrator {
    store_path: PathBuf,
    state: RwLock<MigratorState>,
    flush_lock: Mutex<()>,
}

impl IdMigrator {
    /// Load the mapping from `store_path`. A missing file yields an empty
    /// migrator; unparseable lines are skipped.
    pub fn open(store_path: impl Into<PathBuf>) -> Result<Self> {
        let store_path = store_path.into();
        let state = load_state(&store_path)?;

        info!(
            path = %store_path.display(),
            users = state.key_to_id.len(),
            next_id = state.next_id,
            "Id migrator loaded"
        );

        Ok(Self {
            store_path,
            state: RwLock::new(state),
            flush_lock: Mutex::new(()),
        })
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Read-only lookup used on the query path.
    pub fn to_id(&self, key: &str) -> Result<UserId> {
        self.state
            .read()
            .key_to_id
            .get(key)
            .copied()
            .ok_or_else(|| AppError::UnknownUser(key.to_string()))
    }

    /// Rebuild-time lookup that allocates the next dense id for an unseen
    /// key when `create_if_absent` is set.
    pub fn id_for(&self, key: &str, create_if_absent: bool) -> Result<UserId> {
        if let Some(id) = self.state.read().key_to_id.get(key) {
            return Ok(*id);
        }

        if !create_if_absent {
            return Err(AppError::UnknownUser(key.to_string()));
        }

        let mut state = self.state.write();
        // Another allocator may have won the race between the two locks.
        if let Some(id) = state.key_to_id.get(key) {
            return Ok(*id);
        }

        let id = state.next_id;
        state.insert(id, key.to_string());
        state.pending.push((id, key.to_string()));
        debug!(user_id = id, "Allocated user id");

        Ok(id)
    }

    pub fn to_key(&self, id: UserId) -> Option<String> {
        self.state.read().id_to_key.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().key_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of allocations not yet written to the store.
    pub fn pending(&self) -> usize {
        self.state.read().pending.len()
    }

    /// Append every allocation made since the last flush to the store.
    pub fn flush(&self) -> Result<()> {
        let _guard = self.flush_lock.lock();

        let pending = std::mem::take(&mut self.state.write().pending);
        if pending.is_empty() {
            return Ok(());
        }

        if let Err(err) = append_entries(&self.store_path, &pending) {
            // Keep them queued; a re-appended duplicate line is harmless on load.
            self.requeue(pending);
            return Err(err);
        }

        info!(
            path = %self.store_path.display(),
            flushed = pending.len(),
            "Id migrator flushed"
        );

        Ok(())
    }

    /// Rewrite the whole store from memory (temp file + rename).
    pub fn persist_all(&self) -> Result<()> {
        let _guard = self.flush_lock.lock();

        // Snapshot and drain under one guard: allocations made after this
        // stay pending and are appended by the next flush.
        let (mut entries, drained) = {
            let mut state = self.state.write();
            let entries: Vec<(UserId, String)> = state
                .id_to_key
                .iter()
                .map(|(id, key)| (*id, key.clone()))
                .collect();
            (entries, std::mem::take(&mut state.pending))
        };
        entries.sort_by_key(|(id, _)| *id);

        if let Err(err) = rewrite_entries(&self.store_path, &entries) {
            self.requeue(drained);
            return Err(err);
        }

        info!(
            path = %self.store_path.display(),
            users = entries.len(),
            "Id migrator store rewritten"
        );

        Ok(())
    }

    /// Put entries back in front of anything allocated since they were taken.
    fn requeue(&self, mut entries: Vec<(UserId, String)>) {
        let mut state = self.state.write();
        entries.append(&mut state.pending);
        state.pending = entries;
    }
}

fn load_state(path: &Path) -> Result<MigratorState> {
    let mut state = MigratorState::empty();

    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "Id migrator store missing, starting empty");
            return Ok(state);
        }
        Err(err) => return Err(err.into()),
    };

    let mut skipped = 0usize;
    for (line_no, raw) in data.split(|b| *b == b'\n').enumerate() {
        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let entry: MappingEntry = match serde_json::from_slice(raw) {
            Ok(entry) => entry,
            Err(err) => {
                skipped += 1;
                warn!(line = line_no + 1, error = %err, "Skipping corrupt id migrator entry");
                continue;
            }
        };

        match (
            state.key_to_id.get(&entry.key),
            state.id_to_key.get(&entry.id),
        ) {
            (None, None) => state.insert(entry.id, entry.key),
            (Some(id), _) if *id == entry.id => {}
            _ => {
                skipped += 1;
                warn!(
                    line = line_no + 1,
                    user_id = entry.id,
                    "Skipping id migrator entry that conflicts with an earlier mapping"
                );
            }
        }
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "Id migrator store had unusable entries");
    }

    Ok(state)
}

fn rewrite_entries(path: &Path, entries: &[(UserId, String)]) -> Result<()> {
    ensure_parent_dir(path)?;
    let tmp_path = path.with_extension("tmp");
    {
        let file = fs::File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        write_entries(&mut writer, entries)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn append_entries(path: &Path, entries: &[(UserId, String)]) -> Result<()> {
    ensure_parent_dir(path)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    write_entries(&mut writer, entries)?;
    writer.flush()?;
    writer.get_ref().sync_data()?;
    Ok(())
}

fn write_entries<W: Write>(writer: &mut W, entries: &[(UserId, String)]) -> Result<()> {
    for (id, key) in entries {
        let line = serde_json::to_string(&MappingEntry {
            id: *id,
            key: key.clone(),
        })
        .map_err(|e| AppError::StoreIo(e.to_string()))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> PathBuf {
        dir.path().join("migrator.jsonl")
    }

    #[test]
    fn test_missing_store_starts_empty() {
        let dir = TempDir::new().unwrap();
        let migrator = IdMigrator::open(store(&dir)).unwrap();
        assert!(migrator.is_empty());
    }

    #[test]
    fn test_to_id_does_not_allocate() {
        let dir = TempDir::new().unwrap();
        let migrator = IdMigrator::open(store(&dir)).unwrap();

        assert!(matches!(migrator.to_id("alice"), Err(AppError::UnknownUser(_))));
        assert!(matches!(
            migrator.id_for("alice", false),
            Err(AppError::UnknownUser(_))
        ));
        assert!(migrator.is_empty());
    }

    #[test]
    fn test_same_key_same_id_distinct_keys_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let migrator = IdMigrator::open(store(&dir)).unwrap();

        let alice = migrator.id_for("alice", true).unwrap();
        let bob = migrator.id_for("bob", true).unwrap();

        assert_ne!(alice, bob);
        assert_eq!(migrator.id_for("alice", true).unwrap(), alice);
        assert_eq!(migrator.to_id("alice").unwrap(), alice);
        assert_eq!(migrator.to_key(bob).as_deref(), Some("bob"));
        assert_eq!(migrator.len(), 2);
    }

    #[test]
    fn test_mapping_survives_reload() {
        let dir = TempDir::new().unwrap();
        let (alice, bob) = {
            let migrator = IdMigrator::open(store(&dir)).unwrap();
            let alice = migrator.id_for("alice", true).unwrap();
            let bob = migrator.id_for("bob, with \"quotes\"\n", true).unwrap();
            migrator.flush().unwrap();
            assert_eq!(migrator.pending(), 0);
            (alice, bob)
        };

        let reloaded = IdMigrator::open(store(&dir)).unwrap();
        assert_eq!(reloaded.to_id("alice").unwrap(), alice);
        assert_eq!(reloaded.to_id("bob, with \"quotes\"\n").unwrap(), bob);

        // New allocations never reuse a persisted id.
        let carol = reloaded.id_for("carol", true).unwrap();
        assert!(carol > alice && carol > bob);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(
            store(&dir),
            "{\"id\":1,\"key\":\"alice\"}\nnot json at all\n\n{\"id\":1,\"key\":\"mallory\"}\n{\"id\":4,\"key\":\"bob\"}\n",
        )
        .unwrap();

        let migrator = IdMigrator::open(store(&dir)).unwrap();
        assert_eq!(migrator.len(), 2);
        assert_eq!(migrator.to_id("alice").unwrap(), 1);
        assert_eq!(migrator.to_id("bob").unwrap(), 4);
        assert!(migrator.to_id("mallory").is_err());
        assert_eq!(migrator.id_for("carol", true).unwrap(), 5);
    }

    #[test]
    fn test_persist_all_rewrites_store() {
        let dir = TempDir::new().unwrap();
        let migrator = IdMigrator::open(store(&dir)).unwrap();
        migrator.id_for("alice", true).unwrap();
        migrator.flush().unwrap();
        // Duplicate line from a retried flush.
        fs::write(
            store(&dir),
            "{\"id\":1,\"key\":\"alice\"}\n{\"id\":1,\"key\":\"alice\"}\n",
        )
        .unwrap();
        migrator.persist_all().unwrap();

        let contents = fs::read_to_string(store(&dir)).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_concurrent_allocation_keeps_bijection() {
        let dir = TempDir::new().unwrap();
        let migrator = Arc::new(IdMigrator::open(store(&dir)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let migrator = migrator.clone();
                std::thread::spawn(move || {
                    (0..200)
                        .map(|i| {
                            let key = format!("user-{}", (i + t * 7) % 150);
                            (key.clone(), migrator.id_for(&key, true).unwrap())
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen: HashMap<String, UserId> = HashMap::new();
        for handle in handles {
            for (key, id) in handle.join().unwrap() {
                let existing = *seen.entry(key).or_insert(id);
                assert_eq!(existing, id);
            }
        }

        let ids: HashSet<UserId> = seen.values().copied().collect();
        assert_eq!(ids.len(), seen.len());
        assert_eq!(migrator.len(), 150);
        assert_eq!(migrator.pending(), 150);
    }

    #[test]
    fn test_persist_all_keeps_concurrent_allocations() {
        let dir = TempDir::new().unwrap();
        let migrator = Arc::new(IdMigrator::open(store(&dir)).unwrap());
        assert_eq!(migrator.store_path(), store(&dir).as_path());

        let allocator = {
            let migrator = migrator.clone();
            std::thread::spawn(move || {
                for i in 0..5_000 {
                    migrator.id_for(&format!("user-{}", i), true).unwrap();
                }
            })
        };
        while !allocator.is_finished() {
            migrator.persist_all().unwrap();
        }
        allocator.join().unwrap();
        migrator.flush().unwrap();

        let reloaded = IdMigrator::open(store(&dir)).unwrap();
        assert_eq!(reloaded.len(), 5_000);
        for i in 0..5_000 {
            let key = format!("user-{}", i);
            assert_eq!(reloaded.to_id(&key).unwrap(), migrator.to_id(&key).unwrap());
        }
    }
}
