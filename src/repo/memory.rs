//! In-memory repository backend
//!
//! One coarse `parking_lot::Mutex` guards the object table, both indices and
//! the counters. Contention is one short critical section per file, which
//! is far below the cost of reading and compressing that file.

use crate::content::{ContentObject, Fingerprint};
use crate::error::{RepoError, RepoResult};
use crate::repo::{validate_object, RepoSummary, Repository};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

type Index = HashMap<String, BTreeSet<Fingerprint>>;

#[derive(Debug, Default)]
struct MemoryState {
    objects: HashMap<Fingerprint, ContentObject>,
    names: Index,
    tags: Index,
    original_size: u64,
    compressed_size: u64,
}

impl MemoryState {
    fn collect(&self, index: &Index, key: &str) -> Vec<ContentObject> {
        index
            .get(key)
            .map(|fingerprints| {
                fingerprints
                    .iter()
                    .filter_map(|fp| self.objects.get(fp).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Map-based repository, lives for the process
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn index_keys<'a>(index: &mut Index, keys: impl IntoIterator<Item = &'a String>, fp: Fingerprint) {
    for key in keys {
        index.entry(key.clone()).or_default().insert(fp);
    }
}

fn prune_keys<'a>(index: &mut Index, keys: impl IntoIterator<Item = &'a String>, fp: Fingerprint) {
    for key in keys {
        if let Some(fingerprints) = index.get_mut(key) {
            fingerprints.remove(&fp);
            if fingerprints.is_empty() {
                index.remove(key);
            }
        }
    }
}

fn sorted_keys(index: &Index) -> Vec<String> {
    let mut keys: Vec<String> = index.keys().cloned().collect();
    keys.sort();
    keys
}

impl Repository for MemoryRepository {
    fn add(&self, object: ContentObject) -> RepoResult<()> {
        validate_object(&object)?;

        let mut state = self.state.lock();
        let fp = object.fingerprint();
        let MemoryState {
            objects,
            names,
            tags,
            original_size,
            compressed_size,
        } = &mut *state;

        match objects.get_mut(&fp) {
            None => {
                index_keys(names, object.names(), fp);
                index_keys(tags, object.tags(), fp);
                *original_size += object.size();
                *compressed_size += object.compressed_size();
                trace!(fingerprint = %fp, size = object.size(), "Inserted object");
                objects.insert(fp, object);
            }
            Some(existing) if existing.size() != object.size() => {
                return Err(RepoError::Collision {
                    fingerprint: fp,
                    existing: existing.names().iter().cloned().collect(),
                    incoming: object.names().iter().cloned().collect(),
                });
            }
            Some(existing) => {
                existing.merge_from(&object);
                index_keys(names, object.names(), fp);
                index_keys(tags, object.tags(), fp);
                *original_size += object.size();
                trace!(fingerprint = %fp, names = existing.names().len(), "Merged object");
            }
        }

        Ok(())
    }

    fn remove(&self, fingerprint: Fingerprint) -> RepoResult<()> {
        let mut state = self.state.lock();
        let Some(object) = state.objects.remove(&fingerprint) else {
            return Ok(());
        };

        prune_keys(&mut state.names, object.names(), fingerprint);
        prune_keys(&mut state.tags, object.tags(), fingerprint);
        Ok(())
    }

    fn object(&self, fingerprint: Fingerprint) -> RepoResult<Option<ContentObject>> {
        Ok(self.state.lock().objects.get(&fingerprint).cloned())
    }

    fn all_names(&self) -> RepoResult<Vec<String>> {
        Ok(sorted_keys(&self.state.lock().names))
    }

    fn all_tags(&self) -> RepoResult<Vec<String>> {
        Ok(sorted_keys(&self.state.lock().tags))
    }

    fn objects_by_name(&self, name: &str) -> RepoResult<Vec<ContentObject>> {
        let state = self.state.lock();
        Ok(state.collect(&state.names, name))
    }

    fn objects_by_tag(&self, tag: &str) -> RepoResult<Vec<ContentObject>> {
        let state = self.state.lock();
        Ok(state.collect(&state.tags, tag))
    }

    fn summary(&self) -> RepoResult<RepoSummary> {
        let state = self.state.lock();
        Ok(RepoSummary {
            objects: state.objects.len() as u64,
            names: state.names.len() as u64,
            tags: state.tags.len() as u64,
            original_size: state.original_size,
            compressed_size: state.compressed_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::encode;
    use std::sync::Arc;
    use std::thread;

    fn object(content: &[u8], name: &str, tags: &[&str]) -> ContentObject {
        let encoded = encode(content).unwrap();
        let tags = tags.iter().map(|t| t.to_string()).collect();
        ContentObject::from_encoded(encoded, name, tags)
    }

    #[test]
    fn test_add_new_object() {
        let repo = MemoryRepository::new();
        let obj = object(b"hello", "/r/a/hello.txt", &["a"]);
        let compressed = obj.compressed_size();

        repo.add(obj).unwrap();

        let summary = repo.summary().unwrap();
        assert_eq!(summary.objects, 1);
        assert_eq!(summary.names, 1);
        assert_eq!(summary.tags, 1);
        assert_eq!(summary.original_size, 5);
        assert_eq!(summary.compressed_size, compressed);
    }

    #[test]
    fn test_readd_same_file_counts_original_only() {
        let repo = MemoryRepository::new();
        let obj = object(b"twice", "/r/twice.txt", &[]);
        let compressed = obj.compressed_size();

        repo.add(obj.clone()).unwrap();
        repo.add(obj).unwrap();

        let summary = repo.summary().unwrap();
        assert_eq!(summary.objects, 1);
        assert_eq!(summary.names, 1);
        assert_eq!(summary.compressed_size, compressed);
        assert_eq!(summary.original_size, 10);
    }

    #[test]
    fn test_merge_two_paths() {
        let repo = MemoryRepository::new();
        repo.add(object(b"same", "/r/x/a.txt", &["x"])).unwrap();
        repo.add(object(b"same", "/r/y/z/b.txt", &["y", "z"])).unwrap();

        let summary = repo.summary().unwrap();
        assert_eq!(summary.objects, 1);

        let stored = repo.objects_by_name("/r/x/a.txt").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].names().len(), 2);
        assert_eq!(stored[0].tags().len(), 3);

        // Both names and every tag point at the same object
        assert_eq!(repo.objects_by_name("/r/y/z/b.txt").unwrap(), stored);
        assert_eq!(repo.objects_by_tag("z").unwrap(), stored);
    }

    #[test]
    fn test_collision_rejected_without_changes() {
        let repo = MemoryRepository::new();
        let fp = Fingerprint::new(0xdead_beef);
        let first = ContentObject::new(fp, 10, vec![1; 4]).with_name("/r/one").with_tag("t1");
        let second = ContentObject::new(fp, 11, vec![2; 4]).with_name("/r/two").with_tag("t2");

        repo.add(first.clone()).unwrap();
        let before = repo.summary().unwrap();

        let err = repo.add(second).unwrap_err();
        match &err {
            RepoError::Collision {
                fingerprint,
                existing,
                incoming,
            } => {
                assert_eq!(*fingerprint, fp);
                assert_eq!(existing, &vec!["/r/one".to_string()]);
                assert_eq!(incoming, &vec!["/r/two".to_string()]);
            }
            other => panic!("expected collision, got {other:?}"),
        }

        assert_eq!(repo.summary().unwrap(), before);
        assert_eq!(repo.object(fp).unwrap(), Some(first));
        assert_eq!(repo.all_names().unwrap(), vec!["/r/one".to_string()]);
        assert_eq!(repo.all_tags().unwrap(), vec!["t1".to_string()]);
    }

    #[test]
    fn test_add_rejects_nameless_object() {
        let repo = MemoryRepository::new();
        let err = repo
            .add(ContentObject::new(Fingerprint::new(1), 1, vec![]))
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidArgument(_)));
        assert_eq!(repo.summary().unwrap().objects, 0);
    }

    #[test]
    fn test_index_extends_instead_of_overwriting() {
        // Same name reused by two different contents keeps both fingerprints
        let repo = MemoryRepository::new();
        repo.add(object(b"v1", "/r/file", &["r1"])).unwrap();
        repo.add(object(b"v2", "/r/file", &["r1"])).unwrap();

        assert_eq!(repo.objects_by_name("/r/file").unwrap().len(), 2);
        assert_eq!(repo.objects_by_tag("r1").unwrap().len(), 2);
    }

    #[test]
    fn test_remove_prunes_indices() {
        let repo = MemoryRepository::new();
        let keep = object(b"keep", "/r/shared/keep", &["shared"]);
        let drop_me = object(b"drop", "/r/shared/drop", &["shared"]);
        let drop_fp = drop_me.fingerprint();

        repo.add(keep).unwrap();
        repo.add(drop_me).unwrap();
        let before = repo.summary().unwrap();

        repo.remove(drop_fp).unwrap();

        assert!(repo.object(drop_fp).unwrap().is_none());
        assert_eq!(repo.all_names().unwrap(), vec!["/r/shared/keep".to_string()]);
        assert_eq!(repo.objects_by_tag("shared").unwrap().len(), 1);

        // Counters are running totals and do not shrink
        let after = repo.summary().unwrap();
        assert_eq!(after.objects, 1);
        assert_eq!(after.original_size, before.original_size);

        // Removing again is a no-op
        repo.remove(drop_fp).unwrap();
    }

    #[test]
    fn test_concurrent_adds() {
        let repo = Arc::new(MemoryRepository::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || {
                    for j in 0..50 {
                        let name = format!("/r/w{i}/f{j}");
                        let content = format!("content-{}", j % 10);
                        repo.add(object(content.as_bytes(), &name, &[])).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let summary = repo.summary().unwrap();
        assert_eq!(summary.objects, 10);
        assert_eq!(summary.names, 400);
    }
}
