//! File-backed document store
//!
//! Each collection is a JSON Lines changelog inside the store directory.
//! Appends and upserts both add a line; on `open` the lines are replayed,
//! so keyed collections resolve to the last write per key. A keyed
//! changelog holding superseded writes is compacted on `open`. Writes are
//! buffered until [`DocumentStore::flush`] (or drop).

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anchorage_core::{AnchorageError, Result};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::collection::{Collection, CollectionState, Layout};
use crate::traits::DocumentStore;

#[derive(Debug)]
struct Inner {
    collections: HashMap<Collection, CollectionState>,
    writers: HashMap<Collection, BufWriter<File>>,
}

impl Inner {
    fn parts(
        &mut self,
        collection: Collection,
    ) -> Result<(&mut CollectionState, &mut BufWriter<File>)> {
        match (
            self.collections.get_mut(&collection),
            self.writers.get_mut(&collection),
        ) {
            (Some(state), Some(writer)) => Ok((state, writer)),
            _ => Err(AnchorageError::storage(format!(
                "collection {collection} is not open"
            ))),
        }
    }
}

/// Store persisting every collection under one directory
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    inner: RwLock<Inner>,
}

impl FileStore {
    /// Open (or create) a store rooted at `root` and replay its changelogs
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            AnchorageError::storage(format!(
                "failed to create store directory {}: {e}",
                root.display()
            ))
        })?;

        let mut collections = HashMap::new();
        let mut writers = HashMap::new();
        for collection in Collection::ALL {
            let path = root.join(collection.file_name());
            let (state, lines) = replay(collection, &path)?;
            debug!(
                collection = %collection,
                documents = state.docs().len(),
                lines,
                "replayed collection"
            );
            if collection.layout() == Layout::Keyed && lines > state.docs().len() {
                compact(&path, state.docs())?;
                debug!(
                    collection = %collection,
                    dropped = lines - state.docs().len(),
                    "compacted changelog"
                );
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    AnchorageError::storage(format!("failed to open {}: {e}", path.display()))
                })?;
            collections.insert(collection, state);
            writers.insert(collection, BufWriter::new(file));
        }

        Ok(Self {
            root,
            inner: RwLock::new(Inner {
                collections,
                writers,
            }),
        })
    }

    /// Directory holding the changelogs
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentStore for FileStore {
    fn append(&self, collection: Collection, doc: Value) -> Result<()> {
        let mut inner = self.inner.write();
        let (state, writer) = inner.parts(collection)?;
        state.check_append(&doc)?;
        write_line(writer, &doc)?;
        state.push(doc);
        Ok(())
    }

    fn upsert(&self, collection: Collection, doc: Value) -> Result<bool> {
        let mut inner = self.inner.write();
        let (state, writer) = inner.parts(collection)?;
        let key = state.check_upsert(&doc)?;
        write_line(writer, &doc)?;
        Ok(state.put(key, doc))
    }

    fn read_all(&self, collection: Collection) -> Result<Vec<Value>> {
        let inner = self.inner.read();
        Ok(inner
            .collections
            .get(&collection)
            .map(|state| state.docs().to_vec())
            .unwrap_or_default())
    }

    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let inner = self.inner.read();
        Ok(inner
            .collections
            .get(&collection)
            .and_then(|state| state.get(key))
            .cloned())
    }

    fn find(
        &self,
        collection: Collection,
        predicate: &dyn Fn(&Value) -> bool,
    ) -> Result<Option<Value>> {
        let inner = self.inner.read();
        Ok(inner
            .collections
            .get(&collection)
            .and_then(|state| state.docs().iter().find(|doc| predicate(doc)))
            .cloned())
    }

    fn flush(&self) -> Result<()> {
        let mut inner = self.inner.write();
        for (collection, writer) in inner.writers.iter_mut() {
            writer.flush().map_err(|e| {
                AnchorageError::storage(format!("failed to flush {collection}: {e}"))
            })?;
            writer.get_ref().sync_data().map_err(|e| {
                AnchorageError::storage(format!("failed to sync {collection}: {e}"))
            })?;
        }
        Ok(())
    }
}

fn write_line(writer: &mut BufWriter<File>, doc: &Value) -> Result<()> {
    let mut line = serde_json::to_vec(doc)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    Ok(())
}

/// Rebuild a collection from its changelog, returning it with the number
/// of documents read
///
/// A final line without its newline is a torn write: if it does not parse
/// it is dropped and the file truncated, otherwise the newline is added.
/// Either way later appends start on a clean line. Any other unparsable
/// line is corruption.
fn replay(collection: Collection, path: &Path) -> Result<(CollectionState, usize)> {
    let mut state = CollectionState::new(collection);
    let mut lines = 0usize;
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok((state, lines)),
        Err(e) => {
            return Err(AnchorageError::storage(format!(
                "failed to read {}: {e}",
                path.display()
            )))
        }
    };

    let mut offset = 0usize;
    for (number, line) in contents.split_inclusive('\n').enumerate() {
        let complete = line.ends_with('\n');
        let body = line.trim_end();
        if !body.is_empty() {
            match serde_json::from_str::<Value>(body) {
                Ok(doc) => {
                    state.replay(doc)?;
                    lines += 1;
                    if !complete {
                        debug!(collection = %collection, "terminating unfinished last line");
                        terminate_line(path)?;
                    }
                }
                Err(e) if !complete => {
                    warn!(
                        collection = %collection,
                        line = number + 1,
                        error = %e,
                        "dropping torn trailing write"
                    );
                    truncate(path, offset)?;
                    break;
                }
                Err(e) => {
                    return Err(AnchorageError::corruption(format!(
                        "{} line {}: {e}",
                        path.display(),
                        number + 1
                    )))
                }
            }
        }
        offset += line.len();
    }
    Ok((state, lines))
}

fn truncate(path: &Path, len: usize) -> Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len as u64)?;
    Ok(())
}

fn terminate_line(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(b"\n")?;
    file.sync_data()?;
    Ok(())
}

/// Rewrite a changelog to hold exactly `docs`, replacing it atomically
fn compact(path: &Path, docs: &[Value]) -> Result<()> {
    let staging = path.with_extension("jsonl.compact");
    {
        let mut writer = BufWriter::new(File::create(&staging)?);
        for doc in docs {
            write_line(&mut writer, doc)?;
        }
        writer.flush()?;
        writer.get_ref().sync_data()?;
    }
    fs::rename(&staging, path).map_err(|e| {
        AnchorageError::storage(format!("failed to replace {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_reopen_replays_last_write_per_root() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store
                .upsert(Collection::Anchors, json!({"merkle_root": "aa", "confirmations": 0}))
                .unwrap();
            store
                .upsert(Collection::Anchors, json!({"merkle_root": "aa", "confirmations": 3}))
                .unwrap();
            store.flush().unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        let anchors = store.read_all(Collection::Anchors).unwrap();
        assert_eq!(anchors, vec![json!({"merkle_root": "aa", "confirmations": 3})]);
    }

    #[test]
    fn test_changelog_is_json_lines() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store
            .append(Collection::RawRecords, json!({"record_id": "a", "v": 1}))
            .unwrap();
        store.flush().unwrap();

        let text = fs::read_to_string(dir.path().join("raw_records.jsonl")).unwrap();
        assert_eq!(text, "{\"record_id\":\"a\",\"v\":1}\n");
    }

    #[test]
    fn test_torn_trailing_line_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("headers.jsonl");
        fs::write(&path, "{\"height\":0}\n{\"heig").unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.read_all(Collection::Headers).unwrap().len(), 1);
        store
            .append(Collection::Headers, json!({"height": 1}))
            .unwrap();
        store.flush().unwrap();
        drop(store);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\"height\":0}\n{\"height\":1}\n");
    }

    #[test]
    fn test_unterminated_last_line_is_kept_and_terminated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("headers.jsonl");
        fs::write(&path, "{\"height\":0,\"hash\":\"00\"}").unwrap();

        {
            let store = FileStore::open(dir.path()).unwrap();
            assert_eq!(store.read_all(Collection::Headers).unwrap().len(), 1);
            store
                .append(Collection::Headers, json!({"height": 1, "hash": "01"}))
                .unwrap();
            store.flush().unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        let heights: Vec<Value> = store
            .read_all(Collection::Headers)
            .unwrap()
            .into_iter()
            .map(|doc| doc["height"].clone())
            .collect();
        assert_eq!(heights, vec![json!(0), json!(1)]);
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_keyed_changelog_compacted_on_open() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            for confirmations in 0..5 {
                store
                    .upsert(
                        Collection::Anchors,
                        json!({"merkle_root": "aa", "confirmations": confirmations}),
                    )
                    .unwrap();
            }
            store
                .upsert(Collection::Anchors, json!({"merkle_root": "bb", "confirmations": 0}))
                .unwrap();
            store.flush().unwrap();
        }
        let path = dir.path().join("anchors.jsonl");
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 6);

        let store = FileStore::open(dir.path()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "{\"confirmations\":4,\"merkle_root\":\"aa\"}\n{\"confirmations\":0,\"merkle_root\":\"bb\"}\n"
        );
        assert!(!dir.path().join("anchors.jsonl.compact").exists());

        // Appends after compaction land in the new file.
        store
            .upsert(Collection::Anchors, json!({"merkle_root": "bb", "confirmations": 1}))
            .unwrap();
        store.flush().unwrap();
        drop(store);
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get(Collection::Anchors, "bb").unwrap().unwrap()["confirmations"],
            json!(1)
        );
    }

    #[test]
    fn test_garbage_mid_file_is_corruption() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("batches.jsonl"), "not json\n{}\n").unwrap();
        assert_matches!(
            FileStore::open(dir.path()),
            Err(AnchorageError::Corruption { .. })
        );
    }
}
