//! The backing entity + key/value store the engine runs against.
//!
//! Profile storage is an external collaborator; [`Store`] captures the only
//! operations this crate needs from it: talent lookup, source-scoped meta
//! values, and relationship reads. Two implementations are provided —
//! [`MemoryStore`] for tests and short-lived runs, and [`JsonStore`], a
//! directory of JSON documents used by the CLI.

use crate::Result;
use crate::model::{RelationKind, Relationship, Talent, TalentId, TalentKind};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

const LOG_TARGET: &str = "     store";

/// Storage backing store, as seen by the collectors and the score engine.
///
/// Writes are last-write-wins; refresh computations are idempotent, so no
/// locking beyond per-call consistency is required.
pub trait Store: Send + Sync + core::fmt::Debug {
    /// Look up a talent by id.
    fn talent(&self, id: TalentId) -> Option<Talent>;

    /// Look up the talent bound to a source-site username, if any.
    fn talent_by_username(&self, username: &str) -> Option<Talent>;

    /// All talents, in id order.
    fn talents(&self) -> Vec<Talent>;

    /// Create a new talent bound to `username`.
    fn create_talent(&self, username: &str, name: &str, kind: TalentKind) -> Result<Talent>;

    /// Persist updated identity fields for an existing talent.
    fn update_talent(&self, talent: &Talent) -> Result<()>;

    /// Remove a talent and all of its meta values and relationships.
    fn delete_talent(&self, id: TalentId) -> Result<()>;

    /// Read a meta value stored against a talent.
    fn get_meta(&self, id: TalentId, key: &str) -> Option<Value>;

    /// Write a meta value against a talent.
    fn put_meta(&self, id: TalentId, key: &str, value: Value) -> Result<()>;

    /// Outgoing relationships of the given kind.
    fn related(&self, from: TalentId, kind: RelationKind) -> Vec<Relationship>;

    /// Record a relationship edge. The engine itself never calls this; it
    /// exists so hosts and tests can populate the graph.
    fn add_relationship(&self, relationship: Relationship) -> Result<()>;
}

/// One talent plus its meta values, as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TalentRecord {
    talent: Talent,

    #[serde(default)]
    meta: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    records: BTreeMap<TalentId, TalentRecord>,
    relationships: Vec<Relationship>,
    next_id: u64,
}

/// In-memory store, primarily for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryInner> {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryInner> {
        self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn talent(&self, id: TalentId) -> Option<Talent> {
        self.read().records.get(&id).map(|r| r.talent.clone())
    }

    fn talent_by_username(&self, username: &str) -> Option<Talent> {
        self.read()
            .records
            .values()
            .find(|r| r.talent.username.eq_ignore_ascii_case(username))
            .map(|r| r.talent.clone())
    }

    fn talents(&self) -> Vec<Talent> {
        self.read().records.values().map(|r| r.talent.clone()).collect()
    }

    fn create_talent(&self, username: &str, name: &str, kind: TalentKind) -> Result<Talent> {
        let mut inner = self.write();
        inner.next_id += 1;
        let talent = Talent::new(TalentId(inner.next_id), username, name, kind);
        let _ = inner.records.insert(
            talent.id,
            TalentRecord {
                talent: talent.clone(),
                meta: BTreeMap::new(),
            },
        );
        Ok(talent)
    }

    fn update_talent(&self, talent: &Talent) -> Result<()> {
        let mut inner = self.write();
        let record = inner
            .records
            .get_mut(&talent.id)
            .ok_or_else(|| ohno::app_err!("no talent with id {}", talent.id))?;
        record.talent = talent.clone();
        Ok(())
    }

    fn delete_talent(&self, id: TalentId) -> Result<()> {
        let mut inner = self.write();
        let _ = inner.records.remove(&id);
        inner.relationships.retain(|r| r.from != id && r.to != id);
        Ok(())
    }

    fn get_meta(&self, id: TalentId, key: &str) -> Option<Value> {
        self.read().records.get(&id).and_then(|r| r.meta.get(key).cloned())
    }

    fn put_meta(&self, id: TalentId, key: &str, value: Value) -> Result<()> {
        let mut inner = self.write();
        let record = inner
            .records
            .get_mut(&id)
            .ok_or_else(|| ohno::app_err!("no talent with id {id}"))?;
        let _ = record.meta.insert(key.to_owned(), value);
        Ok(())
    }

    fn related(&self, from: TalentId, kind: RelationKind) -> Vec<Relationship> {
        self.read()
            .relationships
            .iter()
            .filter(|r| r.from == from && r.kind == kind)
            .cloned()
            .collect()
    }

    fn add_relationship(&self, relationship: Relationship) -> Result<()> {
        self.write().relationships.push(relationship);
        Ok(())
    }
}

/// Directory-backed store: one JSON document per talent plus a relationship
/// list, written the same way the collectors' cache envelopes are.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(dir.join("talents")).into_app_err_with(|| format!("unable to create store directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    fn talent_path(&self, id: TalentId) -> PathBuf {
        self.dir.join("talents").join(format!("{id}.json"))
    }

    fn relationships_path(&self) -> PathBuf {
        self.dir.join("relationships.json")
    }

    fn load_record(&self, id: TalentId) -> Option<TalentRecord> {
        load_json(self.talent_path(id)).ok()
    }

    fn save_record(&self, record: &TalentRecord) -> Result<()> {
        save_json(record, self.talent_path(record.talent.id))
    }

    fn load_relationships(&self) -> Vec<Relationship> {
        load_json(self.relationships_path()).unwrap_or_default()
    }

    fn record_ids(&self) -> Vec<TalentId> {
        let Ok(entries) = fs::read_dir(self.dir.join("talents")) else {
            return Vec::new();
        };

        let mut ids: Vec<TalentId> = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                name.strip_suffix(".json")?.parse().ok().map(TalentId)
            })
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl Store for JsonStore {
    fn talent(&self, id: TalentId) -> Option<Talent> {
        self.load_record(id).map(|r| r.talent)
    }

    fn talent_by_username(&self, username: &str) -> Option<Talent> {
        self.talents()
            .into_iter()
            .find(|t| t.username.eq_ignore_ascii_case(username))
    }

    fn talents(&self) -> Vec<Talent> {
        self.record_ids().into_iter().filter_map(|id| self.talent(id)).collect()
    }

    fn create_talent(&self, username: &str, name: &str, kind: TalentKind) -> Result<Talent> {
        let next = self.record_ids().last().map_or(1, |id| id.0 + 1);
        let talent = Talent::new(TalentId(next), username, name, kind);

        self.save_record(&TalentRecord {
            talent: talent.clone(),
            meta: BTreeMap::new(),
        })?;

        log::debug!(target: LOG_TARGET, "Created talent {next} for username '{username}'");
        Ok(talent)
    }

    fn update_talent(&self, talent: &Talent) -> Result<()> {
        let mut record = self
            .load_record(talent.id)
            .ok_or_else(|| ohno::app_err!("no talent with id {}", talent.id))?;
        record.talent = talent.clone();
        self.save_record(&record)
    }

    fn delete_talent(&self, id: TalentId) -> Result<()> {
        let path = self.talent_path(id);
        if path.exists() {
            fs::remove_file(&path).into_app_err_with(|| format!("unable to remove '{}'", path.display()))?;
        }

        let mut relationships = self.load_relationships();
        relationships.retain(|r| r.from != id && r.to != id);
        save_json(&relationships, self.relationships_path())
    }

    fn get_meta(&self, id: TalentId, key: &str) -> Option<Value> {
        self.load_record(id).and_then(|mut r| r.meta.remove(key))
    }

    fn put_meta(&self, id: TalentId, key: &str, value: Value) -> Result<()> {
        let mut record = self.load_record(id).ok_or_else(|| ohno::app_err!("no talent with id {id}"))?;
        let _ = record.meta.insert(key.to_owned(), value);
        self.save_record(&record)
    }

    fn related(&self, from: TalentId, kind: RelationKind) -> Vec<Relationship> {
        self.load_relationships()
            .into_iter()
            .filter(|r| r.from == from && r.kind == kind)
            .collect()
    }

    fn add_relationship(&self, relationship: Relationship) -> Result<()> {
        let mut relationships = self.load_relationships();
        relationships.push(relationship);
        save_json(&relationships, self.relationships_path())
    }
}

/// Load a JSON document from a file.
fn load_json<T>(path: impl AsRef<Path>) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let path = path.as_ref();
    let file = File::open(path).into_app_err_with(|| format!("unable to open file '{}'", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).into_app_err_with(|| format!("unable to parse file '{}'", path.display()))
}

/// Save a JSON document to a file.
fn save_json<T>(data: &T, path: impl AsRef<Path>) -> Result<()>
where
    T: Serialize,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
    }

    let file = File::create(path).into_app_err_with(|| format!("unable to create file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    // Pretty in debug builds for easier inspection, compact in release.
    #[cfg(debug_assertions)]
    let result = serde_json::to_writer_pretty(&mut writer, data);
    #[cfg(not(debug_assertions))]
    let result = serde_json::to_writer(&mut writer, data);

    result.into_app_err_with(|| format!("unable to write file '{}'", path.display()))?;
    writer
        .flush()
        .into_app_err_with(|| format!("unable to flush file '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(store: &dyn Store) -> Talent {
        store.create_talent("johndoe", "John Doe", TalentKind::Person).unwrap()
    }

    #[test]
    fn memory_store_round_trips_talents_and_meta() {
        let store = MemoryStore::new();
        let talent = seed(&store);

        assert_eq!(store.talent(talent.id), Some(talent.clone()));
        assert_eq!(store.talent_by_username("JohnDoe").map(|t| t.id), Some(talent.id));
        assert!(store.talent_by_username("nobody").is_none());

        store
            .put_meta(talent.id, "_avatar", Value::String("https://example.com/a.png".to_owned()))
            .unwrap();
        assert_eq!(
            store.get_meta(talent.id, "_avatar"),
            Some(Value::String("https://example.com/a.png".to_owned()))
        );
        assert!(store.get_meta(talent.id, "_plugins").is_none());
    }

    #[test]
    fn memory_store_delete_removes_everything() {
        let store = MemoryStore::new();
        let company = store.create_talent("acme", "Acme", TalentKind::Company).unwrap();
        let person = seed(&store);

        store
            .add_relationship(Relationship {
                from: company.id,
                to: person.id,
                kind: RelationKind::Team,
                role: Some("Developer".to_owned()),
            })
            .unwrap();

        store.delete_talent(person.id).unwrap();
        assert!(store.talent(person.id).is_none());
        assert!(store.related(company.id, RelationKind::Team).is_empty());
    }

    #[test]
    fn json_store_round_trips_talents_and_meta() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::open(tmp.path()).unwrap();
        let talent = seed(&store);

        assert_eq!(store.talent(talent.id), Some(talent.clone()));

        store.put_meta(talent.id, "_codex", serde_json::json!({"edit_count": 12})).unwrap();
        assert_eq!(store.get_meta(talent.id, "_codex"), Some(serde_json::json!({"edit_count": 12})));

        // Ids keep increasing past deleted records.
        let second = store.create_talent("janedoe", "Jane Doe", TalentKind::Person).unwrap();
        assert_eq!(second.id, TalentId(talent.id.0 + 1));
    }

    #[test]
    fn json_store_relationships_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = JsonStore::open(tmp.path()).unwrap();
            let company = store.create_talent("acme", "Acme", TalentKind::Company).unwrap();
            let person = store.create_talent("johndoe", "John Doe", TalentKind::Person).unwrap();
            store
                .add_relationship(Relationship {
                    from: company.id,
                    to: person.id,
                    kind: RelationKind::Team,
                    role: None,
                })
                .unwrap();
        }

        let reopened = JsonStore::open(tmp.path()).unwrap();
        let company = reopened.talent_by_username("acme").unwrap();
        assert_eq!(reopened.related(company.id, RelationKind::Team).len(), 1);
        assert!(reopened.related(company.id, RelationKind::Hiring).is_empty());
    }
}
