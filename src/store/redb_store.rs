//! redb-backed metadata store
//!
//! Composite keys are `"{project}:{...}"` strings; structured values are
//! JSON. Every table is created when the database is opened so readers
//! never see a missing table.

use super::{BlameRecord, MetadataStore, StoreConnector};
use crate::cache::ensure_parent_dir;
use crate::error::MineResult;
use crate::models::{CommitFacts, CommitSize, DeveloperInfo};
use redb::{ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");
const PROJECTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("projects");
const AUTHORS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("authors");
const FILE_PATHS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("file_paths");
const COMMITS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("commits");
const FILE_ASSOC_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("file_assoc");
const BLAME_FILES_TABLE: TableDefinition<&str, u64> = TableDefinition::new("blame_files");
const BLAMES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("blames");
const DEVELOPERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("developers");
const BRANCHES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("branches");

#[derive(Debug, Serialize, Deserialize)]
struct ProjectRow {
    id: u64,
    name: String,
    path: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AuthorRow {
    id: u64,
    name: String,
    email: String,
}

/// Shared database; `connect` hands out sessions.
#[derive(Clone)]
pub struct RedbConnector {
    db: Arc<redb::Database>,
}

impl RedbConnector {
    /// Create or open a database file.
    pub fn open(path: &Path) -> MineResult<Self> {
        ensure_parent_dir(path)?;
        let db = redb::Database::create(path)?;
        debug!("Opened mining database at {}", path.display());
        Self::init(db)
    }

    /// Non-persistent database.
    pub fn in_memory() -> MineResult<Self> {
        let db = redb::Builder::new()
            .create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: redb::Database) -> MineResult<Self> {
        let txn = db.begin_write()?;
        txn.open_table(COUNTERS_TABLE)?;
        txn.open_table(PROJECTS_TABLE)?;
        txn.open_table(AUTHORS_TABLE)?;
        txn.open_table(FILE_PATHS_TABLE)?;
        txn.open_table(COMMITS_TABLE)?;
        txn.open_table(FILE_ASSOC_TABLE)?;
        txn.open_table(BLAME_FILES_TABLE)?;
        txn.open_table(BLAMES_TABLE)?;
        txn.open_table(DEVELOPERS_TABLE)?;
        txn.open_table(BRANCHES_TABLE)?;
        txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl StoreConnector for RedbConnector {
    fn connect(&self) -> MineResult<Box<dyn MetadataStore>> {
        Ok(Box::new(RedbStore {
            db: Arc::clone(&self.db),
        }))
    }
}

/// One session on a shared redb database.
pub struct RedbStore {
    db: Arc<redb::Database>,
}

fn next_id(txn: &WriteTransaction, counter: &str) -> MineResult<u64> {
    let mut table = txn.open_table(COUNTERS_TABLE)?;
    let current = table.get(counter)?.map(|v| v.value()).unwrap_or(0);
    table.insert(counter, current + 1)?;
    Ok(current + 1)
}

fn key(project: u64, rest: &str) -> String {
    format!("{}:{}", project, rest)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> MineResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decode every value whose key starts with `prefix`.
fn scan_prefix<T, R>(table: &R, prefix: &str) -> MineResult<Vec<(String, T)>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let mut out = Vec::new();
    for item in table.range::<&str>(prefix..)? {
        let (k, v) = item?;
        if !k.value().starts_with(prefix) {
            break;
        }
        out.push((k.value().to_string(), decode(v.value())?));
    }
    Ok(out)
}

impl RedbStore {
    fn get_json<T: DeserializeOwned>(
        &self,
        def: JsonTable,
        k: &str,
    ) -> MineResult<Option<T>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(def)?;
        let value = table.get(k)?;
        value.map(|v| decode(v.value())).transpose()
    }

    fn put_json<T: Serialize>(
        &self,
        def: JsonTable,
        k: &str,
        value: &T,
    ) -> MineResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(def)?;
            table.insert(k, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn scan_json<T: DeserializeOwned>(
        &self,
        def: JsonTable,
        prefix: &str,
    ) -> MineResult<Vec<(String, T)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(def)?;
        scan_prefix(&table, prefix)
    }
}

impl MetadataStore for RedbStore {
    fn get_or_create_project(&self, name: &str, path: &str) -> MineResult<u64> {
        let txn = self.db.begin_write()?;
        let existing = {
            let table = txn.open_table(PROJECTS_TABLE)?;
            let row = table.get(name)?;
            row.map(|v| decode::<ProjectRow>(v.value())).transpose()?
        };
        if let Some(row) = existing {
            txn.abort()?;
            return Ok(row.id);
        }

        let id = next_id(&txn, "project")?;
        let row = ProjectRow {
            id,
            name: name.to_string(),
            path: path.to_string(),
        };
        {
            let mut table = txn.open_table(PROJECTS_TABLE)?;
            table.insert(name, serde_json::to_vec(&row)?.as_slice())?;
        }
        txn.commit()?;
        debug!("Created project {} ({}) with id {}", name, path, id);
        Ok(id)
    }

    fn commit_exists(&self, project: u64, commit_id: &str) -> MineResult<bool> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(COMMITS_TABLE)?;
        let found = table.get(key(project, commit_id).as_str())?.is_some();
        Ok(found)
    }

    fn get_or_create_author(&self, project: u64, email: &str, name: &str) -> MineResult<u64> {
        let k = key(project, email);
        let txn = self.db.begin_write()?;
        let existing = {
            let table = txn.open_table(AUTHORS_TABLE)?;
            let row = table.get(k.as_str())?;
            row.map(|v| decode::<AuthorRow>(v.value())).transpose()?
        };
        if let Some(row) = existing {
            txn.abort()?;
            return Ok(row.id);
        }

        let id = next_id(&txn, "author")?;
        let row = AuthorRow {
            id,
            name: name.to_string(),
            email: email.to_string(),
        };
        {
            let mut table = txn.open_table(AUTHORS_TABLE)?;
            table.insert(k.as_str(), serde_json::to_vec(&row)?.as_slice())?;
        }
        txn.commit()?;
        Ok(id)
    }

    fn get_or_create_file_path(&self, project: u64, path: &str) -> MineResult<u64> {
        let k = key(project, path);
        let txn = self.db.begin_write()?;
        let existing = {
            let table = txn.open_table(FILE_PATHS_TABLE)?;
            let id = table.get(k.as_str())?.map(|v| v.value());
            id
        };
        if let Some(id) = existing {
            txn.abort()?;
            return Ok(id);
        }

        let id = next_id(&txn, "file_path")?;
        {
            let mut table = txn.open_table(FILE_PATHS_TABLE)?;
            table.insert(k.as_str(), id)?;
        }
        txn.commit()?;
        Ok(id)
    }

    fn list_file_paths(&self, project: u64) -> MineResult<Vec<(String, u64)>> {
        let prefix = key(project, "");
        let txn = self.db.begin_read()?;
        let table = txn.open_table(FILE_PATHS_TABLE)?;
        let mut out = Vec::new();
        for item in table.range::<&str>(prefix.as_str()..)? {
            let (k, v) = item?;
            let Some(path) = k.value().strip_prefix(prefix.as_str()) else {
                break;
            };
            out.push((path.to_string(), v.value()));
        }
        Ok(out)
    }

    fn insert_commit_facts(&self, project: u64, facts: &CommitFacts) -> MineResult<bool> {
        let k = key(project, &facts.commit_id);
        let bytes = serde_json::to_vec(facts)?;
        let path_ids: Vec<u64> = facts.files.iter().map(|f| f.path_id).collect();
        let assoc = serde_json::to_vec(&path_ids)?;
        let txn = self.db.begin_write()?;
        let exists = {
            let table = txn.open_table(COMMITS_TABLE)?;
            let exists = table.get(k.as_str())?.is_some();
            exists
        };
        if exists {
            txn.abort()?;
            return Ok(false);
        }
        {
            let mut commits = txn.open_table(COMMITS_TABLE)?;
            commits.insert(k.as_str(), bytes.as_slice())?;
            let mut associations = txn.open_table(FILE_ASSOC_TABLE)?;
            associations.insert(k.as_str(), assoc.as_slice())?;
        }
        txn.commit()?;
        Ok(true)
    }

    fn file_associations(&self, project: u64, commit_id: &str) -> MineResult<Vec<u64>> {
        Ok(self
            .get_json(FILE_ASSOC_TABLE, &key(project, commit_id))?
            .unwrap_or_default())
    }

    fn get_commit_facts(&self, project: u64, commit_id: &str) -> MineResult<Option<CommitFacts>> {
        self.get_json(COMMITS_TABLE, &key(project, commit_id))
    }

    fn get_blame_file_record_id(
        &self,
        project: u64,
        path_id: u64,
        head: &str,
    ) -> MineResult<Option<u64>> {
        let k = key(project, &format!("{}:{}", head, path_id));
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BLAME_FILES_TABLE)?;
        let id = table.get(k.as_str())?.map(|v| v.value());
        Ok(id)
    }

    fn insert_blame_file(
        &self,
        project: u64,
        path_id: u64,
        head: &str,
        records: &[BlameRecord],
    ) -> MineResult<u64> {
        let k = key(project, &format!("{}:{}", head, path_id));
        let txn = self.db.begin_write()?;
        let existing = {
            let table = txn.open_table(BLAME_FILES_TABLE)?;
            let id = table.get(k.as_str())?.map(|v| v.value());
            id
        };
        if let Some(id) = existing {
            txn.abort()?;
            return Ok(id);
        }
        let id = next_id(&txn, "blame_file")?;
        {
            let mut markers = txn.open_table(BLAME_FILES_TABLE)?;
            markers.insert(k.as_str(), id)?;
            let mut blames = txn.open_table(BLAMES_TABLE)?;
            for record in records {
                let stamped = BlameRecord {
                    blame_file_id: id,
                    path_id,
                    ..record.clone()
                };
                let rk = key(
                    project,
                    &format!("{}:{}:{}", head, path_id, record.author_email),
                );
                blames.insert(rk.as_str(), serde_json::to_vec(&stamped)?.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(id)
    }

    fn get_blame_records(&self, project: u64, head: &str) -> MineResult<Vec<BlameRecord>> {
        let prefix = key(project, &format!("{}:", head));
        Ok(self
            .scan_json(BLAMES_TABLE, &prefix)?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    fn merge_developer_aggregates(
        &self,
        project: u64,
        developers: &HashMap<String, DeveloperInfo>,
    ) -> MineResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DEVELOPERS_TABLE)?;
            for (email, info) in developers {
                let k = key(project, email);
                table.insert(k.as_str(), serde_json::to_vec(info)?.as_slice())?;
            }
        }
        txn.commit()?;
        debug!("Stored {} developer rows for project {}", developers.len(), project);
        Ok(())
    }

    fn developers(&self, project: u64) -> MineResult<Vec<DeveloperInfo>> {
        Ok(self
            .scan_json(DEVELOPERS_TABLE, &key(project, ""))?
            .into_iter()
            .map(|(_, dev)| dev)
            .collect())
    }

    fn commit_sizes(&self, project: u64, path: Option<&str>) -> MineResult<Vec<CommitSize>> {
        let fragment = path.filter(|p| !p.is_empty());
        let commits: Vec<(String, CommitFacts)> = self.scan_json(COMMITS_TABLE, &key(project, ""))?;

        let mut sizes: Vec<CommitSize> = commits
            .into_iter()
            .filter_map(|(_, facts)| {
                let file_sizes: BTreeMap<String, u64> = facts
                    .files
                    .iter()
                    .filter(|f| fragment.map_or(true, |frag| f.path.contains(frag)))
                    .map(|f| (f.path.clone(), f.size_after))
                    .collect();
                if fragment.is_some() && file_sizes.is_empty() {
                    return None;
                }
                Some(CommitSize {
                    name: facts.commit_id,
                    project_size: facts.size,
                    file_sizes,
                    author_name: facts.author_name,
                    author_email: facts.author_email,
                    stability: facts.stability,
                    date: facts.time,
                })
            })
            .collect();
        sizes.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
        Ok(sizes)
    }

    fn insert_branch_commits(
        &self,
        project: u64,
        branch: &str,
        commits: &[String],
    ) -> MineResult<()> {
        self.put_json(BRANCHES_TABLE, &key(project, branch), &commits)
    }

    fn branch_commits(&self, project: u64, branch: &str) -> MineResult<Vec<String>> {
        Ok(self
            .get_json(BRANCHES_TABLE, &key(project, branch))?
            .unwrap_or_default())
    }
}
