//! Dated embedding snapshots
//!
//! Layout: `<root>/<YYYY-MM-DD>/{users,jobs}.json`. Each file is a columnar table
//! (one JSON array per column, rows aligned by position). A snapshot is never
//! modified after it is published; the latest valid date is the current cache.

use crate::error::{JobbotError, Result};
use crate::input::store::write_atomic;
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";
const SKILL_COLUMN: &str = "avg_skill_embeds";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Seeker,
    Job,
}

impl EntityKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            EntityKind::Seeker => "users.json",
            EntityKind::Job => "jobs.json",
        }
    }

    pub fn id_column(&self) -> &'static str {
        match self {
            EntityKind::Seeker => "user_id",
            EntityKind::Job => "job_id",
        }
    }

    /// Seekers store the mean of their desired-role embeddings, jobs their title embedding.
    pub fn role_column(&self) -> &'static str {
        match self {
            EntityKind::Seeker => "avg_role_embeds",
            EntityKind::Job => "role_embeds",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Seeker => write!(f, "users"),
            EntityKind::Job => write!(f, "jobs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub entity_id: String,
    pub avg_skill_embedding: Vec<f32>,
    pub role_embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub kind: EntityKind,
    /// `None` when no snapshot has been published yet
    pub date: Option<NaiveDate>,
    pub records: Vec<EmbeddingRecord>,
}

impl Snapshot {
    pub fn empty(kind: EntityKind) -> Self {
        Self {
            kind,
            date: None,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.entity_id.as_str())
    }

    pub fn index(&self) -> HashMap<&str, &EmbeddingRecord> {
        self.records.iter().map(|r| (r.entity_id.as_str(), r)).collect()
    }

    pub fn get(&self, entity_id: &str) -> Option<&EmbeddingRecord> {
        self.records.iter().find(|r| r.entity_id == entity_id)
    }

    fn to_columns(&self) -> Value {
        let mut ids = Vec::with_capacity(self.records.len());
        let mut skills = Vec::with_capacity(self.records.len());
        let mut roles = Vec::with_capacity(self.records.len());
        for record in &self.records {
            ids.push(Value::from(record.entity_id.clone()));
            skills.push(Value::from(record.avg_skill_embedding.clone()));
            roles.push(Value::from(record.role_embedding.clone()));
        }

        let mut table = Map::new();
        table.insert(self.kind.id_column().to_string(), Value::Array(ids));
        table.insert(SKILL_COLUMN.to_string(), Value::Array(skills));
        table.insert(self.kind.role_column().to_string(), Value::Array(roles));
        Value::Object(table)
    }

    fn from_columns(kind: EntityKind, date: NaiveDate, table: Value, source: &Path) -> Result<Self> {
        let corrupt = |what: String| JobbotError::Storage(format!("{}: {}", source.display(), what));

        let mut table = match table {
            Value::Object(map) => map,
            _ => return Err(corrupt("snapshot is not a columnar table".to_string())),
        };
        let mut column = |name: &str| -> Result<Value> {
            table
                .remove(name)
                .ok_or_else(|| corrupt(format!("missing column '{}'", name)))
        };

        let ids: Vec<String> = serde_json::from_value(column(kind.id_column())?)?;
        // A null cell loads as an empty vector; the cache builder drops such rows
        let skills: Vec<Option<Vec<f32>>> = serde_json::from_value(column(SKILL_COLUMN)?)?;
        let roles: Vec<Option<Vec<f32>>> = serde_json::from_value(column(kind.role_column())?)?;

        if ids.len() != skills.len() || ids.len() != roles.len() {
            return Err(corrupt(format!(
                "column lengths differ ({} ids, {} skill rows, {} role rows)",
                ids.len(),
                skills.len(),
                roles.len()
            )));
        }

        let records = ids
            .into_iter()
            .zip(skills)
            .zip(roles)
            .map(|((entity_id, avg_skill_embedding), role_embedding)| EmbeddingRecord {
                entity_id,
                avg_skill_embedding: avg_skill_embedding.unwrap_or_default(),
                role_embedding: role_embedding.unwrap_or_default(),
            })
            .collect();

        Ok(Self {
            kind,
            date: Some(date),
            records,
        })
    }
}

/// Reads and publishes snapshots under a root directory
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn snapshot_path(&self, kind: EntityKind, date: NaiveDate) -> PathBuf {
        self.root.join(date.format(DATE_FORMAT).to_string()).join(kind.file_name())
    }

    /// Dates that hold a snapshot for `kind`, oldest first. Non-date folders are ignored.
    pub fn available_dates(&self, kind: EntityKind) -> Result<Vec<NaiveDate>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut dates = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match NaiveDate::parse_from_str(&name, DATE_FORMAT) {
                Ok(date) if entry.path().join(kind.file_name()).is_file() => dates.push(date),
                Ok(_) => {}
                Err(_) => debug!("Ignoring non-date folder {} in {}", name, self.root.display()),
            }
        }

        dates.sort();
        Ok(dates)
    }

    pub fn last_run(&self, kind: EntityKind) -> Result<Option<NaiveDate>> {
        Ok(self.available_dates(kind)?.pop())
    }

    /// The current cache for `kind`; empty when nothing has been published yet.
    pub fn load_latest(&self, kind: EntityKind) -> Result<Snapshot> {
        match self.last_run(kind)? {
            Some(date) => self.load(kind, date),
            None => Ok(Snapshot::empty(kind)),
        }
    }

    pub fn load(&self, kind: EntityKind, date: NaiveDate) -> Result<Snapshot> {
        let path = self.snapshot_path(kind, date);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| JobbotError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
        let table: Value = serde_json::from_str(&content)?;
        Snapshot::from_columns(kind, date, table, &path)
    }

    /// Publish `records` as the `date` snapshot, replacing one written earlier that day.
    pub fn write(&self, kind: EntityKind, date: NaiveDate, records: Vec<EmbeddingRecord>) -> Result<Snapshot> {
        let snapshot = Snapshot {
            kind,
            date: Some(date),
            records,
        };
        let path = self.snapshot_path(kind, date);
        let bytes = serde_json::to_vec(&snapshot.to_columns())?;
        write_atomic(&path, &bytes)
            .map_err(|e| JobbotError::Storage(format!("Failed to publish {}: {}", path.display(), e)))?;

        info!("Stored {} {} embeddings at {}", snapshot.len(), kind, path.display());
        Ok(snapshot)
    }
}
