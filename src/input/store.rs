//! JSON array stores for seekers, offers and matches

use crate::error::{JobbotError, Result, SkippedEntity};
use crate::input::records::{JobOffer, JobSeeker, MatchRecord, RawJobOffer, RawJobSeeker};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Records accepted at the ingestion boundary, plus those that were rejected
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub rejected: Vec<SkippedEntity>,
}

impl<T> Loaded<T> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the raw JSON array; a missing file is a storage error.
    pub fn load_values(&self) -> Result<Vec<Value>> {
        info!("Reading store at: {}", self.path.display());
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            JobbotError::Storage(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        match serde_json::from_str::<Value>(&content)? {
            Value::Array(values) => Ok(values),
            Value::Null => Ok(Vec::new()),
            _ => Err(JobbotError::Storage(format!(
                "{} does not contain a JSON array",
                self.path.display()
            ))),
        }
    }

    /// Like `load_values`, but a store that was never written reads as empty.
    pub fn load_values_or_empty(&self) -> Result<Vec<Value>> {
        if self.exists() {
            self.load_values()
        } else {
            Ok(Vec::new())
        }
    }

    pub fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let values = self.load_values()?;
        values
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(JobbotError::from))
            .collect()
    }

    pub fn save<T: Serialize + ?Sized>(&self, records: &T) -> Result<()> {
        let content = serde_json::to_vec_pretty(records)?;
        write_atomic(&self.path, &content)?;
        info!("Stored file at: {}", self.path.display());
        Ok(())
    }
}

/// Publish `bytes` at `path` all-or-nothing: write a sibling temp file, then rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let mut temp = NamedTempFile::new_in(&parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;
    Ok(())
}

pub fn load_job_seekers(path: &Path, separator: char) -> Result<Loaded<JobSeeker>> {
    let values = JsonStore::new(path).load_values()?;
    let mut loaded = Loaded::empty();
    let mut seen = HashSet::new();

    for (index, value) in values.into_iter().enumerate() {
        let fallback_id = record_label(&value, "user_id", index);
        let parsed = serde_json::from_value::<RawJobSeeker>(value)
            .map_err(|e| JobbotError::data_integrity(&fallback_id, e.to_string()))
            .and_then(JobSeeker::try_from)
            .and_then(|seeker| {
                if seeker.user_id.contains(separator) {
                    Err(JobbotError::data_integrity(
                        &seeker.user_id,
                        format!("user id contains the match separator '{}'", separator),
                    ))
                } else if !seen.insert(seeker.user_id.clone()) {
                    Err(JobbotError::data_integrity(&seeker.user_id, "duplicate user id"))
                } else {
                    Ok(seeker)
                }
            });

        match parsed {
            Ok(seeker) => loaded.records.push(seeker),
            Err(err) => {
                warn!("Rejecting job seeker record: {}", err);
                loaded.rejected.push(SkippedEntity::from_error(&fallback_id, &err));
            }
        }
    }

    Ok(loaded)
}

pub fn load_job_offers(path: &Path) -> Result<Loaded<JobOffer>> {
    let values = JsonStore::new(path).load_values()?;
    Ok(parse_job_offers(values))
}

pub fn parse_job_offers(values: Vec<Value>) -> Loaded<JobOffer> {
    let mut loaded = Loaded::empty();
    let mut seen = HashSet::new();

    for (index, value) in values.into_iter().enumerate() {
        let fallback_id = record_label(&value, "job_id", index);
        let parsed = serde_json::from_value::<RawJobOffer>(value)
            .map_err(|e| JobbotError::data_integrity(&fallback_id, e.to_string()))
            .and_then(JobOffer::try_from)
            .and_then(|offer| {
                if seen.insert(offer.job_id.clone()) {
                    Ok(offer)
                } else {
                    Err(JobbotError::data_integrity(&offer.job_id, "duplicate job id"))
                }
            });

        match parsed {
            Ok(offer) => loaded.records.push(offer),
            Err(err) => {
                warn!("Rejecting job offer record: {}", err);
                loaded.rejected.push(SkippedEntity::from_error(&fallback_id, &err));
            }
        }
    }

    loaded
}

/// The persisted match set; an absent store means no run has produced matches yet.
pub fn load_matches(path: &Path) -> Result<Vec<MatchRecord>> {
    let store = JsonStore::new(path);
    if !store.exists() {
        return Ok(Vec::new());
    }
    store.load()
}

fn record_label(value: &Value, id_field: &str, index: usize) -> String {
    value
        .get(id_field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("record #{}", index))
}
