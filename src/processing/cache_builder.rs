//! Incremental embedding cache
//!
//! Only entities absent from the latest snapshot are embedded. An id that is
//! already cached is never re-embedded, even when its text has changed since.

use crate::config::EmbeddingConfig;
use crate::error::{JobbotError, Result, SkippedEntity};
use crate::input::records::{JobOffer, JobSeeker};
use crate::processing::embeddings::{mean_pool, Embedder};
use crate::processing::snapshot::{EmbeddingRecord, EntityKind, Snapshot, SnapshotStore};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::ops::Range;

/// An entity that can be turned into a skills vector and a role vector
pub trait EmbeddingSource {
    const KIND: EntityKind;

    fn entity_id(&self) -> &str;

    /// Texts averaged into the skills vector
    fn skill_texts(&self) -> Vec<String>;

    /// Texts averaged into the role vector
    fn role_texts(&self) -> Vec<String>;
}

impl EmbeddingSource for JobSeeker {
    const KIND: EntityKind = EntityKind::Seeker;

    fn entity_id(&self) -> &str {
        &self.user_id
    }

    fn skill_texts(&self) -> Vec<String> {
        self.skills.clone()
    }

    fn role_texts(&self) -> Vec<String> {
        self.job_titles.clone()
    }
}

impl EmbeddingSource for JobOffer {
    const KIND: EntityKind = EntityKind::Job;

    fn entity_id(&self) -> &str {
        &self.job_id
    }

    fn skill_texts(&self) -> Vec<String> {
        self.skills.clone()
    }

    fn role_texts(&self) -> Vec<String> {
        vec![self.vacancy_name.clone()]
    }
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub snapshot: Snapshot,
    /// Ids embedded during this build
    pub embedded: Vec<String>,
    pub carried_over: usize,
    /// Missing ids left for a later run because of the job batch cap
    pub deferred: usize,
    pub skipped: Vec<SkippedEntity>,
}

pub struct EmbeddingCacheBuilder<'a, E: Embedder + ?Sized> {
    store: &'a SnapshotStore,
    embedder: &'a E,
    batch_size: usize,
    job_batch_cap: usize,
}

struct PendingEntity {
    entity_id: String,
    skills: Range<usize>,
    roles: Range<usize>,
}

impl<'a, E: Embedder + ?Sized> EmbeddingCacheBuilder<'a, E> {
    pub fn new(store: &'a SnapshotStore, embedder: &'a E, config: &EmbeddingConfig) -> Self {
        Self {
            store,
            embedder,
            batch_size: config.batch_size.max(1),
            job_batch_cap: config.job_batch_cap.max(1),
        }
    }

    /// Embed what the latest snapshot lacks, merge, and publish the snapshot for `today`.
    ///
    /// A backend failure aborts the whole build and nothing is written.
    pub fn build<T: EmbeddingSource>(&self, available: &[T], today: NaiveDate) -> Result<BuildOutcome> {
        let kind = T::KIND;
        let previous = self.store.load_latest(kind)?;
        if let Some(date) = previous.date {
            debug!("Latest {} snapshot is {} with {} rows", kind, date, previous.len());
        }

        let mut missing: Vec<&T> = Vec::new();
        let mut skipped = Vec::new();
        {
            let cached: HashSet<&str> = previous.ids().collect();
            let mut seen: HashSet<&str> = HashSet::new();
            for entity in available {
                let id = entity.entity_id();
                if cached.contains(id) || !seen.insert(id) {
                    continue;
                }
                // Unembeddable entities must not take slots under the job cap
                match unembeddable_reason(entity) {
                    Some(reason) => {
                        warn!("Skipping {} '{}': {}", kind, id, reason);
                        skipped.push(SkippedEntity::new(id, reason));
                    }
                    None => missing.push(entity),
                }
            }
        }

        let mut deferred = 0;
        if kind == EntityKind::Job && missing.len() > self.job_batch_cap {
            deferred = missing.len() - self.job_batch_cap;
            missing.truncate(self.job_batch_cap);
            info!(
                "Embedding {} new jobs this run, {} deferred to a later run",
                self.job_batch_cap, deferred
            );
        }

        let (fresh, failed) = self.embed_missing(kind, &missing)?;
        skipped.extend(failed);
        let embedded: Vec<String> = fresh.iter().map(|r| r.entity_id.clone()).collect();

        // New rows first so they win over anything cached under the same id
        let mut ids = HashSet::new();
        let mut carried_over = 0;
        let fresh_count = fresh.len();
        let mut records = Vec::with_capacity(fresh_count + previous.len());
        for (position, record) in fresh.into_iter().chain(previous.records).enumerate() {
            if !ids.insert(record.entity_id.clone()) {
                continue;
            }
            if record.avg_skill_embedding.is_empty() || record.role_embedding.is_empty() {
                warn!("Dropping cached {} row '{}' with an empty vector", kind, record.entity_id);
                skipped.push(SkippedEntity::new(&record.entity_id, "cached row has an empty vector"));
                continue;
            }
            if position >= fresh_count {
                carried_over += 1;
            }
            records.push(record);
        }

        let snapshot = self.store.write(kind, today, records)?;
        info!(
            "{} snapshot {}: {} embedded, {} carried over, {} skipped",
            kind,
            today,
            embedded.len(),
            carried_over,
            skipped.len()
        );

        Ok(BuildOutcome {
            snapshot,
            embedded,
            carried_over,
            deferred,
            skipped,
        })
    }

    fn embed_missing<T: EmbeddingSource>(
        &self,
        kind: EntityKind,
        missing: &[&T],
    ) -> Result<(Vec<EmbeddingRecord>, Vec<SkippedEntity>)> {
        let mut records = Vec::with_capacity(missing.len());
        let mut skipped = Vec::new();

        for chunk in missing.chunks(self.batch_size) {
            let mut texts = Vec::new();
            let mut pending = Vec::with_capacity(chunk.len());

            for entity in chunk {
                let skills_start = texts.len();
                texts.extend(entity.skill_texts());
                let roles_start = texts.len();
                texts.extend(entity.role_texts().into_iter().filter(|t| !t.trim().is_empty()));
                pending.push(PendingEntity {
                    entity_id: entity.entity_id().to_string(),
                    skills: skills_start..roles_start,
                    roles: roles_start..texts.len(),
                });
            }

            if texts.is_empty() {
                continue;
            }

            let vectors = self.embedder.embed_batch(&texts).map_err(|e| JobbotError::Embedding {
                kind,
                message: e.to_string(),
            })?;
            if vectors.len() != texts.len() {
                return Err(JobbotError::Embedding {
                    kind,
                    message: format!("backend returned {} vectors for {} texts", vectors.len(), texts.len()),
                });
            }

            for entity in pending {
                match self.pool_entity(&entity, &vectors) {
                    Ok(record) => records.push(record),
                    Err(err) if err.is_per_entity() => {
                        warn!("Skipping {} '{}': {}", kind, entity.entity_id, err);
                        skipped.push(SkippedEntity::from_error(&entity.entity_id, &err));
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        Ok((records, skipped))
    }

    fn pool_entity(&self, entity: &PendingEntity, vectors: &[Vec<f32>]) -> Result<EmbeddingRecord> {
        let expected = self.embedder.dimension();
        let skills = &vectors[entity.skills.clone()];
        let roles = &vectors[entity.roles.clone()];

        for vector in skills.iter().chain(roles) {
            if vector.is_empty() || vector.iter().any(|x| !x.is_finite()) {
                return Err(JobbotError::data_integrity(&entity.entity_id, "backend returned an empty or non-finite vector"));
            }
            if expected > 0 && vector.len() != expected {
                return Err(JobbotError::data_integrity(
                    &entity.entity_id,
                    format!("expected {} dimensions, got {}", expected, vector.len()),
                ));
            }
        }

        let avg_skill_embedding = mean_pool(skills)
            .ok_or_else(|| JobbotError::data_integrity(&entity.entity_id, "skill vectors have mixed dimensions"))?;
        let role_embedding = mean_pool(roles)
            .ok_or_else(|| JobbotError::data_integrity(&entity.entity_id, "role vectors have mixed dimensions"))?;

        Ok(EmbeddingRecord {
            entity_id: entity.entity_id.clone(),
            avg_skill_embedding,
            role_embedding,
        })
    }
}

fn unembeddable_reason<T: EmbeddingSource>(entity: &T) -> Option<&'static str> {
    if entity.skill_texts().is_empty() {
        Some("no skills to embed")
    } else if entity.role_texts().iter().all(|t| t.trim().is_empty()) {
        Some("no role text to embed")
    } else {
        None
    }
}
