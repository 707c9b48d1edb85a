//! Dual-embedding scoring of (seeker, job) pairs

use crate::error::{JobbotError, Result, SkippedEntity};
use crate::input::records::{JobOffer, JobSeeker, MatchRecord};
use crate::processing::embeddings::{cosine_similarity, norm, round4};
use crate::processing::knowledge_filter::KnowledgeFilter;
use crate::processing::snapshot::{EmbeddingRecord, Snapshot};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairScore {
    pub skills_similarity: f64,
    pub role_similarity: f64,
    pub score: f64,
}

/// `role_weight * role + (1 - role_weight) * skills`
///
/// Left unrounded so the threshold sees the exact blend; stored scores are rounded.
pub fn blend(role_similarity: f64, skills_similarity: f64, role_weight: f64) -> f64 {
    role_weight * role_similarity + (1.0 - role_weight) * skills_similarity
}

pub fn score_pair(seeker: &EmbeddingRecord, job: &EmbeddingRecord, role_weight: f64) -> Result<PairScore> {
    let skills_similarity = cosine_similarity(&job.avg_skill_embedding, &seeker.avg_skill_embedding)?;
    let role_similarity = cosine_similarity(&job.role_embedding, &seeker.role_embedding)?;
    Ok(PairScore {
        skills_similarity,
        role_similarity,
        score: blend(role_similarity, skills_similarity, role_weight),
    })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchSummary {
    pub seekers_scored: usize,
    pub pairs_scored: usize,
    pub matches: usize,
    /// Seekers whose filtered candidate set was empty
    pub seekers_without_candidates: Vec<String>,
    /// Embedded seekers missing from the seekers store
    pub seekers_not_found: Vec<String>,
    /// Candidate jobs with no embedding yet (for instance deferred by the batch cap)
    pub unembedded_candidates: usize,
    /// Seekers that could not be scored at all
    pub failed_seekers: Vec<String>,
    pub skipped: Vec<SkippedEntity>,
}

#[derive(Debug, Clone)]
pub struct MatchRun {
    pub matches: Vec<MatchRecord>,
    pub summary: MatchSummary,
}

pub struct Matcher<'a> {
    filter: &'a KnowledgeFilter,
    separator: char,
}

impl<'a> Matcher<'a> {
    pub fn new(filter: &'a KnowledgeFilter, separator: char) -> Self {
        Self { filter, separator }
    }

    /// Score every embedded seeker against its filtered candidates.
    ///
    /// Problems with one seeker or one job are recorded in the summary and never
    /// stop the others from being scored.
    pub fn score_all(
        &self,
        seekers: &[JobSeeker],
        jobs: &[JobOffer],
        seeker_embeddings: &Snapshot,
        job_embeddings: &Snapshot,
        run_date: NaiveDate,
    ) -> MatchRun {
        let job_index = job_embeddings.index();
        let mut summary = MatchSummary::default();
        let mut matches = Vec::new();

        for seeker_embedding in &seeker_embeddings.records {
            let user_id = seeker_embedding.entity_id.as_str();

            let candidates = match self.filter.filter_for(user_id, seekers, jobs) {
                Ok(candidates) => candidates,
                Err(JobbotError::NotFound(_)) => {
                    summary.seekers_not_found.push(user_id.to_string());
                    continue;
                }
                Err(err) => {
                    summary.failed_seekers.push(user_id.to_string());
                    summary.skipped.push(SkippedEntity::from_error(user_id, &err));
                    continue;
                }
            };
            if candidates.is_empty() {
                info!("No candidate jobs for '{}'", user_id);
                summary.seekers_without_candidates.push(user_id.to_string());
                continue;
            }

            if let Err(err) = check_vectors(seeker_embedding) {
                warn!("Cannot score '{}': {}", user_id, err);
                summary.failed_seekers.push(user_id.to_string());
                summary.skipped.push(SkippedEntity::from_error(user_id, &err));
                continue;
            }

            // filter_for succeeded, so the seeker record exists
            let Some(seeker) = seekers.iter().find(|s| s.user_id == user_id) else {
                continue;
            };

            let mut kept = 0;
            for job_id in &candidates {
                let Some(job_embedding) = job_index.get(job_id.as_str()) else {
                    summary.unembedded_candidates += 1;
                    continue;
                };

                let pair = match score_pair(seeker_embedding, job_embedding, seeker.role_weight) {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!("Skipping job '{}' for '{}': {}", job_id, user_id, err);
                        summary.skipped.push(SkippedEntity::from_error(job_id, &err));
                        continue;
                    }
                };
                summary.pairs_scored += 1;

                if pair.score < seeker.similarity_threshold {
                    continue;
                }

                match MatchRecord::new(user_id, job_id, self.separator, run_date, round4(pair.score)) {
                    Ok(record) => {
                        kept += 1;
                        matches.push(record);
                    }
                    Err(err) => summary.skipped.push(SkippedEntity::from_error(job_id, &err)),
                }
            }

            summary.seekers_scored += 1;
            debug!("'{}': {} of {} candidates above threshold", user_id, kept, candidates.len());
        }

        let embedded: HashSet<&str> = seeker_embeddings.ids().collect();
        for seeker in seekers.iter().filter(|s| !embedded.contains(s.user_id.as_str())) {
            summary.skipped.push(SkippedEntity::new(&seeker.user_id, "no embedding in the latest snapshot"));
        }

        summary.matches = matches.len();
        info!(
            "Scored {} seekers: {} matches, {} skipped",
            summary.seekers_scored,
            summary.matches,
            summary.skipped.len()
        );

        MatchRun { matches, summary }
    }
}

fn check_vectors(record: &EmbeddingRecord) -> Result<()> {
    if norm(&record.avg_skill_embedding) == 0.0 || norm(&record.role_embedding) == 0.0 {
        return Err(JobbotError::data_integrity(&record.entity_id, "zero-norm embedding"));
    }
    Ok(())
}
