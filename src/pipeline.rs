//! End-to-end recommendation run: preprocess, expire, embed, score, publish

use crate::availability::{expire_offers, AvailabilityReport};
use crate::config::Config;
use crate::error::{Result, SkippedEntity};
use crate::input::records::{JobOffer, JobSeeker};
use crate::input::store::{load_job_offers, load_job_seekers, JsonStore};
use crate::output::{ReportWriter, UserReport};
use crate::processing::cache_builder::{BuildOutcome, EmbeddingCacheBuilder};
use crate::processing::embeddings::Embedder;
use crate::processing::knowledge_filter::KnowledgeFilter;
use crate::processing::matcher::{MatchSummary, Matcher};
use crate::processing::preprocessor::{PreprocessSummary, Preprocessor};
use crate::processing::retriever::MatchRetriever;
use crate::processing::snapshot::{EntityKind, Snapshot, SnapshotStore};
use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_preprocess: bool,
    pub skip_availability: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Completed, but some entities were skipped or failed
    PartialFailure,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub kind: EntityKind,
    pub date: Option<NaiveDate>,
    pub rows: usize,
    pub embedded: usize,
    pub carried_over: usize,
    pub deferred: usize,
    pub skipped: Vec<SkippedEntity>,
}

impl From<&BuildOutcome> for SnapshotSummary {
    fn from(outcome: &BuildOutcome) -> Self {
        Self {
            kind: outcome.snapshot.kind,
            date: outcome.snapshot.date,
            rows: outcome.snapshot.len(),
            embedded: outcome.embedded.len(),
            carried_over: outcome.carried_over,
            deferred: outcome.deferred,
            skipped: outcome.skipped.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub preprocess: Option<PreprocessSummary>,
    pub availability: Option<AvailabilityReport>,
    /// Store records rejected at ingestion
    pub rejected_records: Vec<SkippedEntity>,
    pub seekers: SnapshotSummary,
    pub jobs: SnapshotSummary,
    pub matching: MatchSummary,
    pub reports: Vec<PathBuf>,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.failed_ids().is_empty() {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure
        }
    }

    /// Every entity id that was skipped or failed somewhere in the run
    pub fn failed_ids(&self) -> BTreeSet<String> {
        let mut ids: BTreeSet<String> = self
            .rejected_records
            .iter()
            .chain(&self.seekers.skipped)
            .chain(&self.jobs.skipped)
            .chain(&self.matching.skipped)
            .map(|s| s.entity_id.clone())
            .collect();
        ids.extend(self.matching.failed_seekers.iter().cloned());
        ids.extend(self.matching.seekers_not_found.iter().cloned());
        ids
    }

    pub fn skip_count(&self) -> usize {
        self.rejected_records.len() + self.seekers.skipped.len() + self.jobs.skipped.len() + self.matching.skipped.len()
    }
}

/// Seekers and offers accepted at ingestion, plus the rejects
pub struct Inputs {
    pub seekers: Vec<JobSeeker>,
    pub jobs: Vec<JobOffer>,
    pub rejected: Vec<SkippedEntity>,
}

pub struct Pipeline<'a, E: Embedder + ?Sized> {
    config: &'a Config,
    embedder: &'a E,
    snapshots: SnapshotStore,
}

impl<'a, E: Embedder + ?Sized> Pipeline<'a, E> {
    pub fn new(config: &'a Config, embedder: &'a E) -> Self {
        Self {
            config,
            embedder,
            snapshots: SnapshotStore::new(&config.paths.embeddings_dir),
        }
    }

    pub async fn run(&self, run_date: NaiveDate, options: RunOptions) -> Result<RunReport> {
        info!("Starting recommendation run for {}", run_date);

        let preprocess = if options.skip_preprocess {
            None
        } else {
            Some(Preprocessor::new(self.config)?.run(run_date)?)
        };

        let availability = if options.skip_availability {
            None
        } else {
            Some(expire_offers(self.config).await?)
        };

        let inputs = load_inputs(self.config)?;
        let (seeker_build, job_build) = self.embed(&inputs, run_date)?;
        let matching = score_matches(self.config, &inputs, &seeker_build.snapshot, &job_build.snapshot, run_date)?;
        let reports = publish_reports(self.config, run_date)?;

        let report = RunReport {
            run_date,
            preprocess,
            availability,
            rejected_records: inputs.rejected,
            seekers: SnapshotSummary::from(&seeker_build),
            jobs: SnapshotSummary::from(&job_build),
            matching,
            reports,
        };

        match report.status() {
            RunStatus::Success => info!("Run completed: {} matches", report.matching.matches),
            RunStatus::PartialFailure => warn!(
                "Run completed with {} skipped entities: {} matches",
                report.skip_count(),
                report.matching.matches
            ),
        }
        Ok(report)
    }

    /// Bring both embedding snapshots up to date for `run_date`.
    pub fn embed(&self, inputs: &Inputs, run_date: NaiveDate) -> Result<(BuildOutcome, BuildOutcome)> {
        let builder = EmbeddingCacheBuilder::new(&self.snapshots, self.embedder, &self.config.embedding);
        let seekers = builder.build(&inputs.seekers, run_date)?;
        let jobs = builder.build(&inputs.jobs, run_date)?;
        Ok((seekers, jobs))
    }
}

pub fn load_inputs(config: &Config) -> Result<Inputs> {
    let separator = config.matching.match_id_separator;
    let seekers = load_job_seekers(&config.paths.job_seekers, separator)?;
    let jobs = load_job_offers(&config.paths.job_offers)?;
    info!("Loaded {} job seekers and {} job offers", seekers.records.len(), jobs.records.len());

    let mut rejected = seekers.rejected;
    rejected.extend(jobs.rejected);
    Ok(Inputs {
        seekers: seekers.records,
        jobs: jobs.records,
        rejected,
    })
}

/// Score against the given snapshots and replace the persisted match set.
pub fn score_matches(
    config: &Config,
    inputs: &Inputs,
    seeker_embeddings: &Snapshot,
    job_embeddings: &Snapshot,
    run_date: NaiveDate,
) -> Result<MatchSummary> {
    let filter = KnowledgeFilter::new(&config.matching);
    let matcher = Matcher::new(&filter, config.matching.match_id_separator);
    let run = matcher.score_all(&inputs.seekers, &inputs.jobs, seeker_embeddings, job_embeddings, run_date);

    JsonStore::new(&config.paths.matches).save(&run.matches)?;
    Ok(run.summary)
}

/// Score against the latest stored snapshots, without embedding anything.
pub fn score_latest(config: &Config, run_date: NaiveDate) -> Result<MatchSummary> {
    let inputs = load_inputs(config)?;
    let snapshots = SnapshotStore::new(&config.paths.embeddings_dir);
    let seekers = snapshots.load_latest(EntityKind::Seeker)?;
    let jobs = snapshots.load_latest(EntityKind::Job)?;
    score_matches(config, &inputs, &seekers, &jobs, run_date)
}

/// Write a report for every configured user id.
pub fn publish_reports(config: &Config, run_date: NaiveDate) -> Result<Vec<PathBuf>> {
    let retriever = MatchRetriever::new(
        &config.paths.job_offers,
        &config.paths.matches,
        config.matching.match_id_separator,
    );
    let writer = ReportWriter::new(&config.paths.output_dir, config.output.format);

    let mut paths = Vec::with_capacity(config.output.user_ids.len());
    for user_id in &config.output.user_ids {
        let recommendations = retriever.get_last_matches(user_id)?;
        let report = UserReport::new(user_id.as_str(), run_date, recommendations);
        paths.push(writer.save(&report)?);
    }
    Ok(paths)
}
