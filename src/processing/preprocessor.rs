//! Turn freshly scraped postings into the job offers store

use crate::config::Config;
use crate::error::{JobbotError, Result, SkippedEntity};
use crate::input::records::{canonical_link, JobOffer, RawJobOffer};
use crate::input::store::{parse_job_offers, JsonStore};
use chrono::{Duration, NaiveDate};
use log::{info, warn};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreprocessSummary {
    pub scraped: usize,
    pub previously_stored: usize,
    pub excluded_company: usize,
    pub outside_window: usize,
    pub duplicates: usize,
    pub kept: usize,
    pub rejected: Vec<SkippedEntity>,
}

pub struct Preprocessor {
    data_jobs: PathBuf,
    job_offers: PathBuf,
    excluded_companies: HashSet<String>,
    recency_days: i64,
    remote_pattern: Regex,
}

impl Preprocessor {
    pub fn new(config: &Config) -> Result<Self> {
        let remote_pattern = Regex::new(r"(?i)remote")
            .map_err(|e| JobbotError::Configuration(format!("Invalid remote pattern: {}", e)))?;

        Ok(Self {
            data_jobs: config.paths.data_jobs.clone(),
            job_offers: config.paths.job_offers.clone(),
            excluded_companies: config.matching.excluded_companies.iter().cloned().collect(),
            recency_days: config.preprocess.recency_days,
            remote_pattern,
        })
    }

    /// Merge the scraped postings into the offers store and rewrite it.
    pub fn run(&self, run_date: NaiveDate) -> Result<PreprocessSummary> {
        let scraped = JsonStore::new(&self.data_jobs).load_values_or_empty()?;
        let offers_store = JsonStore::new(&self.job_offers);
        let existing = parse_job_offers(offers_store.load_values_or_empty()?);
        if !existing.rejected.is_empty() {
            warn!("{} stored job offers could not be read and will be dropped", existing.rejected.len());
        }

        let (offers, mut summary) = self.transform(scraped, existing.records, run_date);
        summary.rejected.extend(existing.rejected);

        offers_store.save(&offers)?;
        info!(
            "Preprocessed {} scraped postings: {} offers kept, {} rejected",
            summary.scraped,
            summary.kept,
            summary.rejected.len()
        );
        Ok(summary)
    }

    pub fn transform(
        &self,
        scraped: Vec<Value>,
        existing: Vec<JobOffer>,
        run_date: NaiveDate,
    ) -> (Vec<JobOffer>, PreprocessSummary) {
        let mut summary = PreprocessSummary {
            scraped: scraped.len(),
            previously_stored: existing.len(),
            ..Default::default()
        };

        let mut fresh = Vec::with_capacity(scraped.len());
        for (index, value) in scraped.into_iter().enumerate() {
            match self.augment(value) {
                Ok(offer) => fresh.push(offer),
                Err(err) => {
                    let fallback = format!("scraped record #{}", index);
                    warn!("Rejecting scraped posting: {}", err);
                    summary.rejected.push(SkippedEntity::from_error(&fallback, &err));
                }
            }
        }

        // Newly scraped postings win over stored ones with the same id
        let mut seen_ids = HashSet::new();
        let mut offers: Vec<JobOffer> = fresh
            .into_iter()
            .chain(existing)
            .filter(|offer| seen_ids.insert(offer.job_id.clone()))
            .collect();

        let before = offers.len();
        offers.retain(|offer| !self.excluded_companies.contains(&offer.company));
        summary.excluded_company = before - offers.len();

        let oldest = run_date - Duration::days(self.recency_days);
        let before = offers.len();
        offers.retain(|offer| offer.publication_date >= oldest);
        summary.outside_window = before - offers.len();

        offers.sort_by(|a, b| b.publication_date.cmp(&a.publication_date));

        let before = offers.len();
        let mut seen_links = HashSet::new();
        offers.retain(|offer| seen_links.insert(offer.link.clone()));
        let mut seen_descriptions = HashSet::new();
        offers.retain(|offer| seen_descriptions.insert(offer.description.clone()));
        summary.duplicates = before - offers.len();

        summary.kept = offers.len();
        (offers, summary)
    }

    /// Canonical link, derived id and remote flag for one scraped posting
    fn augment(&self, mut value: Value) -> Result<JobOffer> {
        let object = value
            .as_object_mut()
            .ok_or_else(|| JobbotError::InvalidInput("scraped posting is not an object".to_string()))?;

        let link = object
            .get("link")
            .and_then(Value::as_str)
            .map(|link| canonical_link(link).to_string())
            .filter(|link| !link.is_empty())
            .ok_or_else(|| JobbotError::data_integrity("<unknown job>", "missing field 'link'"))?;

        let mentions_remote = ["description", "vacancy_name"].iter().any(|field| {
            object
                .get(*field)
                .and_then(Value::as_str)
                .map_or(false, |text| self.remote_pattern.is_match(text))
        });

        object.insert("job_id".to_string(), Value::String(JobOffer::derive_id(&link)));
        object.insert("remote".to_string(), Value::Bool(mentions_remote));
        object.insert("link".to_string(), Value::String(link));

        let raw: RawJobOffer = serde_json::from_value(value)?;
        JobOffer::try_from(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()
    }

    fn scraped(link: &str, company: &str, description: &str, published: &str) -> Value {
        json!({
            "link": link,
            "company": company,
            "description": description,
            "vacancy_name": "Data Engineer",
            "seniority": "Senior",
            "location": "Bogota",
            "work_modality_english": "Full-time",
            "skills": ["Python", "SQL"],
            "publication_date": published
        })
    }

    fn preprocessor(root: &std::path::Path) -> Preprocessor {
        let mut config = Config::rooted_at(root);
        config.matching.excluded_companies = vec!["Fake Corp".to_string()];
        Preprocessor::new(&config).unwrap()
    }

    #[test]
    fn test_augment_sets_id_link_and_remote() {
        let temp_dir = TempDir::new().unwrap();
        let preprocessor = preprocessor(temp_dir.path());

        let (offers, summary) = preprocessor.transform(
            vec![
                scraped("https://example.com/job1?utm=feed", "Tech Corp", "Python with ML", "2024-07-30"),
                scraped("https://example.com/job2", "Remote Inc", "REMOTE Java position", "2024-07-31"),
            ],
            Vec::new(),
            run_date(),
        );

        assert_eq!(summary.kept, 2);
        let job1 = offers.iter().find(|o| o.link == "https://example.com/job1").unwrap();
        assert_eq!(job1.job_id, JobOffer::derive_id("https://example.com/job1"));
        assert!(!job1.remote);
        let job2 = offers.iter().find(|o| o.link == "https://example.com/job2").unwrap();
        assert!(job2.remote);
        assert_eq!(job2.work_modality, "Full-time");
    }

    #[test]
    fn test_filters_window_companies_and_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let preprocessor = preprocessor(temp_dir.path());

        let (offers, summary) = preprocessor.transform(
            vec![
                scraped("https://example.com/old", "Tech Corp", "Old posting", "2024-07-01"),
                scraped("https://example.com/fake", "Fake Corp", "Too good to be true", "2024-07-31"),
                scraped("https://example.com/a", "Tech Corp", "Same text", "2024-07-29"),
                scraped("https://example.com/b", "Other Co", "Same text", "2024-07-31"),
                scraped("https://example.com/c", "Tech Corp", "Unique", "2024-07-25"),
            ],
            Vec::new(),
            run_date(),
        );

        let links: Vec<&str> = offers.iter().map(|o| o.link.as_str()).collect();
        assert_eq!(links, vec!["https://example.com/b", "https://example.com/c"]);
        assert_eq!(summary.outside_window, 1);
        assert_eq!(summary.excluded_company, 1);
        assert_eq!(summary.duplicates, 1);
    }

    #[test]
    fn test_new_postings_replace_stored_ones() {
        let temp_dir = TempDir::new().unwrap();
        let preprocessor = preprocessor(temp_dir.path());
        let (stored, _) = preprocessor.transform(
            vec![scraped("https://example.com/job1", "Tech Corp", "First text", "2024-07-28")],
            Vec::new(),
            run_date(),
        );

        let (offers, summary) = preprocessor.transform(
            vec![scraped("https://example.com/job1?ref=2", "Tech Corp", "Updated text", "2024-07-28")],
            stored,
            run_date(),
        );
        assert_eq!(summary.previously_stored, 1);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].description, "Updated text");
    }

    #[test]
    fn test_bad_postings_are_rejected_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let preprocessor = preprocessor(temp_dir.path());
        let (offers, summary) = preprocessor.transform(
            vec![
                json!({"description": "no link"}),
                json!("not an object"),
                scraped("https://example.com/ok", "Tech Corp", "Fine", "2024-07-30"),
            ],
            Vec::new(),
            run_date(),
        );
        assert_eq!(offers.len(), 1);
        assert_eq!(summary.rejected.len(), 2);
    }

    #[test]
    fn test_run_rewrites_offers_store() {
        let temp_dir = TempDir::new().unwrap();
        let preprocessor = preprocessor(temp_dir.path());
        JsonStore::new(temp_dir.path().join("data_jobs.json"))
            .save(&vec![scraped("https://example.com/job1", "Tech Corp", "Python", "2024-07-30")])
            .unwrap();

        let summary = preprocessor.run(run_date()).unwrap();
        assert_eq!(summary.kept, 1);

        let stored = crate::input::store::load_job_offers(&temp_dir.path().join("job_offers.json")).unwrap();
        assert_eq!(stored.records.len(), 1);
        assert!(stored.rejected.is_empty());
    }
}
