//! Join persisted matches back onto job metadata and rank them for one user

use crate::error::Result;
use crate::input::records::{JobOffer, MatchRecord};
use crate::input::store::{load_job_offers, load_matches};
use chrono::NaiveDate;
use log::{debug, warn};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRecommendation {
    pub job_id: String,
    pub link: String,
    pub vacancy_name: String,
    pub company: String,
    pub publication_date: NaiveDate,
    pub score: f64,
}

pub struct MatchRetriever {
    job_offers: PathBuf,
    matches: PathBuf,
    separator: char,
}

impl MatchRetriever {
    pub fn new(job_offers: impl Into<PathBuf>, matches: impl Into<PathBuf>, separator: char) -> Self {
        Self {
            job_offers: job_offers.into(),
            matches: matches.into(),
            separator,
        }
    }

    /// Ranked recommendations for `user_id` from the last persisted run.
    /// A user without matches gets an empty list.
    pub fn get_last_matches(&self, user_id: &str) -> Result<Vec<RankedRecommendation>> {
        let matches = load_matches(&self.matches)?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let jobs = load_job_offers(&self.job_offers)?.records;
        Ok(rank_for_user(user_id, &jobs, &matches, self.separator))
    }
}

/// Keep the jobs matched for `user_id` and order them by
/// (publication date desc, score desc, job id asc).
pub fn rank_for_user(
    user_id: &str,
    jobs: &[JobOffer],
    matches: &[MatchRecord],
    separator: char,
) -> Vec<RankedRecommendation> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut unsplittable = 0;

    for record in matches {
        match record.split(separator) {
            Ok((user, job)) if user == user_id => {
                let entry = scores.entry(job).or_insert(record.score);
                if record.score > *entry {
                    *entry = record.score;
                }
            }
            Ok(_) => {}
            Err(err) => {
                unsplittable += 1;
                warn!("Skipping match record: {}", err);
            }
        }
    }
    if unsplittable > 0 {
        warn!("{} match ids could not be split with '{}'", unsplittable, separator);
    }

    let mut ranked: Vec<RankedRecommendation> = jobs
        .iter()
        .filter_map(|job| {
            scores.get(&job.job_id).map(|&score| RankedRecommendation {
                job_id: job.job_id.clone(),
                link: job.link.clone(),
                vacancy_name: job.vacancy_name.clone(),
                company: job.company.clone(),
                publication_date: job.publication_date,
                score,
            })
        })
        .collect();

    if ranked.len() < scores.len() {
        debug!(
            "{} matched jobs for '{}' are no longer in the offers store",
            scores.len() - ranked.len(),
            user_id
        );
    }

    ranked.sort_by(compare_recommendations);
    ranked
}

fn compare_recommendations(a: &RankedRecommendation, b: &RankedRecommendation) -> Ordering {
    b.publication_date
        .cmp(&a.publication_date)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.job_id.cmp(&b.job_id))
}
