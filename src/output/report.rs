//! Per-user recommendation reports

use crate::processing::retriever::RankedRecommendation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Ranked recommendations for one job seeker
#[derive(Debug, Clone, Serialize)]
pub struct UserReport {
    pub user_id: String,
    pub generated_on: NaiveDate,
    pub recommendations: Vec<RankedRecommendation>,
}

/// One row of the published report, as consumed by the notification side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub link: String,
    pub score: f64,
    pub job_offer: String,
    pub publication_date: NaiveDate,
}

impl UserReport {
    pub fn new(user_id: impl Into<String>, generated_on: NaiveDate, recommendations: Vec<RankedRecommendation>) -> Self {
        Self {
            user_id: user_id.into(),
            generated_on,
            recommendations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }

    pub fn rows(&self) -> Vec<ReportRow> {
        self.recommendations
            .iter()
            .map(|rec| ReportRow {
                link: rec.link.clone(),
                score: rec.score,
                job_offer: rec.vacancy_name.clone(),
                publication_date: rec.publication_date,
            })
            .collect()
    }
}
