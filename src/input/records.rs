//! Typed job seeker, job offer and match records
//!
//! The JSON stores keep several fields as Python-style literals (`"True"`, `"0.7"`).
//! They are parsed once here; the rest of the crate only sees validated types.

use crate::error::{JobbotError, Result};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A scalar that may arrive as a native JSON value or as a string literal
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Literal {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(value) => Some(*value),
            Literal::Number(value) if *value == 0.0 => Some(false),
            Literal::Number(value) if *value == 1.0 => Some(true),
            Literal::Number(_) => None,
            Literal::Text(text) => match text.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Number(value) => Some(*value),
            Literal::Text(text) => text.trim().parse::<f64>().ok(),
            Literal::Bool(_) => None,
        }
    }

    /// Dates are ISO strings (optionally with a time part) or epoch milliseconds.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Literal::Text(text) => {
                let text = text.trim();
                text.get(..10)
                    .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
            }
            Literal::Number(millis) => {
                DateTime::from_timestamp_millis(*millis as i64).map(|dt| dt.date_naive())
            }
            Literal::Bool(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJobSeeker {
    pub user_id: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub job_titles: Vec<String>,
    #[serde(default)]
    pub seniority: Vec<String>,
    #[serde(default)]
    pub location: Vec<String>,
    #[serde(default, alias = "work_modality_english")]
    pub work_modality: Vec<String>,
    #[serde(default)]
    pub remote: Vec<Literal>,
    pub english: Option<Literal>,
    pub role_weight: Option<Literal>,
    pub similarity_threshold: Option<Literal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSeeker {
    pub user_id: String,
    pub skills: Vec<String>,
    pub job_titles: Vec<String>,
    pub seniority: BTreeSet<String>,
    pub location: BTreeSet<String>,
    pub work_modality: BTreeSet<String>,
    pub remote: BTreeSet<bool>,
    pub english: bool,
    pub role_weight: f64,
    pub similarity_threshold: f64,
}

impl TryFrom<RawJobSeeker> for JobSeeker {
    type Error = JobbotError;

    fn try_from(raw: RawJobSeeker) -> Result<Self> {
        let user_id = required_text(raw.user_id, "<unknown seeker>", "user_id")?;

        let remote = raw
            .remote
            .iter()
            .map(|value| {
                value.as_bool().ok_or_else(|| {
                    JobbotError::data_integrity(&user_id, format!("remote criterion {:?} is not a boolean", value))
                })
            })
            .collect::<Result<BTreeSet<bool>>>()?;

        let english = raw
            .english
            .as_ref()
            .ok_or_else(|| JobbotError::data_integrity(&user_id, "missing field 'english'"))?
            .as_bool()
            .ok_or_else(|| JobbotError::data_integrity(&user_id, "field 'english' is not a boolean"))?;

        let role_weight = unit_interval(raw.role_weight.as_ref(), &user_id, "role_weight")?;
        let similarity_threshold =
            unit_interval(raw.similarity_threshold.as_ref(), &user_id, "similarity_threshold")?;

        Ok(Self {
            skills: dedup_preserving_order(raw.skills),
            job_titles: dedup_preserving_order(raw.job_titles),
            seniority: raw.seniority.into_iter().collect(),
            location: raw.location.into_iter().collect(),
            work_modality: raw.work_modality.into_iter().collect(),
            remote,
            english,
            role_weight,
            similarity_threshold,
            user_id,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJobOffer {
    pub job_id: Option<String>,
    pub seniority: Option<String>,
    pub location: Option<String>,
    #[serde(alias = "work_modality_english")]
    pub work_modality: Option<String>,
    pub remote: Option<Literal>,
    pub company: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub vacancy_name: Option<String>,
    pub publication_date: Option<Literal>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOffer {
    pub job_id: String,
    pub seniority: String,
    pub location: String,
    pub work_modality: String,
    pub remote: bool,
    pub company: String,
    pub description: String,
    pub skills: Vec<String>,
    pub vacancy_name: String,
    pub publication_date: NaiveDate,
    pub link: String,
}

impl JobOffer {
    /// Stable content-derived id: UUIDv5 over the canonical posting URL.
    pub fn derive_id(link: &str) -> String {
        let canonical = canonical_link(link);
        Uuid::new_v5(&Uuid::NAMESPACE_DNS, canonical.as_bytes())
            .simple()
            .to_string()
    }
}

/// Posting URL without its query string
pub fn canonical_link(link: &str) -> &str {
    link.split('?').next().unwrap_or(link).trim()
}

impl TryFrom<RawJobOffer> for JobOffer {
    type Error = JobbotError;

    fn try_from(raw: RawJobOffer) -> Result<Self> {
        let link = required_text(raw.link, "<unknown job>", "link")?;
        let job_id = match raw.job_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => JobOffer::derive_id(&link),
        };

        let remote = raw
            .remote
            .as_ref()
            .ok_or_else(|| JobbotError::data_integrity(&job_id, "missing field 'remote'"))?
            .as_bool()
            .ok_or_else(|| JobbotError::data_integrity(&job_id, "field 'remote' is not a boolean"))?;

        let publication_date = raw
            .publication_date
            .as_ref()
            .ok_or_else(|| JobbotError::data_integrity(&job_id, "missing field 'publication_date'"))?
            .as_date()
            .ok_or_else(|| JobbotError::data_integrity(&job_id, "field 'publication_date' is not a date"))?;

        Ok(Self {
            seniority: required_text(raw.seniority, &job_id, "seniority")?,
            location: required_text(raw.location, &job_id, "location")?,
            work_modality: required_text(raw.work_modality, &job_id, "work_modality")?,
            company: required_text(raw.company, &job_id, "company")?,
            description: raw
                .description
                .ok_or_else(|| JobbotError::data_integrity(&job_id, "missing field 'description'"))?,
            vacancy_name: required_text(raw.vacancy_name, &job_id, "vacancy_name")?,
            skills: dedup_preserving_order(raw.skills),
            remote,
            publication_date,
            link,
            job_id,
        })
    }
}

/// One scored (seeker, job) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub match_date: NaiveDate,
    pub score: f64,
}

impl MatchRecord {
    pub fn new(user_id: &str, job_id: &str, separator: char, match_date: NaiveDate, score: f64) -> Result<Self> {
        Ok(Self {
            match_id: join_match_id(user_id, job_id, separator)?,
            match_date,
            score,
        })
    }

    pub fn split(&self, separator: char) -> Result<(String, String)> {
        split_match_id(&self.match_id, separator)
    }
}

pub fn join_match_id(user_id: &str, job_id: &str, separator: char) -> Result<String> {
    for id in [user_id, job_id] {
        if id.is_empty() || id.contains(separator) {
            return Err(JobbotError::data_integrity(
                id,
                format!("id is empty or contains the match separator '{}'", separator),
            ));
        }
    }
    Ok(format!("{}{}{}", user_id, separator, job_id))
}

pub fn split_match_id(match_id: &str, separator: char) -> Result<(String, String)> {
    match match_id.split_once(separator) {
        Some((user_id, job_id)) if !user_id.is_empty() && !job_id.is_empty() && !job_id.contains(separator) => {
            Ok((user_id.to_string(), job_id.to_string()))
        }
        _ => Err(JobbotError::data_integrity(
            match_id,
            format!("match id cannot be split on '{}'", separator),
        )),
    }
}

fn required_text(value: Option<String>, entity_id: &str, field: &str) -> Result<String> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(JobbotError::data_integrity(entity_id, format!("missing field '{}'", field))),
    }
}

fn unit_interval(value: Option<&Literal>, entity_id: &str, field: &str) -> Result<f64> {
    let number = value
        .ok_or_else(|| JobbotError::data_integrity(entity_id, format!("missing field '{}'", field)))?
        .as_f64()
        .ok_or_else(|| JobbotError::data_integrity(entity_id, format!("field '{}' is not a number", field)))?;

    if (0.0..=1.0).contains(&number) {
        Ok(number)
    } else {
        Err(JobbotError::data_integrity(
            entity_id,
            format!("field '{}' = {} is outside [0, 1]", field, number),
        ))
    }
}

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}
