//! Rule-based candidate narrowing from a seeker's categorical preferences

use crate::config::MatchingConfig;
use crate::error::{JobbotError, Result};
use crate::input::records::{JobOffer, JobSeeker};
use crate::processing::text_processor::TextProcessor;
use log::{debug, warn};
use std::collections::{BTreeSet, HashSet};

pub struct KnowledgeFilter {
    excluded_companies: HashSet<String>,
    text_processor: TextProcessor,
}

impl KnowledgeFilter {
    pub fn new(config: &MatchingConfig) -> Self {
        Self::with_processor(
            config.excluded_companies.iter().cloned(),
            TextProcessor::new(config.english_threshold),
        )
    }

    pub fn with_processor<I: IntoIterator<Item = String>>(excluded_companies: I, text_processor: TextProcessor) -> Self {
        Self {
            excluded_companies: excluded_companies.into_iter().collect(),
            text_processor,
        }
    }

    /// Ids of the jobs that satisfy every criterion of `seeker`; empty when nothing fits.
    pub fn filter(&self, seeker: &JobSeeker, jobs: &[JobOffer]) -> BTreeSet<String> {
        let selected: BTreeSet<String> = jobs
            .iter()
            .filter(|job| self.accepts(seeker, job))
            .map(|job| job.job_id.clone())
            .collect();

        debug!(
            "Knowledge filter kept {} of {} jobs for '{}'",
            selected.len(),
            jobs.len(),
            seeker.user_id
        );
        selected
    }

    /// Same as `filter`, looked up by id. An unknown id is `NotFound`.
    pub fn filter_for(&self, user_id: &str, seekers: &[JobSeeker], jobs: &[JobOffer]) -> Result<BTreeSet<String>> {
        match seekers.iter().find(|s| s.user_id == user_id) {
            Some(seeker) => Ok(self.filter(seeker, jobs)),
            None => {
                warn!("Job seeker '{}' is not registered; no candidates", user_id);
                Err(JobbotError::NotFound(format!("job seeker '{}'", user_id)))
            }
        }
    }

    pub fn accepts(&self, seeker: &JobSeeker, job: &JobOffer) -> bool {
        let categorical = seeker.seniority.contains(&job.seniority)
            && seeker.location.contains(&job.location)
            && seeker.work_modality.contains(&job.work_modality)
            && seeker.remote.contains(&job.remote)
            && !self.excluded_companies.contains(&job.company);

        if !categorical {
            return false;
        }

        // Seekers without English only get postings not classified as English
        seeker.english || !self.text_processor.is_english(&job.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn seeker(english: bool) -> JobSeeker {
        JobSeeker {
            user_id: "user1".to_string(),
            skills: vec!["Python".to_string()],
            job_titles: vec!["Developer".to_string()],
            seniority: ["Senior".to_string()].into_iter().collect(),
            location: ["Bogota".to_string()].into_iter().collect(),
            work_modality: ["Full-time".to_string()].into_iter().collect(),
            remote: [true].into_iter().collect(),
            english,
            role_weight: 0.7,
            similarity_threshold: 0.5,
        }
    }

    fn job(id: &str, seniority: &str, location: &str, remote: bool, company: &str, description: &str) -> JobOffer {
        JobOffer {
            job_id: id.to_string(),
            seniority: seniority.to_string(),
            location: location.to_string(),
            work_modality: "Full-time".to_string(),
            remote,
            company: company.to_string(),
            description: description.to_string(),
            skills: vec!["Python".to_string()],
            vacancy_name: "Python Developer".to_string(),
            publication_date: NaiveDate::from_ymd_opt(2024, 7, 28).unwrap(),
            link: format!("https://jobs.example.com/{}", id),
        }
    }

    fn filter() -> KnowledgeFilter {
        KnowledgeFilter::with_processor(vec!["Fake Corp".to_string()], TextProcessor::default())
    }

    #[test]
    fn test_every_criterion_must_hold() {
        let jobs = vec![
            job("job1", "Senior", "Bogota", true, "Tech Corp", "Python developer position"),
            job("job2", "Junior", "Bogota", true, "Tech Corp", "Python developer position"),
            job("job3", "Senior", "Medellin", true, "Tech Corp", "Python developer position"),
            job("job4", "Senior", "Bogota", false, "Tech Corp", "Python developer position"),
            job("job5", "Senior", "Bogota", true, "Fake Corp", "Python developer position"),
        ];

        let selected = filter().filter(&seeker(true), &jobs);
        assert_eq!(selected.into_iter().collect::<Vec<_>>(), vec!["job1".to_string()]);
    }

    #[test]
    fn test_non_english_seeker_gets_no_english_postings() {
        let jobs = vec![
            job("en", "Senior", "Bogota", true, "Tech Corp", "We are looking for a senior developer to join our team"),
            job("es", "Senior", "Bogota", true, "Tech Corp", "Buscamos desarrollador senior con experiencia en Python"),
        ];

        let selected = filter().filter(&seeker(false), &jobs);
        assert_eq!(selected.into_iter().collect::<Vec<_>>(), vec!["es".to_string()]);

        let selected = filter().filter(&seeker(true), &jobs);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let jobs = vec![job("job2", "Junior", "Medellin", false, "Startup Inc", "Java")];
        assert!(filter().filter(&seeker(true), &jobs).is_empty());
        assert!(filter().filter(&seeker(true), &[]).is_empty());
    }

    #[test]
    fn test_unknown_seeker_is_not_found() {
        let result = filter().filter_for("nonexistent_user", &[seeker(true)], &[]);
        assert!(matches!(result, Err(JobbotError::NotFound(_))));

        let result = filter().filter_for("user1", &[seeker(true)], &[]);
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_work_modality_must_be_accepted() {
        let mut part_time = job("job2", "Senior", "Bogota", true, "Tech Corp", "Python developer position");
        part_time.work_modality = "Part-time".to_string();
        let jobs = vec![
            job("job1", "Senior", "Bogota", true, "Tech Corp", "Python developer position"),
            part_time,
        ];

        let selected = filter().filter(&seeker(true), &jobs);
        assert_eq!(selected.into_iter().collect::<Vec<_>>(), vec!["job1".to_string()]);

        let mut flexible = seeker(true);
        flexible.work_modality.insert("Part-time".to_string());
        assert_eq!(filter().filter(&flexible, &jobs).len(), 2);
    }

    #[test]
    fn test_full_english_posting_is_withheld_from_non_english_seeker() {
        let posting = "Responsibilities: Design, build and maintain scalable data pipelines on AWS. \
                       Collaborate with analysts and data scientists to deliver reliable datasets. \
                       Requirements: 3+ years of experience with Python and SQL, familiarity with \
                       Airflow, Spark and cloud platforms, strong communication skills and the \
                       ability to work independently.";
        let about = "About the role: you'll own our recommendation models end-to-end, partnering with \
                     engineers and PMs, shipping features weekly, and monitoring experiments.";
        let spanish = "Responsabilidades: diseñar, construir y mantener pipelines de datos escalables. \
                       Requisitos: 3 años de experiencia con Python y SQL.";
        let jobs = vec![
            job("en", "Senior", "Bogota", true, "Tech Corp", posting),
            job("about", "Senior", "Bogota", true, "Tech Corp", about),
            job("es", "Senior", "Bogota", true, "Tech Corp", spanish),
        ];

        let selected = filter().filter(&seeker(false), &jobs);
        assert_eq!(selected.into_iter().collect::<Vec<_>>(), vec!["es".to_string()]);
    }
}
