//! Availability checking of stored job offers

pub mod checker;

pub use checker::{Availability, AvailabilityChecker};

use crate::config::Config;
use crate::error::Result;
use crate::input::store::{parse_job_offers, JsonStore};
use log::info;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AvailabilityReport {
    pub checked: usize,
    pub kept: usize,
    pub expired: Vec<String>,
    /// Offers whose check failed; they stay in the store
    pub unknown: Vec<String>,
}

/// Check every stored offer and rewrite the store with the ones still open.
pub async fn expire_offers(config: &Config) -> Result<AvailabilityReport> {
    let store = JsonStore::new(&config.paths.job_offers);
    let offers = parse_job_offers(store.load_values_or_empty()?).records;
    let checker = AvailabilityChecker::new(&config.availability)?;

    info!("Checking availability of {} job offers", offers.len());
    let results = checker.check_all(&offers).await;

    let mut report = AvailabilityReport {
        checked: results.len(),
        ..Default::default()
    };
    let mut keep = Vec::with_capacity(offers.len());
    for (offer, (job_id, availability)) in offers.into_iter().zip(results) {
        match availability {
            Availability::Available => keep.push(offer),
            Availability::Unknown(_) => {
                report.unknown.push(job_id);
                keep.push(offer);
            }
            Availability::Expired(_) => report.expired.push(job_id),
        }
    }

    report.kept = keep.len();
    store.save(&keep)?;
    info!(
        "Availability: {} kept, {} expired, {} unknown",
        report.kept,
        report.expired.len(),
        report.unknown.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::records::JobOffer;
    use crate::input::store::load_job_offers;
    use chrono::NaiveDate;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn offer(id: &str, link: String) -> JobOffer {
        JobOffer {
            job_id: id.to_string(),
            seniority: "Senior".to_string(),
            location: "Bogota".to_string(),
            work_modality: "Full-time".to_string(),
            remote: false,
            company: "Tech Corp".to_string(),
            description: format!("Posting {}", id),
            skills: vec!["Go".to_string()],
            vacancy_name: "Backend Engineer".to_string(),
            publication_date: NaiveDate::from_ymd_opt(2024, 7, 30).unwrap(),
            link,
        }
    }

    #[tokio::test]
    async fn test_expired_offers_are_removed_from_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/open"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Apply"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::rooted_at(temp_dir.path());
        config.availability.max_retries = 1;
        config.availability.retry_delay_ms = 1;

        let offers = vec![
            offer("open", format!("{}/open", server.uri())),
            offer("gone", format!("{}/gone", server.uri())),
            offer("broken", format!("{}/broken", server.uri())),
        ];
        JsonStore::new(&config.paths.job_offers).save(&offers).unwrap();

        let report = expire_offers(&config).await.unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.expired, vec!["gone".to_string()]);
        assert_eq!(report.unknown, vec!["broken".to_string()]);

        let stored = load_job_offers(&config.paths.job_offers).unwrap().records;
        let ids: Vec<&str> = stored.iter().map(|o| o.job_id.as_str()).collect();
        assert_eq!(ids, vec!["open", "broken"]);
    }
}
