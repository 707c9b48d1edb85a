//! HTTP checks that tell whether a job posting is still open

use crate::config::AvailabilityConfig;
use crate::error::Result;
use crate::input::records::JobOffer;
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    Available,
    Expired(String),
    /// The check could not be completed; the offer is kept
    Unknown(String),
}

impl Availability {
    pub fn keeps_offer(&self) -> bool {
        !matches!(self, Availability::Expired(_))
    }
}

pub struct AvailabilityChecker {
    client: Client,
    expired_tags: Vec<String>,
    max_retries: u32,
    retry_delay_ms: u64,
    concurrency: usize,
}

impl AvailabilityChecker {
    pub fn new(config: &AvailabilityConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            expired_tags: config.expired_tags.clone(),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
            concurrency: config.concurrency.max(1),
        })
    }

    /// Check one link, retrying rate limits and transient failures a bounded number of times.
    pub async fn check(&self, link: &str) -> Availability {
        let mut attempt = 0u32;
        loop {
            match self.client.get(link).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        debug!("Posting gone (404): {}", link);
                        return Availability::Expired("HTTP 404".to_string());
                    }
                    if should_retry(status) && attempt < self.max_retries {
                        attempt += 1;
                        tokio::time::sleep(self.retry_backoff(attempt)).await;
                        continue;
                    }
                    if !status.is_success() {
                        return Availability::Unknown(format!("HTTP {}", status));
                    }

                    return match response.text().await {
                        Ok(body) => match self.expired_tags.iter().find(|tag| body.contains(tag.as_str())) {
                            Some(tag) => {
                                debug!("Posting expired ('{}'): {}", tag, link);
                                Availability::Expired(format!("page contains '{}'", tag))
                            }
                            None => Availability::Available,
                        },
                        Err(err) => Availability::Unknown(err.to_string()),
                    };
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt < self.max_retries {
                        attempt += 1;
                        tokio::time::sleep(self.retry_backoff(attempt)).await;
                        continue;
                    }
                    warn!("Could not check {}: {}", link, err);
                    return Availability::Unknown(err.to_string());
                }
            }
        }
    }

    /// Check every offer with at most `concurrency` requests in flight.
    /// Results come back in input order.
    pub async fn check_all(&self, offers: &[JobOffer]) -> Vec<(String, Availability)> {
        let mut results: Vec<(usize, String, Availability)> = stream::iter(offers.iter().enumerate())
            .map(|(index, offer)| async move {
                let availability = self.check(&offer.link).await;
                (index, offer.job_id.clone(), availability)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results.sort_by_key(|(index, _, _)| *index);
        results.into_iter().map(|(_, id, availability)| (id, availability)).collect()
    }

    fn retry_backoff(&self, attempt: u32) -> Duration {
        let capped = attempt.min(5);
        Duration::from_millis(self.retry_delay_ms.saturating_mul(1 << capped))
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
