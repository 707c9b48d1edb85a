//! Integration tests for the job recommender

use chrono::NaiveDate;
use jobbot::config::Config;
use jobbot::error::Result;
use jobbot::input::records::JobOffer;
use jobbot::input::store::{load_matches, JsonStore};
use jobbot::pipeline::{Pipeline, RunOptions, RunStatus};
use jobbot::processing::embeddings::Embedder;
use jobbot::processing::retriever::MatchRetriever;
use jobbot::processing::snapshot::{EntityKind, SnapshotStore};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Letter-frequency vectors: deterministic, positive, and similar for similar texts
struct LetterEmbedder;

impl Embedder for LetterEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![1.0f32; 27];
                for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                    vector[(c as u8 - b'a') as usize] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        27
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
}

fn offline() -> RunOptions {
    RunOptions {
        skip_availability: true,
        ..Default::default()
    }
}

fn workspace() -> (TempDir, Config) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::rooted_at(temp_dir.path());
    config.matching.excluded_companies = vec!["Fake Corp".to_string()];
    config.output.user_ids = vec!["user1".to_string(), "user2".to_string()];

    std::fs::copy(Path::new("tests/fixtures/data_jobs.json"), &config.paths.data_jobs).unwrap();
    std::fs::copy(Path::new("tests/fixtures/job_seekers.json"), &config.paths.job_seekers).unwrap();
    (temp_dir, config)
}

fn job_id(n: u32) -> String {
    JobOffer::derive_id(&format!("https://jobs.example.com/view/{}", n))
}

#[tokio::test]
async fn test_end_to_end_recommendations() {
    let (_temp_dir, config) = workspace();
    let pipeline = Pipeline::new(&config, &LetterEmbedder);

    let report = pipeline.run(day(1), offline()).await.unwrap();
    assert_eq!(report.status(), RunStatus::Success);

    // Fake Corp and the June posting are gone
    let preprocess = report.preprocess.as_ref().unwrap();
    assert_eq!(preprocess.kept, 3);
    assert_eq!(report.jobs.rows, 3);
    assert_eq!(report.seekers.rows, 3);

    let mut ids: Vec<String> = load_matches(&config.paths.matches)
        .unwrap()
        .into_iter()
        .map(|m| m.match_id)
        .collect();
    ids.sort();
    let mut expected = vec![
        format!("user1|{}", job_id(101)),
        format!("user1|{}", job_id(102)),
        format!("user2|{}", job_id(102)),
        format!("user3|{}", job_id(103)),
    ];
    expected.sort();
    assert_eq!(ids, expected);

    let retriever = MatchRetriever::new(&config.paths.job_offers, &config.paths.matches, '|');
    let ranked = retriever.get_last_matches("user1").unwrap();
    let ranked_ids: Vec<String> = ranked.iter().map(|r| r.job_id.clone()).collect();
    assert_eq!(ranked_ids, vec![job_id(102), job_id(101)]);
    assert_eq!(ranked[1].link, "https://jobs.example.com/view/101");
    assert_eq!(ranked, retriever.get_last_matches("user1").unwrap());

    let markdown = std::fs::read_to_string(config.paths.output_dir.join("user2.md")).unwrap();
    assert!(markdown.contains("[Ingeniero de Datos](https://jobs.example.com/view/102)"));
    assert!(!markdown.contains("Senior Python Engineer"));
}

#[tokio::test]
async fn test_next_day_embeds_only_new_entities() {
    let (_temp_dir, config) = workspace();
    let pipeline = Pipeline::new(&config, &LetterEmbedder);
    pipeline.run(day(1), offline()).await.unwrap();

    let store = SnapshotStore::new(&config.paths.embeddings_dir);
    let before = store.load(EntityKind::Seeker, day(1)).unwrap();

    let mut seekers: Vec<serde_json::Value> = JsonStore::new(&config.paths.job_seekers).load().unwrap();
    let mut newcomer = seekers[0].clone();
    newcomer["user_id"] = serde_json::json!("user4");
    newcomer["skills"] = serde_json::json!(["Go", "Kubernetes"]);
    seekers.push(newcomer);
    JsonStore::new(&config.paths.job_seekers).save(&seekers).unwrap();

    let report = pipeline.run(day(2), offline()).await.unwrap();
    assert_eq!(report.seekers.embedded, 1);
    assert_eq!(report.seekers.carried_over, 3);
    assert_eq!(report.jobs.embedded, 0);

    let after = store.load(EntityKind::Seeker, day(2)).unwrap();
    assert_eq!(after.len(), 4);
    for record in &before.records {
        assert_eq!(after.get(&record.entity_id), Some(record));
    }
    assert_eq!(store.available_dates(EntityKind::Seeker).unwrap(), vec![day(1), day(2)]);
}

#[tokio::test]
async fn test_match_set_is_replaced_each_run() {
    let (_temp_dir, config) = workspace();
    let pipeline = Pipeline::new(&config, &LetterEmbedder);
    pipeline.run(day(1), offline()).await.unwrap();
    assert!(!load_matches(&config.paths.matches).unwrap().is_empty());

    let mut seekers: Vec<serde_json::Value> = JsonStore::new(&config.paths.job_seekers).load().unwrap();
    for seeker in seekers.iter_mut() {
        seeker["seniority"] = serde_json::json!(["Principal"]);
    }
    JsonStore::new(&config.paths.job_seekers).save(&seekers).unwrap();

    let report = pipeline.run(day(1), offline()).await.unwrap();
    assert_eq!(report.matching.seekers_without_candidates.len(), 3);
    assert!(load_matches(&config.paths.matches).unwrap().is_empty());

    let retriever = MatchRetriever::new(&config.paths.job_offers, &config.paths.matches, '|');
    assert!(retriever.get_last_matches("user1").unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_postings_are_not_recommended() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/view/101"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<button>Apply</button>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/view/102"))
        .respond_with(ResponseTemplate::new(200).set_body_string("No longer accepting applications"))
        .mount(&server)
        .await;

    let (_temp_dir, mut config) = workspace();
    config.availability.retry_delay_ms = 1;

    // Point the fixture postings at the mock server
    let raw = std::fs::read_to_string(&config.paths.data_jobs).unwrap();
    std::fs::write(
        &config.paths.data_jobs,
        raw.replace("https://jobs.example.com", &server.uri()),
    )
    .unwrap();

    let pipeline = Pipeline::new(&config, &LetterEmbedder);
    let report = pipeline.run(day(1), RunOptions::default()).await.unwrap();

    let availability = report.availability.as_ref().unwrap();
    assert_eq!(availability.checked, 3);
    assert_eq!(availability.expired.len(), 2);
    assert_eq!(report.jobs.rows, 1);

    let retriever = MatchRetriever::new(&config.paths.job_offers, &config.paths.matches, '|');
    let ranked = retriever.get_last_matches("user1").unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].link, format!("{}/view/101", server.uri()));
    assert!(retriever.get_last_matches("user2").unwrap().is_empty());
}
