//! Embedding backends and vector math

use crate::config::Config;
use crate::error::{JobbotError, Result};
use crate::processing::embedding_manager::EmbeddingModelManager;
use log::info;
use model2vec_rs::model::StaticModel;
use std::path::Path;
use std::time::Instant;

/// Text to fixed-length vector, one vector per input text, in input order.
///
/// Implementations are expected to return unit-normalized vectors, but callers
/// never rely on it: cosine similarity always divides by both norms.
pub trait Embedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

/// Model2Vec static embeddings
pub struct StaticEmbedder {
    model: StaticModel,
    dimension: usize,
}

impl StaticEmbedder {
    pub fn new(model_path: &Path, model_name: &str) -> Result<Self> {
        let start_time = Instant::now();
        info!("Loading Model2Vec embedding model '{}' from: {}", model_name, model_path.display());

        let model = StaticModel::from_pretrained(
            model_path,
            None,       // token
            Some(true), // normalize
            None,       // subfolder
        )
        .map_err(|e| JobbotError::ModelError(format!("Failed to load model: {}", e)))?;

        let dimension = model.encode_single("dimension").len();
        info!("Model loaded in {:.2?} ({} dimensions)", start_time.elapsed(), dimension);

        Ok(Self { model, dimension })
    }

    /// Resolve (downloading when needed) the configured model and load it
    pub async fn from_config(config: &Config) -> Result<Self> {
        let mut manager = EmbeddingModelManager::new(config.paths.models_dir.clone()).await?;
        let model_path = manager.ensure_model_available(&config.embedding.model).await?;
        Self::new(&model_path, &config.embedding.model)
    }
}

impl Embedder for StaticEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.model.encode(texts))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Cosine similarity rounded to 4 decimal places.
///
/// A zero-norm input is an error rather than a score of 0: it means an
/// embedding is broken, not that two texts are unrelated.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(JobbotError::DimensionMismatch(a.len(), b.len()));
    }

    let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 || !norm_a.is_finite() || !norm_b.is_finite() {
        return Err(JobbotError::DegenerateVector);
    }

    Ok(round4(dot_product / (norm_a * norm_b)))
}

pub fn norm(v: &[f32]) -> f64 {
    v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt()
}

/// Elementwise mean of equally sized vectors. The result is not renormalized.
pub fn mean_pool(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let dim = first.len();
    if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
        return None;
    }

    let mut sum = vec![0.0f64; dim];
    for vector in vectors {
        for (acc, x) in sum.iter_mut().zip(vector) {
            *acc += *x as f64;
        }
    }
    let count = vectors.len() as f64;
    Some(sum.into_iter().map(|x| (x / count) as f32).collect())
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
