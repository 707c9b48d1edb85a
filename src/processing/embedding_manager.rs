//! Embedding model management: resolving and downloading Model2Vec models

use crate::error::{JobbotError, Result};
use hf_hub::api::tokio::Api;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Information about a known embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModelInfo {
    pub name: String,
    pub repo_id: String,
    pub size_mb: u64,
    pub dimensions: u32,
    pub description: String,
}

/// Files a Model2Vec folder needs before it can be loaded
const REQUIRED_FILES: [&str; 2] = ["tokenizer.json", "model.safetensors"];
const OPTIONAL_FILES: [&str; 1] = ["config.json"];

/// Manager for embedding models - resolves local copies and downloads missing ones
pub struct EmbeddingModelManager {
    models_dir: PathBuf,
    known_models: HashMap<String, EmbeddingModelInfo>,
    api: Api,
}

impl EmbeddingModelManager {
    pub async fn new(models_dir: PathBuf) -> Result<Self> {
        if !models_dir.exists() {
            fs::create_dir_all(&models_dir).await.map_err(|e| {
                JobbotError::ModelError(format!("Failed to create models directory: {}", e))
            })?;
        }

        let api = Api::new()
            .map_err(|e| JobbotError::ModelError(format!("Failed to initialize HF API: {}", e)))?;

        let mut manager = Self {
            models_dir,
            known_models: HashMap::new(),
            api,
        };
        manager.init_known_models();
        Ok(manager)
    }

    fn init_known_models(&mut self) {
        let catalogue = [
            (
                "potion-base-8M",
                "minishlab/potion-base-8M",
                33,
                256,
                "Compact multilingual-friendly static embeddings (default)",
            ),
            (
                "potion-base-32M",
                "minishlab/potion-base-32M",
                130,
                512,
                "Larger static embeddings for higher recall",
            ),
            (
                "m2v-multilingual",
                "minishlab/M2V_multilingual_output",
                480,
                256,
                "Multilingual Model2Vec distillation, useful for Spanish postings",
            ),
        ];

        for (id, repo_id, size_mb, dimensions, description) in catalogue {
            self.known_models.insert(
                id.to_string(),
                EmbeddingModelInfo {
                    name: id.to_string(),
                    repo_id: repo_id.to_string(),
                    size_mb,
                    dimensions,
                    description: description.to_string(),
                },
            );
        }
    }

    /// Map a short name or a repo id to a HuggingFace repo id
    pub fn resolve_repo_id(&self, input: &str) -> String {
        if let Some(info) = self.known_models.get(input) {
            return info.repo_id.clone();
        }
        input.to_string()
    }

    /// Local folder a repo is stored under
    pub fn local_dir(&self, repo_id: &str) -> PathBuf {
        self.models_dir.join(repo_id.replace('/', "--"))
    }

    pub async fn is_complete(path: &Path) -> bool {
        for file in REQUIRED_FILES {
            if fs::metadata(path.join(file)).await.is_err() {
                return false;
            }
        }
        true
    }

    /// Path of a loadable model folder, downloading it when not present yet
    pub async fn ensure_model_available(&mut self, model: &str) -> Result<PathBuf> {
        let as_path = Path::new(model);
        if as_path.is_dir() {
            if Self::is_complete(as_path).await {
                return Ok(as_path.to_path_buf());
            }
            return Err(JobbotError::ModelError(format!(
                "Model folder {} is missing one of {:?}",
                as_path.display(),
                REQUIRED_FILES
            )));
        }

        let repo_id = self.resolve_repo_id(model);
        let model_dir = self.local_dir(&repo_id);
        if Self::is_complete(&model_dir).await {
            return Ok(model_dir);
        }

        self.download_model(&repo_id, &model_dir).await?;
        Ok(model_dir)
    }

    async fn download_model(&self, repo_id: &str, model_dir: &Path) -> Result<()> {
        info!("Downloading embedding model {} into {}", repo_id, model_dir.display());

        fs::create_dir_all(model_dir).await.map_err(|e| {
            JobbotError::ModelError(format!("Failed to create model directory: {}", e))
        })?;

        let repo = self.api.repo(hf_hub::Repo::model(repo_id.to_string()));

        for file in REQUIRED_FILES.iter().chain(OPTIONAL_FILES.iter()) {
            match repo.get(file).await {
                Ok(cached_path) => {
                    fs::copy(&cached_path, model_dir.join(file)).await.map_err(|e| {
                        JobbotError::ModelError(format!("Failed to copy {}: {}", file, e))
                    })?;
                    info!("Downloaded {}", file);
                }
                Err(e) if OPTIONAL_FILES.contains(file) => {
                    warn!("Optional file {} not found: {}", file, e);
                }
                Err(e) => {
                    return Err(JobbotError::ModelError(format!(
                        "Failed to download required file {}: {}",
                        file, e
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn list_known_models(&self) -> Vec<&EmbeddingModelInfo> {
        let mut models: Vec<_> = self.known_models.values().collect();
        models.sort_by(|a, b| a.size_mb.cmp(&b.size_mb));
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_manager_creates_models_dir() {
        let temp_dir = TempDir::new().unwrap();
        let models_dir = temp_dir.path().join("models");
        let manager = EmbeddingModelManager::new(models_dir.clone()).await.unwrap();
        assert!(models_dir.exists());
        assert!(!manager.list_known_models().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_repo_id() {
        let temp_dir = TempDir::new().unwrap();
        let manager = EmbeddingModelManager::new(temp_dir.path().to_path_buf()).await.unwrap();

        assert_eq!(manager.resolve_repo_id("potion-base-8M"), "minishlab/potion-base-8M");
        assert_eq!(manager.resolve_repo_id("someone/custom-model"), "someone/custom-model");
        assert_eq!(
            manager.local_dir("minishlab/potion-base-8M"),
            temp_dir.path().join("minishlab--potion-base-8M")
        );
    }

    #[tokio::test]
    async fn test_existing_local_copy_skips_download() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = EmbeddingModelManager::new(temp_dir.path().to_path_buf()).await.unwrap();

        let model_dir = manager.local_dir("minishlab/potion-base-8M");
        std::fs::create_dir_all(&model_dir).unwrap();
        for file in REQUIRED_FILES {
            std::fs::write(model_dir.join(file), b"{}").unwrap();
        }

        let resolved = manager.ensure_model_available("potion-base-8M").await.unwrap();
        assert_eq!(resolved, model_dir);
    }

    #[tokio::test]
    async fn test_incomplete_local_folder_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut manager = EmbeddingModelManager::new(temp_dir.path().join("models")).await.unwrap();

        let folder = temp_dir.path().join("my-model");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("tokenizer.json"), b"{}").unwrap();

        let result = manager.ensure_model_available(folder.to_str().unwrap()).await;
        assert!(matches!(result, Err(JobbotError::ModelError(_))));
    }
}
