use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder},
    tensor::backend::Backend,
};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::features::NUM_FEATURES;
use crate::nn::model::{ForecastModel, ForecastModelConfig};
use crate::nn::training::InferenceBackend;

/// Metadata saved alongside the trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub symbol: String,
    pub trained_at: String,
    pub window_size: usize,
    pub prediction_days: usize,
    pub hidden_size: usize,
    pub epochs_run: usize,
    pub best_val_loss: f64,
}

impl ModelMetadata {
    fn model_config(&self) -> ForecastModelConfig {
        ForecastModelConfig {
            input_size: NUM_FEATURES,
            hidden_size: self.hidden_size,
            output_size: self.prediction_days,
        }
    }
}

/// The single named location holding the latest trained model.
///
/// Every save overwrites the previous artifact. Two runs sharing a slot race on it.
#[derive(Debug, Clone)]
pub struct ModelSlot {
    dir: PathBuf,
    name: String,
}

impl ModelSlot {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    /// Weights path as written by the recorder
    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(&self.name).with_extension("mpk.gz")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(format!("{}_metadata.json", self.name))
    }

    pub fn exists(&self) -> bool {
        self.weights_path().exists() && self.metadata_path().exists()
    }

    /// Save the model to disk in gzip-compressed MessagePack format, then the metadata.
    pub fn save<B: Backend>(&self, model: &ForecastModel<B>, metadata: &ModelMetadata) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ForecastError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let recorder = NamedMpkGzFileRecorder::<FullPrecisionSettings>::default();
        let base = self.dir.join(&self.name);
        model
            .clone()
            .save_file(&base, &recorder)
            .map_err(|e| ForecastError::Persistence {
                path: self.weights_path(),
                message: e.to_string(),
            })?;

        let metadata_path = self.metadata_path();
        let json = serde_json::to_string_pretty(metadata)?;
        std::fs::write(&metadata_path, json).map_err(|source| ForecastError::Io {
            path: metadata_path,
            source,
        })?;

        tracing::info!(
            "Model saved to {} (val loss {:.6})",
            self.weights_path().display(),
            metadata.best_val_loss
        );
        Ok(())
    }

    /// Load the model from the slot. Fails with `ArtifactNotFound` if nothing was saved yet.
    pub fn load(&self) -> Result<(ForecastModel<InferenceBackend>, ModelMetadata)> {
        let metadata = self.load_metadata()?;
        let weights_path = self.weights_path();
        if !weights_path.exists() {
            return Err(ForecastError::ArtifactNotFound(weights_path));
        }

        let recorder = NamedMpkGzFileRecorder::<FullPrecisionSettings>::default();
        let device = <InferenceBackend as Backend>::Device::default();
        let model = metadata
            .model_config()
            .init::<InferenceBackend>(&device)
            .load_file(self.dir.join(&self.name), &recorder, &device)
            .map_err(|e| ForecastError::Persistence {
                path: weights_path.clone(),
                message: e.to_string(),
            })?;

        tracing::info!(
            "Model loaded from {} (trained {} for {})",
            weights_path.display(),
            metadata.trained_at,
            metadata.symbol
        );
        Ok((model, metadata))
    }

    pub fn load_metadata(&self) -> Result<ModelMetadata> {
        let path = self.metadata_path();
        let text = read_existing(&path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn read_existing(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ForecastError::ArtifactNotFound(path.to_path_buf()))
        }
        Err(source) => Err(ForecastError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
