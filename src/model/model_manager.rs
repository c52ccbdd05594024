use super::backends::onnx::sklearn_onnx;
use super::model_utils::ModelTrait;
use crate::error::LoadError;
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;

pub type ModelHandle = Arc<dyn ModelTrait>;

/// Process-wide holder of the predictor loaded at startup.
///
/// Populated at most once and never mutated afterwards, so request handlers
/// share it without locking.
pub struct ModelHolder {
    model: Option<ModelHandle>,
}

impl ModelHolder {
    pub fn empty() -> Self {
        Self { model: None }
    }

    pub fn with_model(model: ModelHandle) -> Self {
        Self { model: Some(model) }
    }

    /// Best-effort startup load. A failure is logged and leaves the holder
    /// empty so the process keeps serving.
    pub fn from_path(path: &Path) -> Self {
        match load(path) {
            Ok(model) => {
                info!(
                    "Model loaded from {} ({:?} predictor)",
                    path.display(),
                    model.capability()
                );
                Self::with_model(model)
            }
            Err(e) => {
                error!("Error loading model from {}: {}", path.display(), e);
                warn!("The API keeps running but /predict will answer 503");
                Self::empty()
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn current(&self) -> Option<ModelHandle> {
        self.model.clone()
    }
}

/// Deserializes the artifact at `path` into a predictor.
pub fn load(path: &Path) -> Result<ModelHandle, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    sklearn_onnx::load(path)
}
