//! Application state.

use std::sync::Arc;

use scenewatch_media::{Detector, YoloV8Config, YoloV8Detector};
use scenewatch_store::SceneStore;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: SceneStore,
    pub detector: Arc<dyn Detector>,
}

impl AppState {
    /// Create application state from config, loading the detection model
    /// and opening the scene database.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = SceneStore::open(&config.db_path)?;

        let detector = YoloV8Detector::new(YoloV8Config {
            model_path: config.model_path.clone(),
            ..YoloV8Config::default()
        })?;

        Ok(Self::with_components(config, store, Arc::new(detector)))
    }

    /// Assemble state from already-built components.
    pub fn with_components(
        config: ApiConfig,
        store: SceneStore,
        detector: Arc<dyn Detector>,
    ) -> Self {
        Self {
            config,
            store,
            detector,
        }
    }
}
