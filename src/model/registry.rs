use crate::{config::AppConfig, model::ModelInfo};

const OWNER: &str = "azure-foundry";

/// Models advertised on `/api/v1/models`. Built once from configuration;
/// the vendor is never queried.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelInfo>,
}

impl ModelRegistry {
    pub fn from_config(config: &AppConfig) -> Self {
        let mut models: Vec<ModelInfo> = Vec::with_capacity(1 + config.extra_models.len());
        let ids = std::iter::once(&config.deployment).chain(config.extra_models.iter());
        for id in ids {
            if models.iter().any(|m| &m.id == id) {
                continue;
            }
            models.push(ModelInfo {
                id: id.clone(),
                object: "model".to_string(),
                owned_by: OWNER.to_string(),
            });
        }
        Self { models }
    }

    pub fn list(&self) -> &[ModelInfo] {
        &self.models
    }
}
