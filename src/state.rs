//! Application state: configuration, the cache store, the optional content
//! model and the generation client built on top of them.
//!
//! If no OPENAI_API_KEY is set, the generation client runs without a model
//! and every fetch is served from the fallback synthesizer.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::cache::{CacheStore, FileStore};
use crate::config::{load_config, AgentConfig};
use crate::generator::GenerationClient;
use crate::ids::MonotonicIds;
use crate::model::{ContentModel, OpenAI};

pub struct AppState {
    pub generator: GenerationClient,
}

impl AppState {
    /// Build state from env: load config, open the cache, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub async fn from_env() -> Self {
        let cfg = load_config();
        let openai = OpenAI::from_env();
        if let Some(oa) = &openai {
            info!(target: "lingoquest", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
        } else {
            warn!(target: "lingoquest", "OpenAI disabled (no OPENAI_API_KEY). Serving fallback content only.");
        }
        let model = openai.map(|oa| Arc::new(oa) as Arc<dyn ContentModel>);
        Self::build(cfg, model).await
    }

    /// Assemble state from an explicit config and model.
    pub async fn build(cfg: AgentConfig, model: Option<Arc<dyn ContentModel>>) -> Self {
        let cache = if cfg.cache.persist {
            let store = FileStore::open(&cfg.cache.path).await;
            info!(target: "lingoquest", path = %store.path().display(), prefix = %cfg.cache.prefix, "Persistent cache opened");
            CacheStore::new(cfg.cache.prefix.clone(), Box::new(store))
        } else {
            info!(target: "lingoquest", prefix = %cfg.cache.prefix, "In-memory cache");
            CacheStore::in_memory(cfg.cache.prefix.clone())
        };

        let generator = GenerationClient::new(
            model,
            cache,
            Arc::new(MonotonicIds::new()),
            cfg.prompts,
            cfg.generation,
        );
        Self { generator }
    }
}
