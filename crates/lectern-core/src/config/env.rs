use std::path::PathBuf;

use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_models();
        self.apply_env_overrides_pipeline();
    }

    fn apply_env_overrides_models(&mut self) {
        if let Ok(v) = std::env::var("LECTERN_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid LECTERN_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("LECTERN_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("LECTERN_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Ok(v) = std::env::var("LECTERN_LLM_MAX_TOKENS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_tokens = n;
        }
        if let Ok(v) = std::env::var("LECTERN_LLM_TEMPERATURE")
            && let Ok(t) = v.parse::<f32>()
        {
            self.llm.temperature = t;
        }
        if let Ok(v) = std::env::var("LECTERN_EMBEDDING_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid LECTERN_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("LECTERN_EMBEDDING_MODEL") {
            self.embedding.model = Some(v);
        }
        if let Ok(v) = std::env::var("LECTERN_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("LECTERN_EMBEDDING_BATCH_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.embedding.batch_size = n;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("LECTERN_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.chunk_size = n;
        }
        if let Ok(v) = std::env::var("LECTERN_CHUNK_OVERLAP")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("LECTERN_INDEX_PATH") {
            self.index.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LECTERN_SOURCE_DIR") {
            self.index.source_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LECTERN_INDEX_METRIC") {
            match v.parse() {
                Ok(metric) => self.index.metric = metric,
                Err(e) => tracing::warn!("ignoring invalid LECTERN_INDEX_METRIC value: {e}"),
            }
        }
        if let Ok(v) = std::env::var("LECTERN_RETRIEVAL_K")
            && let Ok(k) = v.parse::<usize>()
        {
            self.retrieval.k = k;
        }
        if let Ok(v) = std::env::var("LECTERN_SCORE_THRESHOLD")
            && let Ok(t) = v.parse::<f32>()
        {
            self.retrieval.score_threshold = Some(t);
        }
        if let Ok(v) = std::env::var("LECTERN_TIMEOUT_EMBEDDING")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.embedding_secs = secs;
        }
        if let Ok(v) = std::env::var("LECTERN_TIMEOUT_GENERATION")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.generation_secs = secs;
        }
    }
}
