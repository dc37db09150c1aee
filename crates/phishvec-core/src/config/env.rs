use super::{ChunkStrategy, Config, Secret, StoreProvider};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_core();
        self.apply_env_secrets();
    }

    fn apply_env_overrides_core(&mut self) {
        if let Ok(v) = std::env::var("PHISHVEC_DATASET_DIR") {
            self.dataset.dir = v.into();
        }
        if let Ok(v) = std::env::var("PHISHVEC_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("PHISHVEC_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("PHISHVEC_CHUNKING_STRATEGY") {
            if let Ok(strategy) =
                serde_json::from_value::<ChunkStrategy>(serde_json::Value::String(v.to_lowercase()))
            {
                self.chunking.strategy = strategy;
            } else {
                tracing::warn!("ignoring invalid PHISHVEC_CHUNKING_STRATEGY value: {v}");
            }
        }
        if let Ok(v) = std::env::var("PHISHVEC_BATCH_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.batch_size = n;
        }
        if let Ok(v) = std::env::var("PHISHVEC_MAX_BODY_CHARS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.max_body_chars = n;
        }
        if let Ok(v) = std::env::var("PHISHVEC_CONCURRENCY")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.concurrency = n;
        }
        if let Ok(v) = std::env::var("PHISHVEC_MAX_INPUTS_PER_CALL")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.max_inputs_per_call = n;
        }
        if let Ok(v) = std::env::var("PHISHVEC_STORE_PROVIDER") {
            if let Ok(provider) =
                serde_json::from_value::<StoreProvider>(serde_json::Value::String(v.to_lowercase()))
            {
                self.store.provider = provider;
            } else {
                tracing::warn!("ignoring invalid PHISHVEC_STORE_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("PHISHVEC_INDEX_NAME") {
            self.store.index_name = v;
        }
        if let Ok(v) = std::env::var("PHISHVEC_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("PHISHVEC_TIMEOUT_EMBEDDING")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.embedding_seconds = secs;
        }
        if let Ok(v) = std::env::var("PHISHVEC_TIMEOUT_STORE")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.store_seconds = secs;
        }
        if let Ok(v) = std::env::var("PHISHVEC_MAX_RETRIES")
            && let Ok(n) = v.parse::<u32>()
        {
            self.retry.max_retries = n;
        }
    }

    fn apply_env_secrets(&mut self) {
        if let Ok(v) = std::env::var("PINECONE_API_KEY")
            && !v.trim().is_empty()
        {
            self.secrets.pinecone_api_key = Some(Secret::new(v.trim()));
        }
        if let Ok(v) = std::env::var("QDRANT_API_KEY")
            && !v.trim().is_empty()
        {
            self.secrets.qdrant_api_key = Some(Secret::new(v.trim()));
        }
    }
}
