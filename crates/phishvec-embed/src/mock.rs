//! Test-only deterministic embedding provider.

use std::sync::{Arc, Mutex};

use crate::error::EmbedError;
use crate::provider::EmbeddingProvider;

#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimension: usize,
    pub fail_all: bool,
    /// Fail any batch containing a text with this substring.
    pub fail_marker: Option<String>,
    /// Return one vector fewer than requested.
    pub drop_last: bool,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimension: 8,
            fail_all: false,
            fail_marker: None,
            drop_last: false,
            delay_ms: 0,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    #[must_use]
    pub fn with_count_mismatch(mut self) -> Self {
        self.drop_last = true;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Vector the mock returns for `text`. The first component is the character count.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for b in text.bytes() {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        let mut v = Vec::with_capacity(self.dimension);
        v.push(text.chars().count() as f32);
        for i in 1..self.dimension {
            let mixed = hash.rotate_left(u32::try_from(i % 64).unwrap_or(0));
            v.push((mixed % 1000) as f32 / 1000.0);
        }
        v
    }

    /// Every batch received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl EmbeddingProvider for MockEmbedder {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(texts.to_vec());
        }
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_all {
            return Err(EmbedError::Other("mock embedding error".into()));
        }
        if let Some(marker) = &self.fail_marker
            && texts.iter().any(|t| t.contains(marker.as_str()))
        {
            return Err(EmbedError::Other(format!("mock failure on `{marker}`")));
        }
        let mut vectors: Vec<_> = texts.iter().map(|t| self.vector_for(t)).collect();
        if self.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }
}
