use std::future::Future;

use crate::EmbedError;

pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Embed `texts`, returning exactly one vector per input in input order.
    ///
    /// An empty input returns an empty list without contacting the service.
    ///
    /// # Errors
    ///
    /// Returns an [`EmbedError`] on transport failure, a non-success status, a
    /// malformed response, or a response whose vector count differs from the input.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, EmbedError>> + Send;
}
