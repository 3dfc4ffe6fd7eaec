//! Question → embedding → top-k matches from one namespace.

use tracing::{debug, info};

use crate::embedding::{Embedder, InputKind};
use crate::error::ServiceError;
use crate::store::{Match, VectorStore};

/// Returns the metadata of the `top_k` nearest chunks, in the store's order.
/// No caching, re-ranking or metadata filtering.
pub async fn retrieve(
    question: &str,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    namespace: &str,
    top_k: usize,
) -> Result<Vec<Match>, ServiceError> {
    info!(question, namespace, top_k, "retrieving");
    let vector = embedder.embed(question, InputKind::Query).await?;
    let matches = store.query(namespace, &vector, top_k).await?;
    for m in &matches {
        debug!(id = %m.id, score = m.score, source = %m.metadata.source, page = ?m.metadata.page, "match");
    }
    Ok(matches)
}
