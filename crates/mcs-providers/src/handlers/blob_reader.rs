//! Blob-backed resource reader
//!
//! Resolves resource URIs of the form `blob://{key}` against the blob
//! store. Large resource payloads live in the store; the catalog holds
//! only the descriptor.

use std::sync::Arc;

use async_trait::async_trait;

use mcs_domain::capability::hash::sha256_hex;
use mcs_domain::error::{Error, Result};
use mcs_domain::ports::{BlobStoreProvider, InvocationContext, ResourceBody, ResourceReader};

/// URI scheme understood by this reader
const BLOB_SCHEME: &str = "blob://";

/// Resource reader backed by the blob store
pub struct BlobResourceReader {
    store: Arc<dyn BlobStoreProvider>,
}

impl BlobResourceReader {
    /// Create a reader over a blob store
    pub fn new(store: Arc<dyn BlobStoreProvider>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResourceReader for BlobResourceReader {
    async fn read(&self, ctx: &InvocationContext, uri: &str) -> Result<ResourceBody> {
        let key = uri.strip_prefix(BLOB_SCHEME).ok_or_else(|| {
            Error::invalid_argument(format!("uri '{uri}' is not a {BLOB_SCHEME} uri"))
        })?;

        if ctx.is_cancelled() {
            return Err(Error::cancelled("resource read cancelled"));
        }

        let bytes = self.store.get(key).await?;
        let etag = sha256_hex(&bytes);
        Ok(ResourceBody {
            bytes,
            etag: Some(etag),
        })
    }

    fn reader_ref(&self) -> &str {
        "blob.reader"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::InMemoryBlobStore;
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    fn ctx() -> InvocationContext {
        InvocationContext {
            request_id: "r1".to_string(),
            session_id: "s1".to_string(),
            claims: mcs_domain::value_objects::Claims::anonymous(),
            deadline: Instant::now() + Duration::from_secs(5),
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn reads_blob_uris() {
        let store = Arc::new(InMemoryBlobStore::new());
        let key = store.put(b"big document").await.unwrap();
        let reader = BlobResourceReader::new(store);

        let body = reader.read(&ctx(), &format!("blob://{key}")).await.unwrap();
        assert_eq!(body.bytes, b"big document");
        assert_eq!(body.etag, Some(key));
    }

    #[tokio::test]
    async fn rejects_foreign_schemes() {
        let reader = BlobResourceReader::new(Arc::new(InMemoryBlobStore::new()));
        let err = reader.read(&ctx(), "file:///etc/passwd").await.unwrap_err();
        assert_eq!(err.kind(), mcs_domain::ErrorKind::InvalidArgument);
    }
}
