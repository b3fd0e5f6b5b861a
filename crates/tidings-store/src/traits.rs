//! Config store trait
//!
//! Keys are opaque strings; values are opaque byte blobs. Serialization of the
//! stored values belongs to the caller.

use async_trait::async_trait;
use bytes::Bytes;
use tidings_core::Result;

/// Durable key → bytes storage
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Short name of the backend, for logs and health output
    fn backend(&self) -> &'static str;

    /// `Ok(None)` when the key has never been written or was deleted.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Create or fully replace the value at `key`.
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
