use async_trait::async_trait;

use crate::error::StoreError;

mod sqlite;
mod upstash;

pub use sqlite::SqliteStore;
pub use upstash::UpstashStore;

/// Durable set of already-notified listing URLs, namespaced by seen-set key.
///
/// Members are only ever added; nothing in this crate removes or expires them.
#[async_trait]
pub trait SeenStore: Send + Sync {
    async fn is_member(&self, key: &str, url: &str) -> Result<bool, StoreError>;

    /// Adds every url in one call. Empty input is a no-op. There is no partial
    /// success: on error the caller cannot tell which members landed.
    async fn add_all(&self, key: &str, urls: &[String]) -> Result<(), StoreError>;

    async fn add(&self, key: &str, url: &str) -> Result<(), StoreError> {
        self.add_all(key, &[url.to_string()]).await
    }
}
