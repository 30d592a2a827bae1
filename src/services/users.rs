use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::api::{fetch_record, resource_path, ApiError, ApiRequest, Transport};
use crate::cache::{keys, CachePolicy, CacheShim};

type NameMap = HashMap<String, String>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

/// Resolves author ids to display names. Names are kept in one shared map
/// that is never invalidated.
pub struct UserDirectory {
    transport: Arc<dyn Transport>,
    cache: CacheShim,
}

impl UserDirectory {
    pub fn new(transport: Arc<dyn Transport>, cache: CacheShim) -> Self {
        Self { transport, cache }
    }

    pub fn cached_name(&self, user_id: &str) -> Option<String> {
        self.names().remove(user_id)
    }

    pub async fn display_name(&self, user_id: &str) -> Result<String, ApiError> {
        if let Some(name) = self.cached_name(user_id) {
            return Ok(name);
        }

        let request = ApiRequest::get(resource_path(&["users", user_id]));
        let raw = fetch_record(self.transport.as_ref(), request).await?;
        let record: UserRecord = serde_json::from_value(raw)?;
        let name = record
            .full_name
            .filter(|name| !name.trim().is_empty())
            .or(record.username)
            .unwrap_or_else(|| user_id.to_string());

        // Re-read so lookups that finished meanwhile are not overwritten.
        let mut names = self.names();
        names.insert(user_id.to_string(), name.clone());
        if let Err(err) = self.cache.write(keys::USER_NAMES, &names) {
            tracing::warn!(%user_id, error = %err, "failed to persist user name");
        }
        Ok(name)
    }

    fn names(&self) -> NameMap {
        self.cache
            .read(keys::USER_NAMES, CachePolicy::NoExpiry)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::ScriptedTransport;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn directory() -> (Arc<ScriptedTransport>, UserDirectory) {
        let transport = Arc::new(ScriptedTransport::new());
        let cache = CacheShim::new(Arc::new(MemoryStore::new()));
        (transport.clone(), UserDirectory::new(transport, cache))
    }

    #[tokio::test]
    async fn names_are_fetched_once_and_shared() {
        let (transport, users) = directory();
        transport
            .respond("users/u1", json!({ "statusCode": 200, "data": { "fullName": "Trần Thị Bình" } }))
            .respond("users/u2", json!({ "statusCode": 200, "data": { "username": "hoang" } }));

        assert_eq!(users.display_name("u1").await.unwrap(), "Trần Thị Bình");
        assert_eq!(users.display_name("u2").await.unwrap(), "hoang");
        assert_eq!(users.display_name("u1").await.unwrap(), "Trần Thị Bình");

        assert_eq!(transport.calls_to("users/u1"), 1);
        assert_eq!(users.cached_name("u2").as_deref(), Some("hoang"));
    }

    #[tokio::test]
    async fn failed_lookup_is_not_remembered() {
        let (transport, users) = directory();
        transport
            .respond("users/u9", json!({ "statusCode": 404, "message": "Không tìm thấy" }))
            .respond("users/u9", json!({ "statusCode": 200, "data": { "fullName": "Lê Văn Cường" } }));

        assert!(users.display_name("u9").await.is_err());
        assert!(users.cached_name("u9").is_none());
        assert_eq!(users.display_name("u9").await.unwrap(), "Lê Văn Cường");
    }
}
