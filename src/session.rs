use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::{fetch_record, ApiError, ApiRequest, Transport};
use crate::cache::{keys, CachePolicy, CacheShim};
use crate::validation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Token and signed-in profile, persisted next to the lookup caches.
#[derive(Clone)]
pub struct Session {
    cache: CacheShim,
}

impl Session {
    pub fn new(cache: CacheShim) -> Self {
        Self { cache }
    }

    pub fn token(&self) -> Option<String> {
        self.cache.read(keys::SESSION_TOKEN, CachePolicy::NoExpiry)
    }

    pub fn require_token(&self) -> Result<String, ApiError> {
        self.token().ok_or(ApiError::Unauthenticated)
    }

    pub fn store_token(&self, token: &str) -> Result<()> {
        validation::required("token", token)?;
        self.cache.write(keys::SESSION_TOKEN, &token.trim())
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.cache.read(keys::SESSION_USER, CachePolicy::NoExpiry)
    }

    /// Fetches the profile behind the stored token and keeps it.
    pub async fn refresh_profile(&self, transport: &dyn Transport) -> Result<UserProfile, ApiError> {
        let token = self.require_token()?;
        let request = ApiRequest::get("auth/me").bearer(Some(token));
        let raw = fetch_record(transport, request).await?;
        let profile: UserProfile = serde_json::from_value(raw)?;
        if let Err(err) = self.cache.write(keys::SESSION_USER, &profile) {
            tracing::warn!(error = %err, "failed to persist user profile");
        }
        Ok(profile)
    }

    pub fn sign_out(&self) -> Result<usize> {
        self.cache.invalidate_prefix(keys::SESSION_PREFIX)
    }
}
